//! The crate's error type.

use std::path::PathBuf;

use thiserror::Error;

/// The error type for every fallible operation of `fibre_di`.
#[derive(Debug, Error)]
pub enum Error {
  #[error("No definition found for '{type_name}'{}. Check your module definitions.", qualifier_suffix(.qualifier))]
  NoDefinitionFound {
    type_name: &'static str,
    qualifier: Option<String>,
  },

  #[error("Definition '{type_name}'{} is already registered. Allow override to replace it.", qualifier_suffix(.qualifier))]
  DefinitionConflict {
    type_name: &'static str,
    qualifier: Option<String>,
  },

  #[error("Scope '{scope_id}' expects a parent of set '{expected}', but its parent is of set '{actual}'")]
  ParentScopeMismatch {
    scope_id: String,
    expected: String,
    actual: String,
  },

  #[error("Scope '{scope_id}' is closed")]
  ScopeClosed { scope_id: String },

  #[error("Can't create '{type_name}': no supplied parameter nor definition for '{parameter}'")]
  ConstructionError {
    type_name: &'static str,
    parameter: &'static str,
  },

  #[error("Circular dependency detected while resolving '{type_name}'{}", qualifier_suffix(.qualifier))]
  CircularDependency {
    type_name: &'static str,
    qualifier: Option<String>,
  },

  #[error("A container has already been started")]
  AlreadyStarted,

  #[error("No container has been started")]
  NotStarted,

  #[error("Property '{key}' not found")]
  MissingProperty { key: String },

  #[error("Scope with id '{0}' already exists")]
  ScopeAlreadyExists(String),

  #[error("No scope found for id '{0}'")]
  ScopeNotFound(String),

  #[error("No scope set declared for qualifier '{0}'")]
  NoScopeSetFound(String),

  #[error("Failed to read property file '{path}': {source}")]
  PropertyFile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to parse property file '{path}': {source}")]
  PropertyParse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("Property file '{path}' is not a flat mapping of scalars: {reason}")]
  PropertyFormat { path: PathBuf, reason: String },

  #[error("{0}")]
  Custom(String),
}

impl Error {
  /// Wraps a failure raised by a user factory.
  pub fn custom(message: impl std::fmt::Display) -> Self {
    Error::Custom(message.to_string())
  }
}

fn qualifier_suffix(qualifier: &Option<String>) -> String {
  match qualifier {
    Some(q) => format!(" & qualifier '{}'", q),
    None => String::new(),
  }
}

/// A specialized `Result` type for `fibre_di` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
