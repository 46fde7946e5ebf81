//! The execution context handed to definition factories.

use crate::error::{Error, Result};
use crate::parameters::Parameters;
use crate::qualifier::Qualifier;
use crate::scope::Scope;

use std::any::{type_name, Any};
use std::sync::Arc;

/// What a factory sees while building its value: the scope owning the
/// definition and the parameters supplied by the caller.
pub struct Context<'a> {
  scope: &'a Scope,
  parameters: &'a Parameters,
  building: &'static str,
}

impl<'a> Context<'a> {
  pub(crate) fn new(scope: &'a Scope, parameters: &'a Parameters, building: &'static str) -> Self {
    Self {
      scope,
      parameters,
      building,
    }
  }

  pub fn scope(&self) -> &'a Scope {
    self.scope
  }

  pub fn parameters(&self) -> &'a Parameters {
    self.parameters
  }

  /// Resolves a dependency from the scope chain.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.scope.get::<T>()
  }

  pub fn get_named<T: ?Sized + Any + Send + Sync>(&self, qualifier: impl Into<Qualifier>) -> Result<Arc<T>> {
    self.scope.get_named::<T>(qualifier)
  }

  pub fn resolve<T: ?Sized + Any + Send + Sync>(
    &self,
    qualifier: Option<&Qualifier>,
    parameters: Parameters,
  ) -> Result<Arc<T>> {
    self.scope.resolve::<T>(qualifier, parameters)
  }

  pub fn get_or_none<T: ?Sized + Any + Send + Sync>(&self) -> Option<Arc<T>> {
    self.scope.resolve_or_none::<T>(None, Parameters::new())
  }

  pub fn get_all<T: ?Sized + Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>> {
    self.scope.resolve_all::<T>()
  }

  /// Binds the next constructor parameter of type `T`.
  ///
  /// The first supplied value of type `T` not bound yet wins and is consumed.
  /// Without one, `T` is resolved from the scope chain with the same
  /// parameter list, so nested factories can still bind what is left. When
  /// neither works the error names `T`.
  pub fn param<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    if let Some(value) = self.parameters.take::<T>() {
      return Ok(value);
    }
    match self.scope.resolve_shared::<T>(None, self.parameters) {
      Err(Error::NoDefinitionFound { type_name: missing, .. }) if missing == type_name::<T>() => {
        Err(Error::ConstructionError {
          type_name: self.building,
          parameter: missing,
        })
      }
      other => other,
    }
  }

  pub fn get_property<T: Any + Clone + Send + Sync>(&self, key: &str) -> Option<T> {
    self.scope.get_property::<T>(key)
  }

  pub fn require_property<T: Any + Clone + Send + Sync>(&self, key: &str) -> Result<T> {
    self.scope.require_property::<T>(key)
  }
}
