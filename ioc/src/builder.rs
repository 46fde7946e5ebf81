//! Configuring and building containers.

use crate::container::Container;
use crate::error::{Error, Result};
use crate::module::Module;

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type PropertyValue = Arc<dyn Any + Send + Sync>;

enum PropertySource {
  Value(String, PropertyValue),
  File(PathBuf),
  Environment,
}

/// A builder for creating a configured [`Container`].
///
/// Property sources are applied in the order they were added, so a later
/// source overwrites keys set by an earlier one.
pub struct ContainerBuilder {
  modules: Vec<Module>,
  properties: Vec<PropertySource>,
  allow_override: bool,
  create_eager_instances: bool,
}

impl fmt::Debug for ContainerBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ContainerBuilder")
      .field("modules", &self.modules.len())
      .field("property_sources", &self.properties.len())
      .field("allow_override", &self.allow_override)
      .field("create_eager_instances", &self.create_eager_instances)
      .finish()
  }
}

impl Default for ContainerBuilder {
  fn default() -> Self {
    Self {
      modules: Vec::new(),
      properties: Vec::new(),
      allow_override: false,
      create_eager_instances: true,
    }
  }
}

impl ContainerBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn module(mut self, module: Module) -> Self {
    self.modules.push(module);
    self
  }

  pub fn modules(mut self, modules: impl IntoIterator<Item = Module>) -> Self {
    self.modules.extend(modules);
    self
  }

  pub fn property<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
    self
      .properties
      .push(PropertySource::Value(key.into(), Arc::new(value)));
    self
  }

  /// Adds string properties from `(key, value)` pairs.
  pub fn properties<K, V>(mut self, properties: impl IntoIterator<Item = (K, V)>) -> Self
  where
    K: Into<String>,
    V: Into<String>,
  {
    for (key, value) in properties {
      let value: String = value.into();
      self
        .properties
        .push(PropertySource::Value(key.into(), Arc::new(value)));
    }
    self
  }

  /// Adds every process environment variable as a string property.
  pub fn environment_properties(mut self) -> Self {
    self.properties.push(PropertySource::Environment);
    self
  }

  /// Adds string properties read from a flat YAML mapping of scalars.
  pub fn file_properties(mut self, path: impl AsRef<Path>) -> Self {
    self
      .properties
      .push(PropertySource::File(path.as_ref().to_path_buf()));
    self
  }

  /// Lets any definition replace an existing one with the same key.
  pub fn allow_override(mut self, allow: bool) -> Self {
    self.allow_override = allow;
    self
  }

  /// Whether `create_on_start` definitions are built by [`build`](Self::build).
  /// Defaults to `true`.
  pub fn create_eager_instances(mut self, create: bool) -> Self {
    self.create_eager_instances = create;
    self
  }

  /// Builds the container: properties first, then modules, then eager
  /// instances.
  pub fn build(self) -> Result<Container> {
    let (container, create_eager_instances) = self.assemble()?;
    if create_eager_instances {
      container.create_eager_instances()?;
    }
    Ok(container)
  }

  /// Builds the container and installs it as the global one.
  pub fn start(self) -> Result<Container> {
    crate::global::start(self)
  }

  /// The loaded container, without its eager instances, and whether they
  /// should be created.
  pub(crate) fn assemble(self) -> Result<(Container, bool)> {
    let container = Container::with_override(self.allow_override);
    for source in self.properties {
      match source {
        PropertySource::Value(key, value) => container.insert_property(key, value),
        PropertySource::Environment => {
          for (key, value) in std::env::vars() {
            container.set_property(key, value);
          }
        }
        PropertySource::File(path) => {
          for (key, value) in read_property_file(&path)? {
            container.set_property(key, value);
          }
        }
      }
    }

    container.register_modules(&self.modules)?;
    Ok((container, self.create_eager_instances))
  }
}

fn read_property_file(path: &Path) -> Result<Vec<(String, String)>> {
  let content = std::fs::read_to_string(path).map_err(|source| Error::PropertyFile {
    path: path.to_path_buf(),
    source,
  })?;
  if content.trim().is_empty() {
    return Ok(Vec::new());
  }
  let format_error = |reason: String| Error::PropertyFormat {
    path: path.to_path_buf(),
    reason,
  };

  let mapping: serde_yaml::Mapping = serde_yaml::from_str(&content).map_err(|source| Error::PropertyParse {
    path: path.to_path_buf(),
    source,
  })?;
  let mut properties = Vec::with_capacity(mapping.len());
  for (key, value) in mapping {
    let key = scalar(&key).ok_or_else(|| format_error(format!("non-scalar key {:?}", key)))?;
    let value = scalar(&value).ok_or_else(|| format_error(format!("value of '{}' is not a scalar", key)))?;
    properties.push((key, value));
  }
  tracing::debug!("loaded {} properties from {}", properties.len(), path.display());
  Ok(properties)
}

fn scalar(value: &serde_yaml::Value) -> Option<String> {
  match value {
    serde_yaml::Value::String(s) => Some(s.clone()),
    serde_yaml::Value::Number(n) => Some(n.to_string()),
    serde_yaml::Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}
