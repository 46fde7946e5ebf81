//! Replacing live definitions with stand-ins, for tests.

use crate::container::Container;
use crate::context::Context;
use crate::definition::{FactoryFn, Instance};
use crate::error::{Error, Result};
use crate::parameters::Parameters;
use crate::qualifier::{DefinitionKey, Qualifier, TypeKey};
use crate::scope::Scope;

use std::any::{type_name, Any};
use std::sync::Arc;

impl Scope {
  /// Replaces the definition of `T` with one built by `builder`, keeping every
  /// other option of the original, and returns the resolved stand-in.
  ///
  /// The definition is looked up in this scope, then in its scope set. The
  /// replacement is saved into both, so scopes created later see it too.
  pub fn substitute<T, F>(&self, qualifier: Option<&Qualifier>, builder: F) -> Result<Arc<T>>
  where
    T: Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<T> + Send + Sync + 'static,
  {
    let factory: FactoryFn = Arc::new(move |ctx| builder(ctx).map(|value| Arc::new(Arc::new(value)) as Instance));
    self.substitute_with::<T>(qualifier, factory)
  }

  /// Like [`substitute`](Self::substitute), for definitions of unsized types.
  pub fn substitute_trait<T, F>(&self, qualifier: Option<&Qualifier>, builder: F) -> Result<Arc<T>>
  where
    T: ?Sized + Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
  {
    let factory: FactoryFn = Arc::new(move |ctx| builder(ctx).map(|value| Arc::new(value) as Instance));
    self.substitute_with::<T>(qualifier, factory)
  }

  fn substitute_with<T: ?Sized + Any + Send + Sync>(
    &self,
    qualifier: Option<&Qualifier>,
    factory: FactoryFn,
  ) -> Result<Arc<T>> {
    let key = DefinitionKey::new(TypeKey::of::<T>(), qualifier.cloned());
    let container = self.container()?;
    let original = self
      .find_definition(&key)
      .or_else(|| {
        self
          .scope_set()
          .and_then(|set| container.scope_set_definition(set, &key))
      })
      .ok_or_else(|| Error::NoDefinitionFound {
        type_name: type_name::<T>(),
        qualifier: qualifier.map(|q| q.to_string()),
      })?;

    let replacement = Arc::new(original.with_factory(factory));
    self.save_definition(replacement.clone(), true)?;
    if let Some(set) = replacement.scope_qualifier.as_ref() {
      container.save_in_scope_set(set, replacement.clone());
    }
    tracing::info!("substituted definition {}", replacement);
    self.resolve::<T>(qualifier, Parameters::new())
  }
}

impl Container {
  /// Substitutes a definition of the root scope; see [`Scope::substitute`].
  pub fn substitute<T, F>(&self, qualifier: Option<&Qualifier>, builder: F) -> Result<Arc<T>>
  where
    T: Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<T> + Send + Sync + 'static,
  {
    self.root_scope().substitute(qualifier, builder)
  }

  pub fn substitute_trait<T, F>(&self, qualifier: Option<&Qualifier>, builder: F) -> Result<Arc<T>>
  where
    T: ?Sized + Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
  {
    self.root_scope().substitute_trait(qualifier, builder)
  }
}
