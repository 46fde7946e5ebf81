//! Deferred injection handles.

use crate::container::Container;
use crate::error::Result;
use crate::parameters::Parameters;
use crate::qualifier::Qualifier;
use crate::scope::Scope;

use once_cell::sync::OnceCell;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

type ParametersFn = Box<dyn Fn() -> Parameters + Send + Sync>;

/// A dependency resolved on first access and memoized afterwards.
///
/// ```
/// use fibre_di::{Container, Module};
///
/// let container = Container::new();
/// let mut module = Module::new();
/// module.single(|_| Ok(42u32));
///
/// let answer = container.root_scope().inject::<u32>();
/// container.load_modules(&[module]).unwrap();
/// assert_eq!(*answer.get().unwrap(), 42);
/// ```
pub struct Inject<T: ?Sized> {
  scope: Scope,
  qualifier: Option<Qualifier>,
  parameters: Option<ParametersFn>,
  value: OnceCell<Arc<T>>,
}

impl<T: ?Sized + Any + Send + Sync> Inject<T> {
  fn new(scope: Scope, qualifier: Option<Qualifier>, parameters: Option<ParametersFn>) -> Self {
    Self {
      scope,
      qualifier,
      parameters,
      value: OnceCell::new(),
    }
  }

  /// Resolves the dependency the first time; later calls return the same
  /// value. A failed resolution is retried on the next call.
  pub fn get(&self) -> Result<Arc<T>> {
    self
      .value
      .get_or_try_init(|| {
        let parameters = self.parameters.as_ref().map_or_else(Parameters::new, |make| make());
        self.scope.resolve::<T>(self.qualifier.as_ref(), parameters)
      })
      .cloned()
  }

  pub fn is_resolved(&self) -> bool {
    self.value.get().is_some()
  }
}

impl<T: ?Sized> fmt::Debug for Inject<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Inject")
      .field("type", &type_name::<T>())
      .field("scope", &self.scope.id())
      .field("qualifier", &self.qualifier)
      .field("resolved", &self.value.get().is_some())
      .finish()
  }
}

/// Like [`Inject`], yielding `None` instead of an error.
pub struct InjectOrNone<T: ?Sized> {
  inner: Inject<T>,
}

impl<T: ?Sized + Any + Send + Sync> InjectOrNone<T> {
  pub fn get(&self) -> Option<Arc<T>> {
    match self.inner.get() {
      Ok(value) => Some(value),
      Err(e) => {
        tracing::error!(
          scope = %self.inner.scope.id(),
          "Can't get instance for '{}': {}",
          type_name::<T>(),
          e
        );
        None
      }
    }
  }
}

impl<T: ?Sized> fmt::Debug for InjectOrNone<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("InjectOrNone").field(&self.inner).finish()
  }
}

impl Scope {
  /// A handle resolving `T` from this scope on first use.
  pub fn inject<T: ?Sized + Any + Send + Sync>(&self) -> Inject<T> {
    Inject::new(self.clone(), None, None)
  }

  pub fn inject_named<T: ?Sized + Any + Send + Sync>(&self, qualifier: impl Into<Qualifier>) -> Inject<T> {
    Inject::new(self.clone(), Some(qualifier.into()), None)
  }

  /// Like [`inject`](Self::inject); `parameters` is called at resolution time.
  pub fn inject_with<T, F>(&self, qualifier: Option<Qualifier>, parameters: F) -> Inject<T>
  where
    T: ?Sized + Any + Send + Sync,
    F: Fn() -> Parameters + Send + Sync + 'static,
  {
    Inject::new(self.clone(), qualifier, Some(Box::new(parameters)))
  }

  pub fn inject_or_none<T: ?Sized + Any + Send + Sync>(&self, qualifier: Option<Qualifier>) -> InjectOrNone<T> {
    InjectOrNone {
      inner: Inject::new(self.clone(), qualifier, None),
    }
  }
}

impl Container {
  pub fn inject<T: ?Sized + Any + Send + Sync>(&self) -> Inject<T> {
    self.root_scope().inject()
  }

  pub fn inject_named<T: ?Sized + Any + Send + Sync>(&self, qualifier: impl Into<Qualifier>) -> Inject<T> {
    self.root_scope().inject_named(qualifier)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::module::Module;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn resolves_once_on_first_get() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    let container = Container::new();
    let mut module = Module::new();
    module.factory(|_| {
      CALLS.fetch_add(1, Ordering::SeqCst);
      Ok(String::from("fresh"))
    });
    container.load_modules(&[module]).unwrap();

    let handle = container.inject::<String>();
    assert!(!handle.is_resolved());
    assert_eq!(CALLS.load(Ordering::SeqCst), 0);

    let first = handle.get().unwrap();
    let second = handle.get().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn failure_is_retried_and_or_none_swallows_it() {
    let container = Container::new();
    let handle = container.inject::<u64>();
    assert!(handle.get().is_err());

    let optional = container.root_scope().inject_or_none::<u64>(None);
    assert!(optional.get().is_none());

    container.declare(7u64, None, false).unwrap();
    assert_eq!(*handle.get().unwrap(), 7);
    assert_eq!(optional.get().as_deref(), Some(&7));
  }

  #[test]
  fn parameters_are_built_at_resolution_time() {
    let container = Container::new();
    let mut module = Module::new();
    module.factory(|ctx| Ok(format!("id-{}", ctx.param::<u32>()?)));
    container.load_modules(&[module]).unwrap();

    let handle = container
      .root_scope()
      .inject_with::<String, _>(None, || crate::parameters![5u32]);
    assert_eq!(handle.get().unwrap().as_str(), "id-5");
  }
}
