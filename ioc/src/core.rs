//! Core, non-public resolution machinery.

use crate::error::{Error, Result};
use crate::qualifier::DefinitionKey;

use std::cell::RefCell;
use std::collections::HashSet;

thread_local! {
  // Definitions currently being built on this thread, per owning scope.
  static RESOLVING_STACK: RefCell<HashSet<ResolutionKey>> = RefCell::new(HashSet::new());
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct ResolutionKey {
  scope: usize,
  key: DefinitionKey,
}

/// An RAII guard detecting circular dependencies.
///
/// Entering adds the (scope, definition) pair to the thread-local resolution
/// stack and fails if it is already there; dropping removes it. Entering
/// before touching the instance holder keeps a cycle from re-entering the
/// holder's initialization, which would otherwise block forever.
pub(crate) struct ResolutionGuard {
  key: ResolutionKey,
}

impl ResolutionGuard {
  pub(crate) fn enter(scope: usize, key: &DefinitionKey) -> Result<Self> {
    let key = ResolutionKey {
      scope,
      key: key.clone(),
    };
    RESOLVING_STACK.with(|stack| {
      // `insert` returns `false` if the value was already present.
      if stack.borrow_mut().insert(key.clone()) {
        Ok(Self { key })
      } else {
        Err(Error::CircularDependency {
          type_name: key.key.type_key.name(),
          qualifier: key.key.qualifier_name(),
        })
      }
    })
  }
}

impl Drop for ResolutionGuard {
  fn drop(&mut self) {
    RESOLVING_STACK.with(|stack| {
      stack.borrow_mut().remove(&self.key);
    });
  }
}
