//! Per-definition instance caching.

use crate::context::Context;
use crate::definition::{Definition, Instance, Kind};
use crate::error::Result;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::sync::Arc;

/// Holds the cached value of one definition inside one scope.
///
/// Single and scoped definitions move from empty to cached on the first
/// successful resolution. The cell is a `OnceCell`, so concurrent resolvers
/// block on the first initializer and all observe the same value; a failing
/// factory leaves it empty. Releasing swaps in a fresh cell, so a released
/// value is never handed out again.
///
/// The read lock on the cell is held while the factory runs, so `release`
/// waits for an in-flight construction and releases what it produced. A
/// factory must not close the scope that is building it.
#[derive(Debug)]
pub(crate) struct InstanceHolder {
  definition: Arc<Definition>,
  cell: RwLock<Arc<OnceCell<Instance>>>,
}

impl InstanceHolder {
  pub(crate) fn new(definition: Arc<Definition>) -> Self {
    Self {
      definition,
      cell: RwLock::new(Arc::new(OnceCell::new())),
    }
  }

  pub(crate) fn definition(&self) -> &Arc<Definition> {
    &self.definition
  }

  pub(crate) fn get(&self, ctx: &Context<'_>) -> Result<Instance> {
    match self.definition.kind {
      Kind::Factory => (self.definition.factory)(ctx),
      Kind::Single | Kind::Scoped => {
        let cell = self.cell.read();
        let instance = cell.get_or_try_init(|| (self.definition.factory)(ctx))?.clone();
        Ok(instance)
      }
    }
  }

  #[cfg(test)]
  pub(crate) fn is_created(&self) -> bool {
    self.cell.read().get().is_some()
  }

  /// Drops the cached value, running the definition's release hook on it.
  pub(crate) fn release(&self) {
    let previous = std::mem::replace(&mut *self.cell.write(), Arc::new(OnceCell::new()));
    if let Some(instance) = previous.get() {
      self.definition.run_release_hook(instance);
    }
  }
}
