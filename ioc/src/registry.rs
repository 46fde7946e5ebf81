//! The definition registry owned by each scope.

use crate::definition::Definition;
use crate::error::{Error, Result};
use crate::instance::InstanceHolder;
use crate::qualifier::{DefinitionKey, Qualifier, TypeKey};

use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Indexes definitions by identity key, in insertion order, each with its
/// instance holder.
///
/// Methods that drop an entry hand the removed holders back to the caller,
/// which releases them once the registry lock is gone so release hooks never
/// run under it.
#[derive(Default)]
pub(crate) struct DefinitionRegistry {
  entries: IndexMap<DefinitionKey, Arc<InstanceHolder>>,
}

fn conflict(key: &DefinitionKey) -> Error {
  Error::DefinitionConflict {
    type_name: key.type_key.name(),
    qualifier: key.qualifier_name(),
  }
}

impl DefinitionRegistry {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Saves a definition, returning the holder it replaced.
  pub(crate) fn save(
    &mut self,
    definition: Arc<Definition>,
    allow_override: bool,
  ) -> Result<Option<Arc<InstanceHolder>>> {
    let key = definition.key();
    if self.entries.contains_key(&key) && !(allow_override || definition.allow_override) {
      return Err(conflict(&key));
    }
    let replaced = self
      .entries
      .insert(key, Arc::new(InstanceHolder::new(definition)));
    if let Some(old) = &replaced {
      tracing::warn!("definition {} overridden", old.definition());
    }
    Ok(replaced)
  }

  /// Saves a batch of definitions, all or nothing.
  pub(crate) fn save_all(
    &mut self,
    definitions: Vec<Arc<Definition>>,
    allow_override: bool,
  ) -> Result<Vec<Arc<InstanceHolder>>> {
    let mut seen = HashSet::with_capacity(definitions.len());
    for definition in &definitions {
      let key = definition.key();
      let taken = self.entries.contains_key(&key) || seen.contains(&key);
      if taken && !(allow_override || definition.allow_override) {
        return Err(conflict(&key));
      }
      seen.insert(key);
    }
    let mut replaced = Vec::new();
    for definition in definitions {
      if let Some(old) = self.save(definition, true)? {
        replaced.push(old);
      }
    }
    Ok(replaced)
  }

  pub(crate) fn get(&self, key: &DefinitionKey) -> Option<Arc<InstanceHolder>> {
    self.entries.get(key).cloned()
  }

  /// Primary type match first, then the first secondary type match.
  pub(crate) fn find(
    &self,
    qualifier: Option<&Qualifier>,
    type_key: TypeKey,
  ) -> Option<Arc<InstanceHolder>> {
    let key = DefinitionKey::new(type_key, qualifier.cloned());
    if let Some(holder) = self.entries.get(&key) {
      return Some(holder.clone());
    }
    self
      .entries
      .values()
      .find(|holder| {
        let definition = holder.definition();
        definition.qualifier.as_ref() == qualifier && definition.has_secondary(type_key)
      })
      .cloned()
  }

  pub(crate) fn find_all(&self, type_key: TypeKey) -> Vec<Arc<InstanceHolder>> {
    self
      .entries
      .values()
      .filter(|holder| {
        let definition = holder.definition();
        definition.primary == type_key || definition.has_secondary(type_key)
      })
      .cloned()
      .collect()
  }

  pub(crate) fn find_bound(&self, primary: TypeKey, secondary: TypeKey) -> Option<Arc<InstanceHolder>> {
    self
      .entries
      .values()
      .find(|holder| {
        let definition = holder.definition();
        definition.primary == primary && definition.has_secondary(secondary)
      })
      .cloned()
  }

  pub(crate) fn find_eagerly_created(&self) -> Vec<Arc<InstanceHolder>> {
    self
      .entries
      .values()
      .filter(|holder| holder.definition().create_on_start)
      .cloned()
      .collect()
  }

  pub(crate) fn remove(&mut self, key: &DefinitionKey) -> Option<Arc<InstanceHolder>> {
    self.entries.shift_remove(key)
  }

  /// Every holder, keeping the definitions registered.
  pub(crate) fn holders(&self) -> Vec<Arc<InstanceHolder>> {
    self.entries.values().cloned().collect()
  }

  /// Removes every definition.
  pub(crate) fn clear(&mut self) -> Vec<Arc<InstanceHolder>> {
    self.entries.drain(..).map(|(_, holder)| holder).collect()
  }

  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }
}
