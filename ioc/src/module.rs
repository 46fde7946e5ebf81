//! Modules: batches of definitions loaded into and unloaded from a container.

use crate::context::Context;
use crate::definition::{Definition, DefinitionOptions, Kind};
use crate::error::{Error, Result};
use crate::qualifier::{DefinitionKey, Qualifier};

use indexmap::IndexMap;
use std::any::Any;
use std::sync::Arc;

/// A batch of definitions, loaded with
/// [`Container::load_modules`](crate::Container::load_modules) and removed as a
/// batch with [`Container::unload_modules`](crate::Container::unload_modules).
///
/// ```
/// use fibre_di::{Module, Qualifier};
///
/// struct Config { url: String }
/// struct Session { url: String }
/// struct Activity;
///
/// let mut module = Module::new();
/// module.single(|_| Ok(Config { url: "db://local".into() })).create_on_start();
/// module.scope(Qualifier::of::<Activity>(), |set| {
///   set.scoped(|ctx| Ok(Session { url: ctx.get::<Config>()?.url.clone() }));
/// });
/// assert_eq!(module.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Module {
  definitions: Vec<Definition>,
  scope_sets: Vec<ScopeSetDeclaration>,
  overriding: bool,
}

fn push<T: ?Sized + Any + Send + Sync>(
  definitions: &mut Vec<Definition>,
  definition: Definition,
) -> DefinitionOptions<'_, T> {
  let index = definitions.len();
  definitions.push(definition);
  DefinitionOptions::new(&mut definitions[index])
}

fn sized<T, F>(kind: Kind, factory: F) -> Definition
where
  T: Any + Send + Sync,
  F: Fn(&Context<'_>) -> Result<T> + Send + Sync + 'static,
{
  Definition::new::<T, _>(kind, move |ctx| factory(ctx).map(Arc::new))
}

impl Module {
  pub fn new() -> Self {
    Self::default()
  }

  /// A module whose definitions may replace existing ones.
  pub fn overriding() -> Self {
    Self {
      overriding: true,
      ..Self::default()
    }
  }

  /// Declares a definition created once and shared.
  pub fn single<T, F>(&mut self, factory: F) -> DefinitionOptions<'_, T>
  where
    T: Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<T> + Send + Sync + 'static,
  {
    push(&mut self.definitions, sized(Kind::Single, factory))
  }

  /// Declares a definition created on every resolution.
  pub fn factory<T, F>(&mut self, factory: F) -> DefinitionOptions<'_, T>
  where
    T: Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<T> + Send + Sync + 'static,
  {
    push(&mut self.definitions, sized(Kind::Factory, factory))
  }

  /// Like [`single`](Self::single), for an already shared value such as a
  /// trait object.
  pub fn single_trait<T, F>(&mut self, factory: F) -> DefinitionOptions<'_, T>
  where
    T: ?Sized + Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
  {
    push(&mut self.definitions, Definition::new::<T, _>(Kind::Single, factory))
  }

  pub fn factory_trait<T, F>(&mut self, factory: F) -> DefinitionOptions<'_, T>
  where
    T: ?Sized + Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
  {
    push(&mut self.definitions, Definition::new::<T, _>(Kind::Factory, factory))
  }

  /// Declares (or extends) the scope set named `qualifier`.
  pub fn scope<F>(&mut self, qualifier: impl Into<Qualifier>, declare: F) -> &mut Self
  where
    F: FnOnce(&mut ScopeSetDeclaration),
  {
    let qualifier = qualifier.into();
    let index = match self.scope_sets.iter().position(|s| s.qualifier == qualifier) {
      Some(index) => index,
      None => {
        self.scope_sets.push(ScopeSetDeclaration::new(qualifier));
        self.scope_sets.len() - 1
      }
    };
    declare(&mut self.scope_sets[index]);
    self
  }

  /// Number of definitions, root and scoped.
  pub fn len(&self) -> usize {
    self.definitions.len()
      + self
        .scope_sets
        .iter()
        .map(|s| s.definitions.len())
        .sum::<usize>()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub(crate) fn root_definitions(&self) -> impl Iterator<Item = Arc<Definition>> + '_ {
    self.definitions.iter().map(|d| self.finish(d))
  }

  pub(crate) fn scope_sets(&self) -> impl Iterator<Item = (&ScopeSetDeclaration, Vec<Arc<Definition>>)> + '_ {
    self
      .scope_sets
      .iter()
      .map(|s| (s, s.definitions.iter().map(|d| self.finish(d)).collect()))
  }

  fn finish(&self, definition: &Definition) -> Arc<Definition> {
    let mut definition = definition.clone();
    definition.allow_override |= self.overriding;
    Arc::new(definition)
  }
}

/// The declaration of a scope set inside a [`Module`].
#[derive(Clone)]
pub struct ScopeSetDeclaration {
  qualifier: Qualifier,
  parent: Option<Qualifier>,
  validate_parent: bool,
  definitions: Vec<Definition>,
}

impl ScopeSetDeclaration {
  fn new(qualifier: Qualifier) -> Self {
    Self {
      qualifier,
      parent: None,
      validate_parent: false,
      definitions: Vec::new(),
    }
  }

  fn add<T: ?Sized + Any + Send + Sync>(&mut self, mut definition: Definition) -> DefinitionOptions<'_, T> {
    definition.scope_qualifier = Some(self.qualifier.clone());
    push(&mut self.definitions, definition)
  }

  pub fn qualifier(&self) -> &Qualifier {
    &self.qualifier
  }

  /// Declares the scope set expected for the parent of scopes of this set.
  pub fn child_of(&mut self, parent: impl Into<Qualifier>) -> &mut Self {
    self.parent = Some(parent.into());
    self
  }

  /// Makes resolution fail when a scope's live parent is not of the declared
  /// parent set (the root scope when no parent set is declared).
  pub fn validate_parent(&mut self) -> &mut Self {
    self.validate_parent = true;
    self
  }

  /// Declares a definition created once per scope.
  pub fn scoped<T, F>(&mut self, factory: F) -> DefinitionOptions<'_, T>
  where
    T: Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<T> + Send + Sync + 'static,
  {
    self.add(sized(Kind::Scoped, factory))
  }

  pub fn scoped_trait<T, F>(&mut self, factory: F) -> DefinitionOptions<'_, T>
  where
    T: ?Sized + Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
  {
    self.add(Definition::new::<T, _>(Kind::Scoped, factory))
  }

  pub fn factory<T, F>(&mut self, factory: F) -> DefinitionOptions<'_, T>
  where
    T: Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<T> + Send + Sync + 'static,
  {
    self.add(sized(Kind::Factory, factory))
  }

  pub fn factory_trait<T, F>(&mut self, factory: F) -> DefinitionOptions<'_, T>
  where
    T: ?Sized + Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
  {
    self.add(Definition::new::<T, _>(Kind::Factory, factory))
  }
}

/// The identity of a scope set as seen by the scopes created from it.
#[derive(Clone, Debug)]
pub(crate) struct ScopeSetHeader {
  pub(crate) qualifier: Qualifier,
  pub(crate) parent: Option<Qualifier>,
  pub(crate) validate_parent: bool,
}

/// A loaded scope set: the template every scope of the set is built from.
pub(crate) struct ScopeSet {
  pub(crate) header: ScopeSetHeader,
  definitions: IndexMap<DefinitionKey, Arc<Definition>>,
}

impl ScopeSet {
  pub(crate) fn new(declaration: &ScopeSetDeclaration) -> Self {
    Self {
      header: ScopeSetHeader {
        qualifier: declaration.qualifier.clone(),
        parent: declaration.parent.clone(),
        validate_parent: declaration.validate_parent,
      },
      definitions: IndexMap::new(),
    }
  }

  /// Checks that `definitions` can be merged without an unallowed conflict.
  pub(crate) fn check(&self, definitions: &[Arc<Definition>], allow_override: bool) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for definition in definitions {
      let key = definition.key();
      let taken = self.definitions.contains_key(&key) || !seen.insert(key.clone());
      if taken && !(allow_override || definition.allow_override) {
        return Err(Error::DefinitionConflict {
          type_name: key.type_key.name(),
          qualifier: key.qualifier_name(),
        });
      }
    }
    Ok(())
  }

  pub(crate) fn merge(&mut self, declaration: &ScopeSetDeclaration, definitions: Vec<Arc<Definition>>) {
    if declaration.parent.is_some() {
      self.header.parent = declaration.parent.clone();
    }
    self.header.validate_parent |= declaration.validate_parent;
    for definition in definitions {
      self.save(definition);
    }
  }

  pub(crate) fn save(&mut self, definition: Arc<Definition>) {
    self.definitions.insert(definition.key(), definition);
  }

  pub(crate) fn get(&self, key: &DefinitionKey) -> Option<Arc<Definition>> {
    self.definitions.get(key).cloned()
  }

  pub(crate) fn remove(&mut self, key: &DefinitionKey) {
    self.definitions.shift_remove(key);
  }

  pub(crate) fn definitions(&self) -> Vec<Arc<Definition>> {
    self.definitions.values().cloned().collect()
  }
}
