//! The main `Container` struct and its associated methods.

use crate::builder::ContainerBuilder;
use crate::definition::{Definition, DefinitionOptions};
use crate::error::{Error, Result};
use crate::module::{Module, ScopeSet, ScopeSetDeclaration};
use crate::parameters::Parameters;
use crate::qualifier::{DefinitionKey, Qualifier, TypeKey};
use crate::scope::{Scope, ScopeCallback, ScopeId, Strategy, ROOT_SCOPE_ID};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub(crate) struct ContainerInner {
  root: Scope,
  scopes: DashMap<ScopeId, Scope>,
  scope_sets: RwLock<HashMap<Qualifier, ScopeSet>>,
  properties: DashMap<String, Arc<dyn Any + Send + Sync>>,
  pub(crate) allow_override: bool,
  // Serializes module load/unload and scope-set rewrites.
  module_lock: Mutex<()>,
}

impl ContainerInner {
  pub(crate) fn forget_scope(&self, scope: &Scope) {
    self
      .scopes
      .remove_if(scope.id(), |_, registered| registered.ptr_eq(scope));
  }
}

/// The dependency injection container.
///
/// It owns the root scope, every named and object scope, the loaded scope
/// sets and the property store. `Container` is a cheap handle; clones share
/// the same state. It is thread-safe: scopes and definitions may be created
/// and resolved from any thread.
#[derive(Clone)]
pub struct Container {
  inner: Arc<ContainerInner>,
}

impl Default for Container {
  fn default() -> Self {
    Self::new()
  }
}

fn object_scope_id<O: Any>(owner: &Arc<O>) -> ScopeId {
  format!("{}@{:p}", std::any::type_name::<O>(), Arc::as_ptr(owner))
}

impl Container {
  /// Creates a new, empty `Container`.
  pub fn new() -> Self {
    Self::with_override(false)
  }

  /// A builder configuring modules, properties and override policy.
  pub fn builder() -> ContainerBuilder {
    ContainerBuilder::new()
  }

  pub(crate) fn with_override(allow_override: bool) -> Self {
    let inner = Arc::new_cyclic(|weak| ContainerInner {
      root: Scope::root(weak.clone()),
      scopes: DashMap::new(),
      scope_sets: RwLock::new(HashMap::new()),
      properties: DashMap::new(),
      allow_override,
      module_lock: Mutex::new(()),
    });
    Self { inner }
  }

  pub(crate) fn from_inner(inner: Arc<ContainerInner>) -> Self {
    Self { inner }
  }

  /// The scope holding every module-level definition.
  pub fn root_scope(&self) -> &Scope {
    &self.inner.root
  }

  /// Whether both handles refer to the same container.
  pub fn ptr_eq(&self, other: &Container) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  // --- Modules ---

  /// Loads a batch of modules.
  ///
  /// Root definitions go to the root scope, scoped ones to their scope set.
  /// The batch is checked for conflicts before anything is registered, so a
  /// failing load leaves the container untouched. Eager instances of the
  /// root scope are created afterwards.
  pub fn load_modules(&self, modules: &[Module]) -> Result<()> {
    self.register_modules(modules)?;
    self.create_eager_instances()
  }

  pub(crate) fn register_modules(&self, modules: &[Module]) -> Result<()> {
    let _lock = self.inner.module_lock.lock();
    let allow_override = self.inner.allow_override;

    let root_definitions: Vec<Arc<Definition>> =
      modules.iter().flat_map(|module| module.root_definitions()).collect();
    let mut pending: IndexMap<Qualifier, (&ScopeSetDeclaration, Vec<Arc<Definition>>)> = IndexMap::new();
    for (declaration, definitions) in modules.iter().flat_map(|module| module.scope_sets()) {
      pending
        .entry(declaration.qualifier().clone())
        .or_insert_with(|| (declaration, Vec::new()))
        .1
        .extend(definitions);
    }

    {
      let sets = self.inner.scope_sets.read();
      for (qualifier, (declaration, definitions)) in &pending {
        match sets.get(qualifier) {
          Some(set) => set.check(definitions, allow_override)?,
          None => ScopeSet::new(declaration).check(definitions, allow_override)?,
        }
      }
    }

    let root_count = root_definitions.len();
    self.inner.root.save_definitions(root_definitions)?;

    let mut scoped_count = 0;
    let mut sets = self.inner.scope_sets.write();
    for module in modules {
      for (declaration, definitions) in module.scope_sets() {
        scoped_count += definitions.len();
        sets
          .entry(declaration.qualifier().clone())
          .or_insert_with(|| ScopeSet::new(declaration))
          .merge(declaration, definitions);
      }
    }
    tracing::debug!(
      "loaded {} definitions and {} scoped definitions from {} modules",
      root_count,
      scoped_count,
      modules.len()
    );
    Ok(())
  }

  /// Removes every definition of the given modules from the root scope and
  /// from the scope sets. Live scopes keep what they already hold.
  pub fn unload_modules(&self, modules: &[Module]) {
    let _lock = self.inner.module_lock.lock();
    let keys: Vec<DefinitionKey> = modules
      .iter()
      .flat_map(|module| module.root_definitions())
      .map(|definition| definition.key())
      .collect();
    let removed = self.inner.root.remove_definitions(&keys);

    let mut sets = self.inner.scope_sets.write();
    for module in modules {
      for (declaration, definitions) in module.scope_sets() {
        if let Some(set) = sets.get_mut(declaration.qualifier()) {
          for definition in definitions {
            set.remove(&definition.key());
          }
        }
      }
    }
    tracing::debug!("unloaded {} definitions from {} modules", removed, modules.len());
  }

  /// Builds every root definition flagged `create_on_start`, in
  /// registration order.
  pub fn create_eager_instances(&self) -> Result<()> {
    let count = self.inner.root.create_eager_instances()?;
    if count > 0 {
      tracing::debug!("created {} eager instances", count);
    }
    Ok(())
  }

  pub(crate) fn scope_set_definition(&self, scope_set: &Qualifier, key: &DefinitionKey) -> Option<Arc<Definition>> {
    self
      .inner
      .scope_sets
      .read()
      .get(scope_set)
      .and_then(|set| set.get(key))
  }

  pub(crate) fn save_in_scope_set(&self, scope_set: &Qualifier, definition: Arc<Definition>) {
    let _lock = self.inner.module_lock.lock();
    if let Some(set) = self.inner.scope_sets.write().get_mut(scope_set) {
      set.save(definition);
    }
  }

  // --- Scopes ---

  /// Creates a scope of set `scope_set` below the root scope.
  pub fn create_scope(&self, id: impl Into<ScopeId>, scope_set: impl Into<Qualifier>) -> Result<Scope> {
    self.create_scope_in(id.into(), scope_set.into(), self.inner.root.clone(), Strategy::Default)
  }

  /// The live scope `id`, or a new one of set `scope_set` if there is none.
  pub fn get_or_create_scope(&self, id: impl Into<ScopeId>, scope_set: impl Into<Qualifier>) -> Result<Scope> {
    let id = id.into();
    if let Some(scope) = self.get_scope_or_none(&id) {
      return Ok(scope);
    }
    match self.create_scope(id.clone(), scope_set) {
      Err(Error::ScopeAlreadyExists(_)) => self.get_scope(&id),
      other => other,
    }
  }

  /// Creates a scope bound to `owner`; the owner resolves as `O` from it.
  pub fn create_object_scope<O: Any + Send + Sync>(
    &self,
    owner: Arc<O>,
    scope_set: impl Into<Qualifier>,
  ) -> Result<Scope> {
    let id = object_scope_id(&owner);
    let strategy = Strategy::Object {
      owner: Arc::new(owner),
      owner_type: TypeKey::of::<O>(),
      observer: None,
    };
    self.create_scope_in(id, scope_set.into(), self.inner.root.clone(), strategy)
  }

  /// Like [`create_object_scope`](Self::create_object_scope), and `owner` is
  /// notified exactly once when the scope closes.
  pub fn create_observed_object_scope<O: ScopeCallback + Any>(
    &self,
    owner: Arc<O>,
    scope_set: impl Into<Qualifier>,
  ) -> Result<Scope> {
    let id = object_scope_id(&owner);
    let strategy = Strategy::Object {
      owner: Arc::new(owner.clone()),
      owner_type: TypeKey::of::<O>(),
      observer: Some(owner),
    };
    self.create_scope_in(id, scope_set.into(), self.inner.root.clone(), strategy)
  }

  pub(crate) fn create_scope_in(
    &self,
    id: ScopeId,
    scope_set: Qualifier,
    parent: Scope,
    strategy: Strategy,
  ) -> Result<Scope> {
    if id == ROOT_SCOPE_ID || self.inner.scopes.contains_key(&id) {
      return Err(Error::ScopeAlreadyExists(id));
    }
    if parent.is_closed() {
      return Err(Error::ScopeClosed {
        scope_id: parent.id().to_owned(),
      });
    }
    let (header, definitions) = {
      let sets = self.inner.scope_sets.read();
      let set = sets
        .get(&scope_set)
        .ok_or_else(|| Error::NoScopeSetFound(scope_set.to_string()))?;
      (set.header.clone(), set.definitions())
    };

    let scope = Scope::child(id.clone(), header, parent, strategy, definitions)?;
    match self.inner.scopes.entry(id) {
      Entry::Occupied(entry) => Err(Error::ScopeAlreadyExists(entry.key().clone())),
      Entry::Vacant(entry) => {
        entry.insert(scope.clone());
        tracing::debug!("created {}", scope);
        Ok(scope)
      }
    }
  }

  /// The live scope `id`, failing with `ScopeNotFound`. `"-Root-"` is the root scope.
  pub fn get_scope(&self, id: &str) -> Result<Scope> {
    self
      .get_scope_or_none(id)
      .ok_or_else(|| Error::ScopeNotFound(id.to_owned()))
  }

  /// Like [`get_scope`](Self::get_scope), returning `None` for unknown ids.
  pub fn get_scope_or_none(&self, id: &str) -> Option<Scope> {
    if id == ROOT_SCOPE_ID {
      return Some(self.inner.root.clone());
    }
    self.inner.scopes.get(id).map(|entry| entry.value().clone())
  }

  /// Closes and forgets the scope with the given id, if any.
  pub fn delete_scope(&self, id: &str) {
    let scope = self.inner.scopes.get(id).map(|entry| entry.value().clone());
    if let Some(scope) = scope {
      scope.close();
    }
  }

  /// Number of live scopes, not counting the root scope.
  pub fn scope_count(&self) -> usize {
    self.inner.scopes.len()
  }

  // --- Properties ---

  /// Stores `value` under `key`, replacing any previous value.
  pub fn set_property<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
    self.insert_property(key.into(), Arc::new(value));
  }

  pub(crate) fn insert_property(&self, key: String, value: Arc<dyn Any + Send + Sync>) {
    self.inner.properties.insert(key, value);
  }

  /// The property stored under `key`, if it exists and is a `T`.
  pub fn get_property<T: Any + Clone + Send + Sync>(&self, key: &str) -> Option<T> {
    self
      .inner
      .properties
      .get(key)
      .and_then(|entry| entry.value().downcast_ref::<T>().cloned())
  }

  /// The property under `key`, or `default` if it is missing or not a `T`.
  pub fn get_property_or<T: Any + Clone + Send + Sync>(&self, key: &str, default: T) -> T {
    self.get_property(key).unwrap_or(default)
  }

  /// The property under `key`, failing with `MissingProperty`.
  pub fn require_property<T: Any + Clone + Send + Sync>(&self, key: &str) -> Result<T> {
    self.get_property(key).ok_or_else(|| Error::MissingProperty {
      key: key.to_owned(),
    })
  }

  /// Removes the property under `key`, if any.
  pub fn delete_property(&self, key: &str) {
    self.inner.properties.remove(key);
  }

  // --- Resolution from the root scope ---

  /// Resolves the unqualified definition of `T` from the root scope.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.inner.root.get::<T>()
  }

  /// Resolves `T` under `qualifier` from the root scope.
  pub fn get_named<T: ?Sized + Any + Send + Sync>(&self, qualifier: impl Into<Qualifier>) -> Result<Arc<T>> {
    self.inner.root.get_named::<T>(qualifier)
  }

  /// See [`Scope::resolve`].
  pub fn resolve<T: ?Sized + Any + Send + Sync>(
    &self,
    qualifier: Option<&Qualifier>,
    parameters: Parameters,
  ) -> Result<Arc<T>> {
    self.inner.root.resolve::<T>(qualifier, parameters)
  }

  /// See [`Scope::resolve_or_none`].
  pub fn resolve_or_none<T: ?Sized + Any + Send + Sync>(
    &self,
    qualifier: Option<&Qualifier>,
    parameters: Parameters,
  ) -> Option<Arc<T>> {
    self.inner.root.resolve_or_none::<T>(qualifier, parameters)
  }

  /// Every root definition of `T`, in declaration order.
  pub fn resolve_all<T: ?Sized + Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>> {
    self.inner.root.resolve_all::<T>()
  }

  /// See [`Scope::bind`].
  pub fn bind<P, S>(&self, parameters: Parameters) -> Result<Arc<S>>
  where
    P: ?Sized + Any + Send + Sync,
    S: ?Sized + Any + Send + Sync,
  {
    self.inner.root.bind::<P, S>(parameters)
  }

  /// Registers `value` in the root scope; see [`Scope::declare`].
  pub fn declare<T: Any + Send + Sync>(
    &self,
    value: T,
    qualifier: Option<Qualifier>,
    allow_override: bool,
  ) -> Result<()> {
    self.inner.root.declare(value, qualifier, allow_override)
  }

  /// See [`Scope::declare_with`].
  pub fn declare_with<T, F>(&self, value: Arc<T>, configure: F) -> Result<()>
  where
    T: ?Sized + Any + Send + Sync,
    F: FnOnce(&mut DefinitionOptions<'_, T>),
  {
    self.inner.root.declare_with(value, configure)
  }

  // --- Lifecycle ---

  /// Closes every scope, then releases the root scope's instances and the
  /// properties.
  pub fn close(&self) {
    let scopes: Vec<Scope> = self
      .inner
      .scopes
      .iter()
      .map(|entry| entry.value().clone())
      .collect();
    for scope in &scopes {
      scope.close();
    }
    self.inner.root.close();
    self.inner.properties.clear();
    tracing::info!("container closed, {} scopes released", scopes.len());
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("root", &self.inner.root)
      .field("scopes", &self.inner.scopes.len())
      .field("scope_sets", &self.inner.scope_sets.read().len())
      .field("properties", &self.inner.properties.len())
      .field("allow_override", &self.inner.allow_override)
      .finish()
  }
}
