//! Scopes: resolution contexts forming a tree below the root scope.

use crate::container::{Container, ContainerInner};
use crate::context::Context;
use crate::core::ResolutionGuard;
use crate::definition::{downcast, Definition, DefinitionOptions, Instance, Kind};
use crate::error::{Error, Result};
use crate::instance::InstanceHolder;
use crate::module::ScopeSetHeader;
use crate::parameters::Parameters;
use crate::qualifier::{DefinitionKey, Qualifier, TypeKey};
use crate::registry::DefinitionRegistry;

use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

/// Identifier of a scope inside its container.
pub type ScopeId = String;

pub(crate) const ROOT_SCOPE_ID: &str = "-Root-";

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// Observer notified once when a scope closes.
pub trait ScopeCallback: Send + Sync {
  fn on_scope_close(&self, scope: &Scope);
}

impl<F> ScopeCallback for F
where
  F: Fn(&Scope) + Send + Sync,
{
  fn on_scope_close(&self, scope: &Scope) {
    self(scope)
  }
}

/// How a scope looks definitions up.
pub(crate) enum Strategy {
  /// Own registry only.
  Root,
  /// Own registry, then the parent chain.
  Default,
  /// Like `Default`, and the owner value resolves as its own type.
  Object {
    owner: Instance,
    owner_type: TypeKey,
    observer: Option<Arc<dyn ScopeCallback>>,
  },
}

#[derive(Clone, Copy)]
enum Release {
  Close,
  TearDown,
}

struct ScopeInner {
  id: ScopeId,
  scope_set: Option<ScopeSetHeader>,
  parent: Option<Scope>,
  strategy: Strategy,
  registry: RwLock<DefinitionRegistry>,
  callbacks: Mutex<Vec<Arc<dyn ScopeCallback>>>,
  state: AtomicU8,
  container: Weak<ContainerInner>,
}

/// A resolution context with its own definitions and an optional parent.
///
/// `Scope` is a cheap handle; clones refer to the same scope.
#[derive(Clone)]
pub struct Scope {
  inner: Arc<ScopeInner>,
}

fn same_object(a: &Arc<dyn ScopeCallback>, b: &Arc<dyn ScopeCallback>) -> bool {
  std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl Scope {
  pub(crate) fn root(container: Weak<ContainerInner>) -> Self {
    Self {
      inner: Arc::new(ScopeInner {
        id: ROOT_SCOPE_ID.to_owned(),
        scope_set: None,
        parent: None,
        strategy: Strategy::Root,
        registry: RwLock::new(DefinitionRegistry::new()),
        callbacks: Mutex::new(Vec::new()),
        state: AtomicU8::new(OPEN),
        container,
      }),
    }
  }

  pub(crate) fn child(
    id: ScopeId,
    scope_set: ScopeSetHeader,
    parent: Scope,
    strategy: Strategy,
    definitions: Vec<Arc<Definition>>,
  ) -> Result<Self> {
    let mut registry = DefinitionRegistry::new();
    registry.save_all(definitions, true)?;
    let container = parent.inner.container.clone();
    Ok(Self {
      inner: Arc::new(ScopeInner {
        id,
        scope_set: Some(scope_set),
        parent: Some(parent),
        strategy,
        registry: RwLock::new(registry),
        callbacks: Mutex::new(Vec::new()),
        state: AtomicU8::new(OPEN),
        container,
      }),
    })
  }

  /// The id this scope was created with.
  pub fn id(&self) -> &str {
    &self.inner.id
  }

  /// Qualifier of the scope set this scope was created from; `None` for the root.
  pub fn scope_set(&self) -> Option<&Qualifier> {
    self.inner.scope_set.as_ref().map(|header| &header.qualifier)
  }

  /// The scope lookups fall back to; `None` for the root.
  pub fn parent(&self) -> Option<&Scope> {
    self.inner.parent.as_ref()
  }

  /// Whether this is the container's root scope.
  pub fn is_root(&self) -> bool {
    matches!(self.inner.strategy, Strategy::Root)
  }

  /// Whether `close` or `tear_down` has started on this scope.
  pub fn is_closed(&self) -> bool {
    self.inner.state.load(Ordering::Acquire) != OPEN
  }

  pub(crate) fn ptr_eq(&self, other: &Scope) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  /// The container owning this scope.
  pub fn container(&self) -> Result<Container> {
    self
      .inner
      .container
      .upgrade()
      .map(Container::from_inner)
      .ok_or_else(|| self.closed_error())
  }

  fn closed_error(&self) -> Error {
    Error::ScopeClosed {
      scope_id: self.inner.id.clone(),
    }
  }

  fn ensure_open(&self) -> Result<()> {
    if self.inner.state.load(Ordering::Acquire) == CLOSED {
      return Err(self.closed_error());
    }
    Ok(())
  }

  // --- Resolution ---

  /// Resolves `T`, optionally qualified, with the given parameters.
  pub fn resolve<T: ?Sized + Any + Send + Sync>(
    &self,
    qualifier: Option<&Qualifier>,
    parameters: Parameters,
  ) -> Result<Arc<T>> {
    self.resolve_shared(qualifier, &parameters)
  }

  /// Resolves the unqualified definition of `T`.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.resolve_shared(None, &Parameters::new())
  }

  /// Resolves `T` under `qualifier`.
  pub fn get_named<T: ?Sized + Any + Send + Sync>(&self, qualifier: impl Into<Qualifier>) -> Result<Arc<T>> {
    self.resolve_shared(Some(&qualifier.into()), &Parameters::new())
  }

  /// Resolves the unqualified definition of `T`, supplying `parameters` to its factory.
  pub fn get_with<T: ?Sized + Any + Send + Sync>(&self, parameters: Parameters) -> Result<Arc<T>> {
    self.resolve_shared(None, &parameters)
  }

  /// Like [`resolve`](Self::resolve), turning any failure into `None`.
  pub fn resolve_or_none<T: ?Sized + Any + Send + Sync>(
    &self,
    qualifier: Option<&Qualifier>,
    parameters: Parameters,
  ) -> Option<Arc<T>> {
    match self.resolve_shared::<T>(qualifier, &parameters) {
      Ok(value) => Some(value),
      Err(e) => {
        tracing::error!(
          scope = %self.inner.id,
          "Can't get instance for '{}': {}",
          std::any::type_name::<T>(),
          e
        );
        None
      }
    }
  }

  pub(crate) fn resolve_shared<T: ?Sized + Any + Send + Sync>(
    &self,
    qualifier: Option<&Qualifier>,
    parameters: &Parameters,
  ) -> Result<Arc<T>> {
    let type_key = TypeKey::of::<T>();
    let instance = if tracing::enabled!(tracing::Level::DEBUG) {
      tracing::debug!(scope = %self.inner.id, "+- get '{}'", type_key.name());
      let start = Instant::now();
      let instance = self.resolve_instance(type_key, qualifier, parameters)?;
      tracing::debug!(
        scope = %self.inner.id,
        "+- got '{}' in {:.3} ms",
        type_key.name(),
        start.elapsed().as_secs_f64() * 1000.0
      );
      instance
    } else {
      self.resolve_instance(type_key, qualifier, parameters)?
    };
    downcast::<T>(&instance).ok_or_else(|| not_found(type_key, qualifier))
  }

  fn resolve_instance(
    &self,
    type_key: TypeKey,
    qualifier: Option<&Qualifier>,
    parameters: &Parameters,
  ) -> Result<Instance> {
    self.ensure_open()?;
    if !self.is_root() {
      self.check_parent()?;
    }

    let found = self.inner.registry.read().find(qualifier, type_key);
    if let Some(holder) = found {
      return self.create(&holder, type_key, parameters);
    }

    match &self.inner.strategy {
      Strategy::Root => Err(not_found(type_key, qualifier)),
      Strategy::Object {
        owner, owner_type, ..
      } if qualifier.is_none() && *owner_type == type_key => Ok(owner.clone()),
      Strategy::Default | Strategy::Object { .. } => match &self.inner.parent {
        Some(parent) => parent.resolve_instance(type_key, qualifier, parameters),
        None => Err(not_found(type_key, qualifier)),
      },
    }
  }

  /// Builds (or fetches) the instance of a definition owned by this scope and
  /// views it as `requested`.
  fn create(
    &self,
    holder: &InstanceHolder,
    requested: TypeKey,
    parameters: &Parameters,
  ) -> Result<Instance> {
    let definition = holder.definition();
    let _guard = ResolutionGuard::enter(Arc::as_ptr(&self.inner) as usize, &definition.key())?;
    let ctx = Context::new(self, parameters, definition.primary.name());
    let instance = holder.get(&ctx)?;
    // Closed while the factory ran: the holder's release took the value.
    self.ensure_open()?;
    definition
      .view(&instance, requested)
      .ok_or_else(|| not_found(requested, definition.qualifier.as_ref()))
  }

  fn check_parent(&self) -> Result<()> {
    let (Some(header), Some(parent)) = (&self.inner.scope_set, &self.inner.parent) else {
      return Ok(());
    };
    if !header.validate_parent || parent.scope_set() == header.parent.as_ref() {
      return Ok(());
    }
    let describe = |q: Option<&Qualifier>| q.map_or_else(|| ROOT_SCOPE_ID.to_owned(), |q| q.to_string());
    Err(Error::ParentScopeMismatch {
      scope_id: self.inner.id.clone(),
      expected: describe(header.parent.as_ref()),
      actual: describe(parent.scope_set()),
    })
  }

  /// Resolves every definition of this scope whose primary or secondary type
  /// is `T`, in declaration order.
  pub fn resolve_all<T: ?Sized + Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>> {
    self.ensure_open()?;
    let type_key = TypeKey::of::<T>();
    let holders = self.inner.registry.read().find_all(type_key);
    let parameters = Parameters::new();
    holders
      .iter()
      .map(|holder| {
        let instance = self.create(holder, type_key, &parameters)?;
        downcast::<T>(&instance).ok_or_else(|| not_found(type_key, None))
      })
      .collect()
  }

  /// Resolves the definition of primary type `P` bound to `S`, viewed as `S`.
  pub fn bind<P, S>(&self, parameters: Parameters) -> Result<Arc<S>>
  where
    P: ?Sized + Any + Send + Sync,
    S: ?Sized + Any + Send + Sync,
  {
    self.ensure_open()?;
    let (primary, secondary) = (TypeKey::of::<P>(), TypeKey::of::<S>());
    let mut current = Some(self);
    while let Some(scope) = current {
      let found = scope.inner.registry.read().find_bound(primary, secondary);
      if let Some(holder) = found {
        let instance = scope.create(&holder, secondary, &parameters)?;
        return downcast::<S>(&instance).ok_or_else(|| not_found(secondary, None));
      }
      current = match scope.inner.strategy {
        Strategy::Root => None,
        _ => scope.parent(),
      };
    }
    Err(not_found(secondary, None))
  }

  // --- Declaration ---

  /// Registers `value` as a single-like definition of this scope.
  pub fn declare<T: Any + Send + Sync>(
    &self,
    value: T,
    qualifier: Option<Qualifier>,
    allow_override: bool,
  ) -> Result<()> {
    self.declare_with(Arc::new(value), move |options| {
      if let Some(qualifier) = qualifier {
        options.qualifier(qualifier);
      }
      if allow_override {
        options.allow_override();
      }
    })
  }

  /// Registers a shared value, configuring the definition with `configure`,
  /// e.g. to bind secondary types.
  pub fn declare_with<T, F>(&self, value: Arc<T>, configure: F) -> Result<()>
  where
    T: ?Sized + Any + Send + Sync,
    F: FnOnce(&mut DefinitionOptions<'_, T>),
  {
    let kind = if self.is_root() { Kind::Single } else { Kind::Scoped };
    let mut definition = Definition::constant(kind, value);
    definition.scope_qualifier = self.scope_set().cloned();
    configure(&mut DefinitionOptions::new(&mut definition));
    self.save_definition(Arc::new(definition), false)
  }

  pub(crate) fn save_definition(&self, definition: Arc<Definition>, force_override: bool) -> Result<()> {
    self.ensure_open()?;
    let allow_override = force_override || self.container_allows_override();
    let replaced = self.inner.registry.write().save(definition, allow_override)?;
    if let Some(old) = replaced {
      old.release();
    }
    Ok(())
  }

  pub(crate) fn save_definitions(&self, definitions: Vec<Arc<Definition>>) -> Result<()> {
    self.ensure_open()?;
    let allow_override = self.container_allows_override();
    let replaced = self.inner.registry.write().save_all(definitions, allow_override)?;
    for old in replaced {
      old.release();
    }
    Ok(())
  }

  pub(crate) fn remove_definitions(&self, keys: &[DefinitionKey]) -> usize {
    let removed: Vec<_> = {
      let mut registry = self.inner.registry.write();
      keys.iter().filter_map(|key| registry.remove(key)).collect()
    };
    for holder in &removed {
      holder.release();
    }
    removed.len()
  }

  pub(crate) fn find_definition(&self, key: &DefinitionKey) -> Option<Arc<Definition>> {
    self
      .inner
      .registry
      .read()
      .get(key)
      .map(|holder| holder.definition().clone())
  }

  pub(crate) fn definition_count(&self) -> usize {
    self.inner.registry.read().len()
  }

  fn container_allows_override(&self) -> bool {
    self
      .inner
      .container
      .upgrade()
      .map_or(false, |container| container.allow_override)
  }

  /// Builds every `create_on_start` definition, in declaration order.
  pub(crate) fn create_eager_instances(&self) -> Result<usize> {
    self.ensure_open()?;
    let holders = self.inner.registry.read().find_eagerly_created();
    let parameters = Parameters::new();
    for holder in &holders {
      self.create(holder, holder.definition().primary, &parameters)?;
    }
    Ok(holders.len())
  }

  // --- Lifecycle ---

  /// Registers an observer called when the scope closes.
  ///
  /// Returns `false`, without registering, once the scope is closing.
  pub fn register_callback<C: ScopeCallback + 'static>(&self, callback: C) -> bool {
    self.register_callback_arc(Arc::new(callback))
  }

  /// Like [`register_callback`](Self::register_callback), for a shared observer.
  /// Registering the owner of an observed object scope keeps it notified once.
  pub fn register_callback_arc(&self, callback: Arc<dyn ScopeCallback>) -> bool {
    let mut callbacks = self.inner.callbacks.lock();
    if self.inner.state.load(Ordering::Acquire) != OPEN {
      return false;
    }
    callbacks.push(callback);
    true
  }

  /// Closes the scope for good. Calling it again does nothing.
  pub fn close(&self) {
    self.release(Release::Close);
  }

  /// Closes the scope, resetting its holders but keeping its definitions.
  pub fn tear_down(&self) {
    self.release(Release::TearDown);
  }

  fn release(&self, mode: Release) {
    if self
      .inner
      .state
      .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      return;
    }
    tracing::debug!("closing scope:'{}'", self.inner.id);

    let callbacks = std::mem::take(&mut *self.inner.callbacks.lock());
    for callback in &callbacks {
      callback.on_scope_close(self);
    }

    let holders = {
      let mut registry = self.inner.registry.write();
      self.inner.state.store(CLOSED, Ordering::Release);
      match mode {
        Release::Close => registry.clear(),
        Release::TearDown => registry.holders(),
      }
    };
    for holder in &holders {
      holder.release();
    }

    if let Some(container) = self.inner.container.upgrade() {
      container.forget_scope(self);
    }

    if let Strategy::Object {
      observer: Some(observer),
      ..
    } = &self.inner.strategy
    {
      if !callbacks.iter().any(|callback| same_object(callback, observer)) {
        observer.on_scope_close(self);
      }
    }
  }

  // --- Navigation & properties ---

  /// Creates a scope of set `scope_set` whose parent is this scope.
  pub fn create_child_scope(&self, id: impl Into<ScopeId>, scope_set: impl Into<Qualifier>) -> Result<Scope> {
    self
      .container()?
      .create_scope_in(id.into(), scope_set.into(), self.clone(), Strategy::Default)
  }

  /// Looks up a scope of the same container by id.
  pub fn get_scope(&self, id: &str) -> Result<Scope> {
    self.container()?.get_scope(id)
  }

  /// The container property stored under `key`, if it is a `T`.
  pub fn get_property<T: Any + Clone + Send + Sync>(&self, key: &str) -> Option<T> {
    self.container().ok()?.get_property(key)
  }

  /// The property under `key`, or `default`.
  pub fn get_property_or<T: Any + Clone + Send + Sync>(&self, key: &str, default: T) -> T {
    self.get_property(key).unwrap_or(default)
  }

  /// The property under `key`, failing with `MissingProperty`.
  pub fn require_property<T: Any + Clone + Send + Sync>(&self, key: &str) -> Result<T> {
    self.container()?.require_property(key)
  }
}

fn not_found(type_key: TypeKey, qualifier: Option<&Qualifier>) -> Error {
  Error::NoDefinitionFound {
    type_name: type_key.name(),
    qualifier: qualifier.map(|q| q.to_string()),
  }
}

impl fmt::Display for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Scope[id:'{}'", self.inner.id)?;
    if let Some(set) = self.scope_set() {
      write!(f, ",set:'{}'", set)?;
    }
    f.write_str("]")
  }
}

impl fmt::Debug for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Scope")
      .field("id", &self.inner.id)
      .field("scope_set", &self.scope_set())
      .field("closed", &self.is_closed())
      .field("definitions", &self.definition_count())
      .finish()
  }
}
