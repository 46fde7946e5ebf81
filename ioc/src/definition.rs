//! Definitions: the recipe for building a value of a given type.

use crate::context::Context;
use crate::error::Result;
use crate::qualifier::{DefinitionKey, Qualifier, TypeKey};

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type-erased value produced by a definition.
///
/// It always wraps an `Arc<T>` so unsized types (`dyn Trait`) can be served.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type FactoryFn = Arc<dyn Fn(&Context<'_>) -> Result<Instance> + Send + Sync>;
type CastFn = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;
type ReleaseFn = Arc<dyn Fn(&Instance) + Send + Sync>;

/// Recovers the typed `Arc<T>` out of an erased instance.
pub(crate) fn downcast<T: ?Sized + Any + Send + Sync>(instance: &Instance) -> Option<Arc<T>> {
  instance.downcast_ref::<Arc<T>>().cloned()
}

/// The lifecycle policy of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
  /// Created once and cached for the lifetime of the owning scope.
  Single,
  /// Created on every resolution, never cached.
  Factory,
  /// Created once per concrete scope instantiated from a scope set.
  Scoped,
}

#[derive(Clone)]
struct SecondaryType {
  key: TypeKey,
  cast: CastFn,
}

/// A declarative recipe for producing a typed value.
///
/// Definitions are declared through a [`Module`](crate::Module) or a scope's
/// `declare` methods and are identified by their primary type and qualifier.
#[derive(Clone)]
pub struct Definition {
  pub(crate) primary: TypeKey,
  secondary: Vec<SecondaryType>,
  pub(crate) qualifier: Option<Qualifier>,
  pub(crate) kind: Kind,
  pub(crate) scope_qualifier: Option<Qualifier>,
  pub(crate) create_on_start: bool,
  pub(crate) allow_override: bool,
  pub(crate) factory: FactoryFn,
  on_release: Option<ReleaseFn>,
}

impl Definition {
  pub(crate) fn new<T, F>(kind: Kind, factory: F) -> Self
  where
    T: ?Sized + Any + Send + Sync,
    F: Fn(&Context<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
  {
    Self {
      primary: TypeKey::of::<T>(),
      secondary: Vec::new(),
      qualifier: None,
      kind,
      scope_qualifier: None,
      create_on_start: false,
      allow_override: false,
      factory: Arc::new(move |ctx| factory(ctx).map(|value| Arc::new(value) as Instance)),
      on_release: None,
    }
  }

  /// A definition always returning the same, already built value.
  pub(crate) fn constant<T: ?Sized + Any + Send + Sync>(kind: Kind, value: Arc<T>) -> Self {
    Self::new::<T, _>(kind, move |_| Ok(value.clone()))
  }

  /// A copy of this definition building its value with another factory.
  pub(crate) fn with_factory(&self, factory: FactoryFn) -> Self {
    Self {
      factory,
      ..self.clone()
    }
  }

  pub(crate) fn key(&self) -> DefinitionKey {
    DefinitionKey::new(self.primary, self.qualifier.clone())
  }

  pub fn kind(&self) -> Kind {
    self.kind
  }

  pub fn primary_type(&self) -> TypeKey {
    self.primary
  }

  pub fn secondary_types(&self) -> impl Iterator<Item = TypeKey> + '_ {
    self.secondary.iter().map(|s| s.key)
  }

  pub fn qualifier(&self) -> Option<&Qualifier> {
    self.qualifier.as_ref()
  }

  pub fn scope_qualifier(&self) -> Option<&Qualifier> {
    self.scope_qualifier.as_ref()
  }

  pub fn is_created_on_start(&self) -> bool {
    self.create_on_start
  }

  pub fn allows_override(&self) -> bool {
    self.allow_override
  }

  pub(crate) fn has_secondary(&self, key: TypeKey) -> bool {
    self.secondary.iter().any(|s| s.key == key)
  }

  /// Views an instance of the primary type as `requested`, which is either
  /// the primary type itself or one of the secondary types.
  pub(crate) fn view(&self, instance: &Instance, requested: TypeKey) -> Option<Instance> {
    if requested == self.primary {
      return Some(instance.clone());
    }
    self
      .secondary
      .iter()
      .find(|s| s.key == requested)
      .and_then(|s| (s.cast)(instance))
  }

  pub(crate) fn run_release_hook(&self, instance: &Instance) {
    if let Some(hook) = &self.on_release {
      hook(instance);
    }
  }
}

impl fmt::Debug for Definition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Definition")
      .field("primary", &self.primary)
      .field(
        "secondary",
        &self.secondary.iter().map(|s| s.key).collect::<Vec<_>>(),
      )
      .field("qualifier", &self.qualifier)
      .field("kind", &self.kind)
      .field("scope_qualifier", &self.scope_qualifier)
      .field("create_on_start", &self.create_on_start)
      .field("allow_override", &self.allow_override)
      .finish_non_exhaustive()
  }
}

impl fmt::Display for Definition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{:?}: '{}'", self.kind, self.primary.name())?;
    if let Some(q) = &self.qualifier {
      write!(f, ",qualifier:{}", q)?;
    }
    if let Some(q) = &self.scope_qualifier {
      write!(f, ",scope:{}", q)?;
    }
    f.write_str("]")
  }
}

/// Options of a freshly declared definition of type `T`.
///
/// Returned by the declaration methods of [`Module`](crate::Module) and
/// [`ScopeSetDeclaration`](crate::ScopeSetDeclaration).
pub struct DefinitionOptions<'a, T: ?Sized> {
  definition: &'a mut Definition,
  _marker: PhantomData<fn() -> Arc<T>>,
}

impl<'a, T: ?Sized + Any + Send + Sync> DefinitionOptions<'a, T> {
  pub(crate) fn new(definition: &'a mut Definition) -> Self {
    Self {
      definition,
      _marker: PhantomData,
    }
  }

  /// Qualifies the definition with a name.
  pub fn named(&mut self, name: impl AsRef<str>) -> &mut Self {
    self.definition.qualifier = Some(Qualifier::named(name));
    self
  }

  /// Qualifies the definition with an arbitrary qualifier.
  pub fn qualifier(&mut self, qualifier: impl Into<Qualifier>) -> &mut Self {
    self.definition.qualifier = Some(qualifier.into());
    self
  }

  /// Makes the definition resolvable as `S` as well, typically a trait object.
  ///
  /// ```
  /// use fibre_di::Module;
  /// use std::sync::Arc;
  ///
  /// trait Service: Send + Sync {}
  /// struct ServiceImpl;
  /// impl Service for ServiceImpl {}
  ///
  /// let mut module = Module::new();
  /// module
  ///   .single(|_| Ok(ServiceImpl))
  ///   .bind::<dyn Service>(|it| it as Arc<dyn Service>);
  /// ```
  pub fn bind<S: ?Sized + Any + Send + Sync>(&mut self, cast: fn(Arc<T>) -> Arc<S>) -> &mut Self {
    let key = TypeKey::of::<S>();
    let cast: CastFn = Arc::new(move |instance| {
      downcast::<T>(instance).map(|value| Arc::new(cast(value)) as Instance)
    });
    self.definition.secondary.retain(|s| s.key != key);
    self.definition.secondary.push(SecondaryType { key, cast });
    self
  }

  /// Materializes the instance when the container starts.
  pub fn create_on_start(&mut self) -> &mut Self {
    self.definition.create_on_start = true;
    self
  }

  /// Allows this definition to replace an existing one with the same identity.
  pub fn allow_override(&mut self) -> &mut Self {
    self.definition.allow_override = true;
    self
  }

  /// Runs `hook` on the cached value when it is released.
  pub fn on_release<F>(&mut self, hook: F) -> &mut Self
  where
    F: Fn(&Arc<T>) + Send + Sync + 'static,
  {
    self.definition.on_release = Some(Arc::new(move |instance| {
      if let Some(value) = downcast::<T>(instance) {
        hook(&value);
      }
    }));
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  trait Shape: Send + Sync {
    fn sides(&self) -> u32;
  }

  struct Square;
  impl Shape for Square {
    fn sides(&self) -> u32 {
      4
    }
  }

  #[test]
  fn secondary_view_shares_the_primary_value() {
    let mut definition = Definition::constant(Kind::Single, Arc::new(Square));
    DefinitionOptions::<Square>::new(&mut definition).bind::<dyn Shape>(|it| it);

    let instance: Instance = Arc::new(Arc::new(Square));
    let primary = downcast::<Square>(&instance).unwrap();
    let view = definition
      .view(&instance, TypeKey::of::<dyn Shape>())
      .unwrap();
    let shape = downcast::<dyn Shape>(&view).unwrap();

    assert_eq!(shape.sides(), 4);
    assert!(std::ptr::eq(
      Arc::as_ptr(&primary) as *const (),
      Arc::as_ptr(&shape) as *const ()
    ));
    assert!(definition.view(&instance, TypeKey::of::<String>()).is_none());
  }

  #[test]
  fn binding_the_same_secondary_twice_keeps_one_entry() {
    let mut definition = Definition::constant(Kind::Single, Arc::new(Square));
    DefinitionOptions::<Square>::new(&mut definition)
      .bind::<dyn Shape>(|it| it)
      .bind::<dyn Shape>(|it| it);
    assert_eq!(definition.secondary_types().count(), 1);
  }

  #[test]
  fn display_mentions_kind_type_and_qualifier() {
    let mut definition = Definition::constant(Kind::Factory, Arc::new(7_u32));
    DefinitionOptions::<u32>::new(&mut definition).named("seven");
    let rendered = definition.to_string();
    assert!(rendered.starts_with("[Factory: 'u32'"));
    assert!(rendered.contains("qualifier:seven"));
  }
}
