//! Type identity and qualifiers.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Runtime identity of a type, usable for unsized types such as `dyn Trait`.
///
/// Equality and hashing only consider the `TypeId`; the name is kept for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
  id: TypeId,
  name: &'static str,
}

impl TypeKey {
  pub fn of<T: ?Sized + Any>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: std::any::type_name::<T>(),
    }
  }

  pub fn id(&self) -> TypeId {
    self.id
  }

  pub fn name(&self) -> &'static str {
    self.name
  }
}

impl PartialEq for TypeKey {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for TypeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "TypeKey({})", self.name)
  }
}

/// Distinguishes several definitions of the same type, or names a scope set.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Qualifier {
  /// An explicit string name.
  Named(Arc<str>),
  /// A qualifier derived from a type, typically the owner type of a scope set.
  Type(TypeKey),
}

impl Qualifier {
  pub fn named(name: impl AsRef<str>) -> Self {
    Qualifier::Named(Arc::from(name.as_ref()))
  }

  pub fn of<T: ?Sized + Any>() -> Self {
    Qualifier::Type(TypeKey::of::<T>())
  }
}

impl From<&str> for Qualifier {
  fn from(name: &str) -> Self {
    Qualifier::named(name)
  }
}

impl From<String> for Qualifier {
  fn from(name: String) -> Self {
    Qualifier::Named(Arc::from(name))
  }
}

impl From<&Qualifier> for Qualifier {
  fn from(qualifier: &Qualifier) -> Self {
    qualifier.clone()
  }
}

impl fmt::Display for Qualifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Qualifier::Named(name) => f.write_str(name),
      Qualifier::Type(key) => f.write_str(key.name()),
    }
  }
}

impl fmt::Debug for Qualifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Qualifier::Named(name) => write!(f, "Named({})", name),
      Qualifier::Type(key) => write!(f, "Type({})", key.name()),
    }
  }
}

/// The identity of a definition: primary type plus optional qualifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct DefinitionKey {
  pub(crate) type_key: TypeKey,
  pub(crate) qualifier: Option<Qualifier>,
}

impl DefinitionKey {
  pub(crate) fn new(type_key: TypeKey, qualifier: Option<Qualifier>) -> Self {
    Self {
      type_key,
      qualifier,
    }
  }

  pub(crate) fn qualifier_name(&self) -> Option<String> {
    self.qualifier.as_ref().map(|q| q.to_string())
  }
}

impl fmt::Debug for DefinitionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.qualifier {
      Some(q) => write!(f, "Key({}, {})", self.type_key.name(), q),
      None => write!(f, "Key({})", self.type_key.name()),
    }
  }
}
