//! Runtime parameters supplied by the caller of a resolution.

use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type Slot = Option<Box<dyn Any + Send + Sync>>;

/// An ordered list of values handed to definition factories.
///
/// Each value is stored as an `Arc`. Values are consumed by
/// [`Context::param`](crate::Context::param): once a value has been bound to a
/// parameter it is no longer available to a later one, including to factories
/// of nested dependencies resolved with the same list.
#[derive(Default)]
pub struct Parameters {
  values: Mutex<Vec<Slot>>,
}

impl Parameters {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends a value.
  pub fn with<T: Any + Send + Sync>(self, value: T) -> Self {
    self.with_arc(Arc::new(value))
  }

  /// Appends an already shared value, which may be a trait object.
  pub fn with_arc<T: ?Sized + Any + Send + Sync>(self, value: Arc<T>) -> Self {
    self.values.lock().push(Some(Box::new(value)));
    self
  }

  /// Number of values not consumed yet.
  pub fn remaining(&self) -> usize {
    self.values.lock().iter().filter(|slot| slot.is_some()).count()
  }

  /// Number of values supplied, consumed or not.
  pub fn len(&self) -> usize {
    self.values.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Positional access that does not consume the value.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self, index: usize) -> Option<Arc<T>> {
    let values = self.values.lock();
    values
      .get(index)?
      .as_ref()?
      .downcast_ref::<Arc<T>>()
      .cloned()
  }

  /// Consumes the first available value of type `T`.
  pub fn take<T: ?Sized + Any + Send + Sync>(&self) -> Option<Arc<T>> {
    let mut values = self.values.lock();
    let slot = values
      .iter_mut()
      .find(|slot| matches!(slot, Some(value) if value.is::<Arc<T>>()))?;
    slot
      .take()
      .and_then(|value| value.downcast::<Arc<T>>().ok())
      .map(|value| *value)
  }
}

impl fmt::Debug for Parameters {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Parameters")
      .field("len", &self.len())
      .field("remaining", &self.remaining())
      .finish()
  }
}

/// Builds [`Parameters`] from a list of values.
///
/// ```
/// use fibre_di::parameters;
///
/// let params = parameters![42_u32, String::from("id")];
/// assert_eq!(params.len(), 2);
/// ```
#[macro_export]
macro_rules! parameters {
  () => {
    $crate::Parameters::new()
  };
  ($($value:expr),+ $(,)?) => {
    $crate::Parameters::new()$(.with($value))+
  };
}

#[cfg(test)]
mod tests {
  use super::*;

  trait Label: Send + Sync {
    fn label(&self) -> &str;
  }
  struct Tag(&'static str);
  impl Label for Tag {
    fn label(&self) -> &str {
      self.0
    }
  }

  #[test]
  fn take_consumes_values_left_to_right() {
    let params = Parameters::new().with(1_u32).with("skip").with(2_u32);

    assert_eq!(*params.take::<u32>().unwrap(), 1);
    assert_eq!(*params.take::<u32>().unwrap(), 2);
    assert!(params.take::<u32>().is_none());
    assert_eq!(params.remaining(), 1);
    assert_eq!(params.len(), 3);
  }

  #[test]
  fn positional_get_does_not_consume() {
    let params = crate::parameters![10_i64, String::from("x")];
    assert_eq!(*params.get::<i64>(0).unwrap(), 10);
    assert_eq!(*params.get::<i64>(0).unwrap(), 10);
    assert!(params.get::<i64>(1).is_none());
    assert!(params.get::<String>(5).is_none());
    assert_eq!(params.remaining(), 2);
  }

  #[test]
  fn trait_objects_can_be_supplied() {
    let params = Parameters::new().with_arc::<dyn Label>(Arc::new(Tag("blue")));
    let label = params.take::<dyn Label>().unwrap();
    assert_eq!(label.label(), "blue");
    assert!(!params.is_empty());
    assert_eq!(params.remaining(), 0);
  }
}
