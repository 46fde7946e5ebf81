//! The process-wide container slot and its access functions.

use crate::builder::ContainerBuilder;
use crate::container::Container;
use crate::error::{Error, Result};
use crate::module::Module;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

// At most one started container per process.
static GLOBAL_CONTAINER: Lazy<Mutex<Option<Container>>> = Lazy::new(|| Mutex::new(None));

/// Builds a container from `builder` and installs it as the global one.
///
/// The container is reachable through [`global`] while its eager instances
/// are created, so their factories may use the macros. If one of them fails,
/// the container is closed and the slot left empty.
///
/// # Examples
///
/// ```
/// use fibre_di::{global, ContainerBuilder, Module};
///
/// let mut module = Module::new();
/// module.single(|_| Ok(String::from("Hello from global!")));
///
/// fibre_di::start(ContainerBuilder::new().module(module)).unwrap();
/// assert_eq!(*global().unwrap().get::<String>().unwrap(), "Hello from global!");
/// fibre_di::stop();
/// ```
pub fn start(builder: ContainerBuilder) -> Result<Container> {
  let mut slot = GLOBAL_CONTAINER.lock();
  if slot.is_some() {
    return Err(Error::AlreadyStarted);
  }
  let (container, create_eager_instances) = builder.assemble()?;
  *slot = Some(container.clone());
  drop(slot);

  if create_eager_instances {
    if let Err(e) = container.create_eager_instances() {
      let mut slot = GLOBAL_CONTAINER.lock();
      if slot.as_ref().is_some_and(|current| current.ptr_eq(&container)) {
        *slot = None;
      }
      drop(slot);
      container.close();
      return Err(e);
    }
  }
  tracing::info!("global container started");
  Ok(container)
}

/// Closes the global container, if any, and empties the slot.
pub fn stop() {
  let container = GLOBAL_CONTAINER.lock().take();
  if let Some(container) = container {
    container.close();
    tracing::info!("global container stopped");
  }
}

/// The global container, if one is started.
pub fn global() -> Option<Container> {
  GLOBAL_CONTAINER.lock().clone()
}

/// The global container, failing with `NotStarted` if there is none.
pub fn try_global() -> Result<Container> {
  global().ok_or(Error::NotStarted)
}

/// Loads modules into the global container.
pub fn load_modules(modules: &[Module]) -> Result<()> {
  try_global()?.load_modules(modules)
}

/// Unloads modules from the global container.
pub fn unload_modules(modules: &[Module]) -> Result<()> {
  try_global()?.unload_modules(modules);
  Ok(())
}
