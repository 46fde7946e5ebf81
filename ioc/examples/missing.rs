use fibre_di::{resolve, ContainerBuilder, Error};
use std::panic;

struct UnregisteredService;

fn main() {
  tracing_subscriber::fmt().with_env_filter("fibre_di=debug").init();
  let container = ContainerBuilder::new()
    .start()
    .expect("global container should start");

  // --- Using the panicking `resolve!` macro ---
  println!("Attempting to resolve a value that was never declared...");
  let result = panic::catch_unwind(|| {
    // This line will panic!
    let _service = resolve!(UnregisteredService);
  });
  assert!(result.is_err(), "resolve! should have panicked.");

  // --- Using the fallible methods ---
  match container.get::<UnregisteredService>() {
    Err(Error::NoDefinitionFound { type_name, .. }) => {
      println!("Correctly received an error for '{}'.", type_name)
    }
    Err(e) => panic!("Unexpected error: {}", e),
    Ok(_) => panic!("Should not have found the value!"),
  }

  // `resolve_or_none` logs the failure and returns `None`.
  assert!(container
    .resolve_or_none::<UnregisteredService>(None, Default::default())
    .is_none());

  fibre_di::stop();
}
