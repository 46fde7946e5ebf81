use fibre_di::{Container, Module};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

// A simple service that gets a unique ID upon creation.
struct RequestTracker {
  id: usize,
}

// A global, thread-safe counter to generate unique IDs.
static ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn main() {
  let mut module = Module::new();

  // This factory will only be called ONCE.
  module
    .single(|_| {
      println!("Creating SINGLE RequestTracker...");
      Ok(RequestTracker {
        id: ID_COUNTER.fetch_add(1, Ordering::SeqCst),
      })
    })
    .named("single_tracker");

  // This factory will be called EVERY time the value is resolved.
  module
    .factory(|_| {
      println!("Creating FACTORY RequestTracker...");
      Ok(RequestTracker {
        id: ID_COUNTER.fetch_add(1, Ordering::SeqCst),
      })
    })
    .named("factory_tracker");

  let container = Container::new();
  container.load_modules(&[module]).expect("modules should load");

  println!("--- Resolving singles ---");
  let s1 = container.get_named::<RequestTracker>("single_tracker").unwrap();
  let s2 = container.get_named::<RequestTracker>("single_tracker").unwrap();
  println!("Single 1 ID: {}, Single 2 ID: {}", s1.id, s2.id);
  assert!(Arc::ptr_eq(&s1, &s2), "Single instances should be identical");

  println!("--- Resolving factories ---");
  let f1 = container.get_named::<RequestTracker>("factory_tracker").unwrap();
  let f2 = container.get_named::<RequestTracker>("factory_tracker").unwrap();
  println!("Factory 1 ID: {}, Factory 2 ID: {}", f1.id, f2.id);
  assert!(!Arc::ptr_eq(&f1, &f2), "Factory instances should be different");

  container.close();
}
