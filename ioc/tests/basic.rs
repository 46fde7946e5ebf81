use fibre_di::{Container, Error, Module, Qualifier};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// --- Test Fixtures ---

// The trait must be Send + Sync for the container to accept it.
trait Service: Send + Sync {
  fn name(&self) -> &'static str;
}

struct ServiceImpl;
impl Service for ServiceImpl {
  fn name(&self) -> &'static str {
    "default"
  }
}

struct DumbServiceImpl;
impl Service for DumbServiceImpl {
  fn name(&self) -> &'static str {
    "dumb"
  }
}

#[derive(Debug, PartialEq, Eq)]
struct SimpleService {
  id: u32,
}

struct RandomId {
  id: u64,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn container_with(module: Module) -> Container {
  let container = Container::new();
  container.load_modules(&[module]).unwrap();
  container
}

// --- Basic Tests ---

#[test]
fn test_single_is_shared() {
  // Arrange
  let mut module = Module::new();
  module.single(|_| Ok(SimpleService { id: 101 }));
  let container = container_with(module);

  // Act
  let r1 = container.get::<SimpleService>().unwrap();
  let r2 = container.get::<SimpleService>().unwrap();

  // Assert
  assert_eq!(r1.id, 101);
  assert!(Arc::ptr_eq(&r1, &r2));
}

#[test]
fn test_factory_is_fresh_every_time() {
  // Arrange
  let mut module = Module::new();
  module.factory(|_| {
    Ok(RandomId {
      id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
    })
  });
  let container = container_with(module);

  // Act
  let r1 = container.get::<RandomId>().unwrap();
  let r2 = container.get::<RandomId>().unwrap();

  // Assert
  assert!(!Arc::ptr_eq(&r1, &r2));
  assert_ne!(r1.id, r2.id);
}

#[test]
fn test_named_and_default_services() {
  // Arrange
  let mut module = Module::new();
  module.single(|_| Ok(ServiceImpl)).bind::<dyn Service>(|it| it);
  module
    .single(|_| Ok(DumbServiceImpl))
    .named("dumb")
    .bind::<dyn Service>(|it| it);
  let container = container_with(module);

  // Act
  let dumb = container.get_named::<dyn Service>("dumb").unwrap();
  let concrete = container.get::<ServiceImpl>().unwrap();
  let by_trait = container.get::<dyn Service>().unwrap();

  // Assert
  assert_eq!(dumb.name(), "dumb");
  assert_eq!(concrete.name(), "default");
  // The unqualified trait lookup only matches the unqualified definition.
  assert_eq!(by_trait.name(), "default");
  assert!(container.get_named::<dyn Service>("smart").is_err());
}

#[test]
fn test_secondary_type_shares_identity_with_primary() {
  // Arrange
  let mut module = Module::new();
  module.single(|_| Ok(ServiceImpl)).bind::<dyn Service>(|it| it);
  let container = container_with(module);

  // Act
  let concrete = container.get::<ServiceImpl>().unwrap();
  let service = container.get::<dyn Service>().unwrap();

  // Assert
  assert!(std::ptr::eq(
    Arc::as_ptr(&concrete) as *const (),
    Arc::as_ptr(&service) as *const ()
  ));
}

#[test]
fn test_missing_definition_names_the_type() {
  let container = Container::new();

  let err = container.get::<SimpleService>().unwrap_err();

  match err {
    Error::NoDefinitionFound { type_name, qualifier } => {
      assert!(type_name.ends_with("SimpleService"));
      assert_eq!(qualifier, None);
    }
    other => panic!("unexpected error: {}", other),
  }
  assert!(container.resolve_or_none::<SimpleService>(None, Default::default()).is_none());
}

#[test]
fn test_duplicate_definition_conflicts_and_leaves_container_untouched() {
  // Arrange
  let container = Container::new();
  let mut first = Module::new();
  first.single(|_| Ok(SimpleService { id: 1 }));
  container.load_modules(&[first]).unwrap();

  let mut second = Module::new();
  second.single(|_| Ok(String::from("new")));
  second.single(|_| Ok(SimpleService { id: 2 }));

  // Act
  let err = container.load_modules(&[second]).unwrap_err();

  // Assert
  assert!(matches!(err, Error::DefinitionConflict { .. }));
  assert_eq!(container.get::<SimpleService>().unwrap().id, 1);
  assert!(container.get::<String>().is_err());
}

#[test]
fn test_override_replaces_cached_instance() {
  // Arrange
  let container = Container::new();
  let mut first = Module::new();
  first.single(|_| Ok(SimpleService { id: 1 }));
  container.load_modules(&[first]).unwrap();
  let before = container.get::<SimpleService>().unwrap();

  let mut second = Module::overriding();
  second.single(|_| Ok(SimpleService { id: 2 }));

  // Act
  container.load_modules(&[second]).unwrap();
  let after = container.get::<SimpleService>().unwrap();

  // Assert
  assert_eq!(before.id, 1);
  assert_eq!(after.id, 2);
  assert!(!Arc::ptr_eq(&before, &after));
}

#[test]
fn test_declare_instance_at_runtime() {
  let container = Container::new();

  container.declare(SimpleService { id: 7 }, Some(Qualifier::named("seven")), false).unwrap();
  let err = container.declare(SimpleService { id: 8 }, Some(Qualifier::named("seven")), false);

  assert!(matches!(err, Err(Error::DefinitionConflict { .. })));
  assert_eq!(*container.get_named::<SimpleService>("seven").unwrap(), SimpleService { id: 7 });

  container.declare(SimpleService { id: 9 }, Some(Qualifier::named("seven")), true).unwrap();
  assert_eq!(container.get_named::<SimpleService>("seven").unwrap().id, 9);
}

#[test]
fn test_resolve_all_in_declaration_order() {
  // Arrange
  let mut module = Module::new();
  module.single(|_| Ok(ServiceImpl)).bind::<dyn Service>(|it| it);
  module
    .single(|_| Ok(DumbServiceImpl))
    .named("dumb")
    .bind::<dyn Service>(|it| it);
  let container = container_with(module);

  // Act
  let names: Vec<_> = container
    .resolve_all::<dyn Service>()
    .unwrap()
    .iter()
    .map(|service| service.name())
    .collect();

  // Assert
  assert_eq!(names, ["default", "dumb"]);
}

#[test]
fn test_bind_resolves_by_primary_and_secondary() {
  let mut module = Module::new();
  module
    .single(|_| Ok(DumbServiceImpl))
    .named("dumb")
    .bind::<dyn Service>(|it| it);
  let container = container_with(module);

  let service = container
    .bind::<DumbServiceImpl, dyn Service>(Default::default())
    .unwrap();
  assert_eq!(service.name(), "dumb");
  assert!(container
    .bind::<ServiceImpl, dyn Service>(Default::default())
    .is_err());
}

#[test]
fn test_unload_removes_definitions() {
  // Arrange
  let mut module = Module::new();
  module.single(|_| Ok(SimpleService { id: 3 }));
  let container = Container::new();
  container.load_modules(&[module.clone()]).unwrap();
  assert!(container.get::<SimpleService>().is_ok());

  // Act
  container.unload_modules(&[module]);

  // Assert
  assert!(matches!(
    container.get::<SimpleService>(),
    Err(Error::NoDefinitionFound { .. })
  ));
}
