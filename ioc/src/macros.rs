//! Public macros resolving from the global container.

/// Resolves a dependency from the global container's root scope.
///
/// This macro panics if no container is started or the dependency cannot be
/// resolved. For a non-panicking version, use `try_global()?.get::<T>()`.
///
/// # Examples
///
/// ```
/// use fibre_di::{resolve, ContainerBuilder, Module};
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct EnglishGreeter;
/// impl Greeter for EnglishGreeter { fn greet(&self) -> String { "Hello!".to_string() } }
///
/// let mut module = Module::new();
/// module.single(|_| Ok(String::from("hello"))).named("message");
/// module.single_trait::<dyn Greeter, _>(|_| Ok(std::sync::Arc::new(EnglishGreeter)));
/// ContainerBuilder::new().module(module).start().unwrap();
///
/// let message = resolve!(String, "message");
/// assert_eq!(*message, "hello");
///
/// let greeter = resolve!(trait Greeter);
/// assert_eq!(greeter.greet(), "Hello!");
/// fibre_di::stop();
/// ```
#[macro_export]
macro_rules! resolve {
    (trait $trait_ident:ident) => {
        $crate::try_global()
            .and_then(|container| container.get::<dyn $trait_ident>())
            .unwrap_or_else(|e| {
                panic!(
                    "Failed to resolve required trait service {}: {}",
                    std::any::type_name::<dyn $trait_ident>(),
                    e
                )
            })
    };

    (trait $trait_ident:ident, $name:expr) => {
        $crate::try_global()
            .and_then(|container| container.get_named::<dyn $trait_ident>($name))
            .unwrap_or_else(|e| {
                panic!(
                    "Failed to resolve required trait service {} named '{}': {}",
                    std::any::type_name::<dyn $trait_ident>(),
                    $name,
                    e
                )
            })
    };

    ($type:ty) => {
        $crate::try_global()
            .and_then(|container| container.get::<$type>())
            .unwrap_or_else(|e| {
                panic!(
                    "Failed to resolve required service {}: {}",
                    std::any::type_name::<$type>(),
                    e
                )
            })
    };

    ($type:ty, $name:expr) => {
        $crate::try_global()
            .and_then(|container| container.get_named::<$type>($name))
            .unwrap_or_else(|e| {
                panic!(
                    "Failed to resolve required service {} named '{}': {}",
                    std::any::type_name::<$type>(),
                    $name,
                    e
                )
            })
    };
}

/// Creates a deferred [`Inject`](crate::Inject) handle on the global
/// container's root scope.
///
/// Panics if no container is started; resolution itself happens on the
/// handle's first `get()`.
#[macro_export]
macro_rules! inject {
    (trait $trait_ident:ident) => {
        $crate::try_global()
            .map(|container| container.inject::<dyn $trait_ident>())
            .unwrap_or_else(|e| panic!("Can't inject {}: {}", std::any::type_name::<dyn $trait_ident>(), e))
    };

    (trait $trait_ident:ident, $name:expr) => {
        $crate::try_global()
            .map(|container| container.inject_named::<dyn $trait_ident>($name))
            .unwrap_or_else(|e| panic!("Can't inject {}: {}", std::any::type_name::<dyn $trait_ident>(), e))
    };

    ($type:ty) => {
        $crate::try_global()
            .map(|container| container.inject::<$type>())
            .unwrap_or_else(|e| panic!("Can't inject {}: {}", std::any::type_name::<$type>(), e))
    };

    ($type:ty, $name:expr) => {
        $crate::try_global()
            .map(|container| container.inject_named::<$type>($name))
            .unwrap_or_else(|e| panic!("Can't inject {}: {}", std::any::type_name::<$type>(), e))
    };
}
