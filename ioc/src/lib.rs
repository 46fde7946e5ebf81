//! # Fibre DI
//!
//! A thread-safe dependency resolution and instance lifecycle engine for Rust.
//!
//! Definitions are declared in [`Module`]s and loaded into a [`Container`].
//! Values are resolved by type, optionally by qualifier, from a tree of
//! [`Scope`]s rooted at the container's root scope.
//!
//! ## Core Concepts
//!
//! - **Definition**: a factory plus its policy. `single` values are created once
//!   and shared, `factory` values are created on every resolution and `scoped`
//!   values are created once per scope.
//! - **Scope set**: a named template of definitions. Each scope created from it
//!   gets its own instances and falls back to its parent for everything else.
//! - **Binding**: a definition can also be served as secondary types, such as
//!   the trait objects it implements.
//! - **Global Container**: an optional process-wide container, started with
//!   [`start`] and used by the `resolve!` and `inject!` macros.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_di::{Container, Module, Qualifier};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!   fn greet(&self) -> String;
//! }
//!
//! struct EnglishGreeter {
//!   message: String,
//! }
//!
//! impl Greeter for EnglishGreeter {
//!   fn greet(&self) -> String {
//!     self.message.clone()
//!   }
//! }
//!
//! struct Request;
//! struct Handler {
//!   greeter: Arc<dyn Greeter>,
//! }
//!
//! let mut module = Module::new();
//! module
//!   .single(|_| Ok(String::from("Hello, World!")))
//!   .named("greeting_message");
//! module
//!   .single(|ctx| {
//!     let message = ctx.get_named::<String>("greeting_message")?;
//!     Ok(EnglishGreeter { message: (*message).clone() })
//!   })
//!   .bind::<dyn Greeter>(|it| it);
//! module.scope(Qualifier::of::<Request>(), |set| {
//!   set.scoped(|ctx| Ok(Handler { greeter: ctx.get::<dyn Greeter>()? }));
//! });
//!
//! let container = Container::new();
//! container.load_modules(&[module]).unwrap();
//!
//! let request = container.create_scope("request-1", Qualifier::of::<Request>()).unwrap();
//! let handler = request.get::<Handler>().unwrap();
//! assert_eq!(handler.greeter.greet(), "Hello, World!");
//! assert!(Arc::ptr_eq(&handler, &request.get::<Handler>().unwrap()));
//!
//! request.close();
//! container.close();
//! ```

mod builder;
mod container;
mod context;
mod core;
mod definition;
mod error;
mod global;
mod inject;
mod instance;
mod macros;
mod mock;
mod module;
mod parameters;
mod qualifier;
mod registry;
mod scope;

pub use builder::ContainerBuilder;
pub use container::Container;
pub use context::Context;
pub use definition::{Definition, DefinitionOptions, Kind};
pub use error::{Error, Result};
pub use global::{global, load_modules, start, stop, try_global, unload_modules};
pub use inject::{Inject, InjectOrNone};
pub use module::{Module, ScopeSetDeclaration};
pub use parameters::Parameters;
pub use qualifier::{Qualifier, TypeKey};
pub use scope::{Scope, ScopeCallback, ScopeId};
