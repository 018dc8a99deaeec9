#![forbid(unsafe_code)]

//! The Propel view-model engine.
//!
//! - [`ReactiveObject`]: a property bag whose writes run through a
//!   `changing` (overridable) / commit / `changed` pipeline, with global and
//!   per-property streams, derived properties and a disposal registry.
//! - [`Property`], [`ObjectType`], [`PropertyId`]: static property identity,
//!   declared once per property as a `static`.
//! - [`PropertyPath`] and [`PathObservable`]: live observation of a chain of
//!   properties across linked objects, any of which may be absent.
//! - [`AsyncCommand`]: an async action with enablement, execution and
//!   output streams.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use propel_runtime::{Link, ObjectType, Property, PropertyPath, Reactive, ReactiveObject};
//! use propel_core::Source;
//!
//! static PERSON: ObjectType = ObjectType::new("Person");
//! static NAME: Property<String> = Property::new(&PERSON, "name");
//! static FRIEND: Property<Link<Person>> = Property::link(&PERSON, "friend");
//!
//! struct Person { object: ReactiveObject }
//!
//! impl Reactive for Person {
//!     fn object_type() -> &'static ObjectType { &PERSON }
//!     fn reactive(&self) -> &ReactiveObject { &self.object }
//! }
//!
//! let me = Rc::new(Person { object: ReactiveObject::new(&PERSON) });
//! let friend_name = me.object.observe(&PropertyPath::new(&FRIEND).to(&NAME))?;
//! let _sub = friend_name.subscribe(|name| println!("friend is now {name:?}"));
//! ```

pub mod change;
pub mod command;
pub mod config;
mod derived;
pub mod error;
pub mod object;
pub mod path;
pub mod property;
pub mod store;

pub use change::{AnyChanged, AnyChanging, Changed, Changing, PropertyChanges};
pub use command::{AsyncCommand, CommandBuilder};
pub use config::{CommandConfig, ObjectConfig};
pub use error::{ChainError, ChainResult, ConfigError};
pub use object::{ReactiveObject, WeakObject};
pub use path::{PathBuilder, PathObservable, PropertyChain, PropertyPath};
pub use property::{Link, Linkable, ObjectType, Property, PropertyId, PropertyInfo, PropertyValue, Reactive};
pub use store::{HashStore, LinearStore, PropertyStore, StoreKind};
