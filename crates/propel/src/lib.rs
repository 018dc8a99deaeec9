#![forbid(unsafe_code)]

//! Propel public facade crate.
//!
//! Re-exports the stream primitives and the view-model engine under one
//! name. Most applications only need `use propel::prelude::*`.

pub use propel_core as core;
pub use propel_runtime as runtime;

pub mod prelude {
    pub use propel_core::{
        BehaviorSubject, Disposable, DisposeBag, SharedSource, Source, StreamError, Subject,
        Subscription,
    };
    pub use propel_runtime::{
        AsyncCommand, Changed, Changing, Link, ObjectConfig, ObjectType, Property, PropertyPath,
        Reactive, ReactiveObject,
    };

    pub use propel_core as core;
    pub use propel_runtime as runtime;
}
