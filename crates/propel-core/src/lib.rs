#![forbid(unsafe_code)]

//! Core stream primitives for the Propel reactive object model.
//!
//! - [`Subject`]: a hot, multicast stream with completion and error channels.
//! - [`BehaviorSubject`]: a version-tracked value that replays its current
//!   value to every new subscriber.
//! - [`Observer`] and [`Subscription`]: the subscriber side. Dropping a
//!   `Subscription` detaches its observer.
//! - [`Source`]: the trait every stream implements, with `map`,
//!   `distinct_until_changed`, [`combine_latest`] and [`constant`]
//!   combinators and a [`futures::Stream`] bridge.
//! - [`DisposeBag`]: a registry of resources released together, exactly once.
//!
//! # Architecture
//!
//! Everything here is single-threaded (`Rc<RefCell<..>>`). Observers are held
//! strongly by their `Subscription` and weakly by the subject, so a dropped
//! subscription stops receiving values even in the middle of a dispatch.
//!
//! # Invariants
//!
//! 1. Observers are notified in subscription order.
//! 2. A terminated subject never emits again; late subscribers receive the
//!    terminal signal immediately.
//! 3. Notification never holds an interior borrow while user code runs, so
//!    re-entrant emission and subscription from inside a callback are allowed.

pub mod behavior;
pub mod dispose;
pub mod error;
pub mod source;
pub mod stream;
pub mod subject;
pub mod subscription;

pub use behavior::BehaviorSubject;
pub use dispose::{Disposable, DisposeBag, OnDispose, on_dispose};
pub use error::StreamError;
pub use source::{CombineLatest, Constant, Distinct, Map, SharedSource, Source, combine_latest, constant};
pub use stream::SourceStream;
pub use subject::Subject;
pub use subscription::{Observer, Subscription};
