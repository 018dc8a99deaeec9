#![forbid(unsafe_code)]

//! Observers and the RAII [`Subscription`] guard.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::StreamError;

type NextFn<T> = Box<dyn Fn(&T)>;
type ErrorFn = Box<dyn Fn(&StreamError)>;
type CompletedFn = Box<dyn Fn()>;

/// The receiving end of a stream: a value callback plus optional error and
/// completion callbacks.
pub struct Observer<T> {
    next: NextFn<T>,
    error: Option<ErrorFn>,
    completed: Option<CompletedFn>,
}

impl<T> Observer<T> {
    /// Create an observer that only handles values.
    pub fn new(next: impl Fn(&T) + 'static) -> Self {
        Self {
            next: Box::new(next),
            error: None,
            completed: None,
        }
    }

    /// Attach an error callback.
    #[must_use]
    pub fn on_error(mut self, error: impl Fn(&StreamError) + 'static) -> Self {
        self.error = Some(Box::new(error));
        self
    }

    /// Attach a completion callback.
    #[must_use]
    pub fn on_completed(mut self, completed: impl Fn() + 'static) -> Self {
        self.completed = Some(Box::new(completed));
        self
    }

    /// Deliver a value.
    pub fn next(&self, value: &T) {
        (self.next)(value);
    }

    /// Deliver an error. Observers without an error callback ignore it.
    pub fn error(&self, err: &StreamError) {
        if let Some(error) = &self.error {
            error(err);
        }
    }

    /// Deliver completion.
    pub fn completed(&self) {
        if let Some(completed) = &self.completed {
            completed();
        }
    }
}

impl<T: 'static> Observer<T> {
    /// Build an upstream observer that forwards errors and completion to
    /// `downstream` unchanged and routes values through `next`.
    pub fn relay<U: 'static>(
        downstream: Rc<Observer<U>>,
        next: impl Fn(&T, &Observer<U>) + 'static,
    ) -> Self {
        let on_next = Rc::clone(&downstream);
        let on_error = Rc::clone(&downstream);
        Observer::new(move |value| next(value, &on_next))
            .on_error(move |err| on_error.error(err))
            .on_completed(move || downstream.completed())
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("handles_error", &self.error.is_some())
            .field("handles_completed", &self.completed.is_some())
            .finish()
    }
}

/// RAII guard for one or more observer registrations.
///
/// Dropping the `Subscription` drops the strong references that keep its
/// observers alive; the weak entries held by the source stop upgrading and
/// are pruned on the next emission.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    /// Type-erased strong references. Never read, only kept alive.
    guards: Vec<Box<dyn Any>>,
}

impl Subscription {
    /// A subscription that holds nothing.
    pub fn empty() -> Self {
        Self { guards: Vec::new() }
    }

    /// Keep `guard` alive for as long as this subscription lives.
    pub fn from_guard(guard: impl Any) -> Self {
        Self {
            guards: vec![Box::new(guard)],
        }
    }

    /// Combine two subscriptions into one that releases both.
    pub fn join(mut self, mut other: Subscription) -> Self {
        self.guards.append(&mut other.guards);
        self
    }

    /// Add another guard to this subscription.
    pub fn hold(&mut self, guard: impl Any) {
        self.guards.push(Box::new(guard));
    }

    /// Whether this subscription still holds anything.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.guards.is_empty()
    }

    /// Release every held registration now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    pub(crate) fn release(&mut self) {
        // Drop in registration order so nested teardown is predictable.
        for guard in self.guards.drain(..) {
            drop(guard);
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("guards", &self.guards.len())
            .finish()
    }
}
