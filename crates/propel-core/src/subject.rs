#![forbid(unsafe_code)]

//! Hot multicast stream with completion and error channels.
//!
//! # Design
//!
//! [`Subject<T>`] keeps its observers in shared, reference-counted storage
//! (`Rc<RefCell<..>>`). Observers are stored as `Weak` references; the strong
//! side lives in the [`Subscription`] handed back to the caller.
//!
//! # Performance
//!
//! | Operation     | Complexity                  |
//! |---------------|-----------------------------|
//! | `next()`      | O(S) where S = observers    |
//! | `subscribe()` | O(1) amortized              |
//! | `complete()`  | O(S)                        |
//!
//! # Failure Modes
//!
//! - **Emission after termination**: ignored. A subject that completed or
//!   errored stays terminated.
//! - **Subscriber leak**: observers whose `Subscription` was dropped stay in
//!   the list until the next emission prunes them.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::StreamError;
use crate::source::Source;
use crate::subscription::{Observer, Subscription};

#[derive(Clone)]
enum Terminal {
    Completed,
    Error(StreamError),
}

impl Terminal {
    fn deliver<T>(&self, observer: &Observer<T>) {
        match self {
            Self::Completed => observer.completed(),
            Self::Error(err) => observer.error(err),
        }
    }
}

struct SubjectInner<T> {
    observers: Vec<Weak<Observer<T>>>,
    terminal: Option<Terminal>,
    emitted: u64,
}

/// A hot stream: values pushed with [`next`](Subject::next) go to every
/// observer subscribed at that moment, in subscription order.
///
/// Cloning a `Subject` creates another handle to the **same** stream.
pub struct Subject<T> {
    inner: Rc<RefCell<SubjectInner<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Subject")
            .field("observers", &inner.observers.len())
            .field("emitted", &inner.emitted)
            .field(
                "terminal",
                &inner.terminal.as_ref().map(|t| match t {
                    Terminal::Completed => "completed",
                    Terminal::Error(_) => "error",
                }),
            )
            .finish()
    }
}

impl<T: 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Subject<T> {
    /// Create a subject with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SubjectInner {
                observers: Vec::new(),
                terminal: None,
                emitted: 0,
            })),
        }
    }

    /// Create a subject that is already completed.
    #[must_use]
    pub fn completed() -> Self {
        let subject = Self::new();
        subject.complete();
        subject
    }

    /// Push an owned value to every live observer.
    pub fn next(&self, value: T) {
        self.emit(&value);
    }

    /// Push a value by reference to every live observer.
    ///
    /// Observers that unsubscribe during this dispatch are not called after
    /// their subscription is dropped. Observers added during the dispatch
    /// first see the next emission.
    pub fn emit(&self, value: &T) {
        let observers = {
            let mut inner = self.inner.borrow_mut();
            if inner.terminal.is_some() {
                return;
            }
            inner.observers.retain(|w| w.strong_count() > 0);
            inner.emitted += 1;
            inner.observers.clone()
        };
        for weak in &observers {
            if let Some(observer) = weak.upgrade() {
                observer.next(value);
            }
        }
    }

    /// Terminate the stream with an error.
    pub fn error(&self, err: StreamError) {
        self.terminate(Terminal::Error(err));
    }

    /// Terminate the stream normally.
    pub fn complete(&self) {
        self.terminate(Terminal::Completed);
    }

    fn terminate(&self, terminal: Terminal) {
        let observers = {
            let mut inner = self.inner.borrow_mut();
            if inner.terminal.is_some() {
                return;
            }
            inner.terminal = Some(terminal.clone());
            std::mem::take(&mut inner.observers)
        };
        for weak in &observers {
            if let Some(observer) = weak.upgrade() {
                terminal.deliver(&observer);
            }
        }
    }

    /// Whether the stream completed or errored.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.borrow().terminal.is_some()
    }

    /// The error that terminated the stream, if any.
    #[must_use]
    pub fn terminal_error(&self) -> Option<StreamError> {
        match &self.inner.borrow().terminal {
            Some(Terminal::Error(err)) => Some(err.clone()),
            _ => None,
        }
    }

    /// Number of registered observers, including dropped ones not yet pruned.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    /// Whether at least one observer is still subscribed.
    #[must_use]
    pub fn has_observers(&self) -> bool {
        self.inner
            .borrow()
            .observers
            .iter()
            .any(|w| w.strong_count() > 0)
    }

    /// Number of values emitted so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.inner.borrow().emitted
    }

    /// Register an already shared observer.
    ///
    /// A terminated subject delivers its terminal signal immediately and
    /// returns an empty subscription.
    pub fn subscribe_shared(&self, observer: Rc<Observer<T>>) -> Subscription {
        let terminal = self.inner.borrow().terminal.clone();
        if let Some(terminal) = terminal {
            terminal.deliver(&observer);
            return Subscription::empty();
        }
        self.inner
            .borrow_mut()
            .observers
            .push(Rc::downgrade(&observer));
        Subscription::from_guard(observer)
    }
}

impl<T: 'static> Source<T> for Subject<T> {
    fn subscribe_with(&self, observer: Observer<T>) -> Subscription {
        self.subscribe_shared(Rc::new(observer))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
