#![forbid(unsafe_code)]

//! Version-tracked value that replays its current value to new subscribers.
//!
//! # Design
//!
//! [`BehaviorSubject<T>`] pairs a shared value cell with a [`Subject<T>`].
//! When the value changes (determined by `PartialEq`), every live observer is
//! notified in subscription order. A new subscriber first receives the
//! current value, then every later change.
//!
//! # Invariants
//!
//! 1. `version` increments by exactly 1 on each value-changing mutation.
//! 2. `set(v)` where `v == current` is a no-op.
//! 3. After `complete()` the value is frozen and late subscribers receive
//!    only the completion signal.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::source::Source;
use crate::subject::Subject;
use crate::subscription::{Observer, Subscription};

struct BehaviorState<T> {
    value: T,
    version: u64,
}

/// A shared value with change notification and replay-on-subscribe.
///
/// Cloning creates another handle to the **same** value and observers.
pub struct BehaviorSubject<T> {
    state: Rc<RefCell<BehaviorState<T>>>,
    subject: Subject<T>,
}

impl<T> Clone for BehaviorSubject<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            subject: self.subject.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for BehaviorSubject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("BehaviorSubject")
            .field("value", &state.value)
            .field("version", &state.version)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> BehaviorSubject<T> {
    /// Create a subject seeded with `value`. The initial version is 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            state: Rc::new(RefCell::new(BehaviorState { value, version: 0 })),
            subject: Subject::new(),
        }
    }

    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.state.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.borrow().value)
    }

    /// Set a new value, notifying observers if it differs from the current
    /// one. Ignored once the subject is completed.
    pub fn set(&self, value: T) {
        if self.subject.is_terminated() {
            return;
        }
        {
            let mut state = self.state.borrow_mut();
            if state.value == value {
                return;
            }
            state.value = value.clone();
            state.version += 1;
        }
        self.subject.next(value);
    }

    /// Modify the value in place. Observers are notified only if the value
    /// actually changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    /// Number of value-changing mutations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    /// Complete the stream. Later `set` calls are ignored.
    pub fn complete(&self) {
        self.subject.complete();
    }

    /// Whether the stream has completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.subject.is_terminated()
    }

    /// Whether at least one observer is still subscribed.
    #[must_use]
    pub fn has_observers(&self) -> bool {
        self.subject.has_observers()
    }
}

impl<T: Clone + PartialEq + 'static> Source<T> for BehaviorSubject<T> {
    fn subscribe_with(&self, observer: Observer<T>) -> Subscription {
        let observer = Rc::new(observer);
        let terminated = self.subject.is_terminated();
        let subscription = self.subject.subscribe_shared(Rc::clone(&observer));
        if !terminated {
            let current = self.get();
            observer.next(&current);
        }
        subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn get_set_basic() {
        let b = BehaviorSubject::new(42);
        assert_eq!(b.get(), 42);
        assert_eq!(b.version(), 0);

        b.set(99);
        assert_eq!(b.get(), 99);
        assert_eq!(b.version(), 1);
    }

    #[test]
    fn no_change_no_version_bump() {
        let b = BehaviorSubject::new(false);
        b.set(false);
        assert_eq!(b.version(), 0);
    }

    #[test]
    fn subscriber_receives_current_then_changes() {
        let b = BehaviorSubject::new(false);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let _sub = b.subscribe(move |v: &bool| l.borrow_mut().push(*v));

        b.set(true);
        b.set(true);
        b.set(false);
        assert_eq!(*log.borrow(), vec![false, true, false]);
    }

    #[test]
    fn update_mutates_in_place() {
        let b = BehaviorSubject::new(vec![1, 2, 3]);
        let last_len = Rc::new(Cell::new(0usize));
        let l = Rc::clone(&last_len);
        let _sub = b.subscribe(move |v: &Vec<i32>| l.set(v.len()));

        b.update(|v| v.push(4));
        assert_eq!(last_len.get(), 4);
        assert_eq!(b.version(), 1);

        b.update(|_| {});
        assert_eq!(b.version(), 1);
    }

    #[test]
    fn completed_subject_only_replays_completion() {
        let b = BehaviorSubject::new(7);
        b.complete();
        b.set(8);
        assert_eq!(b.get(), 7);

        let values = Rc::new(Cell::new(0u32));
        let done = Rc::new(Cell::new(false));
        let (v, d) = (Rc::clone(&values), Rc::clone(&done));
        let _sub = b.subscribe_with(
            Observer::new(move |_: &i32| v.set(v.get() + 1)).on_completed(move || d.set(true)),
        );
        assert_eq!(values.get(), 0);
        assert!(done.get());
    }

    #[test]
    fn clone_shares_state() {
        let a = BehaviorSubject::new(0);
        let b = a.clone();
        a.set(5);
        assert_eq!(b.get(), 5);
        assert_eq!(b.version(), 1);
    }

    #[test]
    fn set_from_replay_is_delivered_after_replay() {
        let b = BehaviorSubject::new(1);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let handle = b.clone();
        let _sub = b.subscribe(move |v: &i32| {
            l.borrow_mut().push(*v);
            if *v == 1 {
                handle.set(2);
            }
        });
        assert_eq!(*log.borrow(), vec![1, 2]);
    }
}
