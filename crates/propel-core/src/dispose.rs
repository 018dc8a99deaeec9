#![forbid(unsafe_code)]

//! Disposal registry.
//!
//! A [`DisposeBag`] owns resources that must be released together and
//! exactly once: subscriptions, teardown closures, or anything else that
//! implements [`Disposable`].

use std::fmt;

use crate::subscription::Subscription;

/// A resource with an explicit release step.
///
/// `dispose` may be called more than once; implementations must make the
/// second and later calls no-ops.
pub trait Disposable {
    /// Release the resource.
    fn dispose(&mut self);
}

impl Disposable for Subscription {
    fn dispose(&mut self) {
        self.release();
    }
}

impl<D: Disposable + ?Sized> Disposable for Box<D> {
    fn dispose(&mut self) {
        (**self).dispose();
    }
}

/// A teardown closure run on the first `dispose` call.
pub struct OnDispose<F: FnOnce()> {
    action: Option<F>,
}

/// Wrap a closure as a [`Disposable`].
pub fn on_dispose<F: FnOnce()>(action: F) -> OnDispose<F> {
    OnDispose {
        action: Some(action),
    }
}

impl<F: FnOnce()> Disposable for OnDispose<F> {
    fn dispose(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

impl<F: FnOnce()> fmt::Debug for OnDispose<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnDispose")
            .field("pending", &self.action.is_some())
            .finish()
    }
}

/// Collection of resources released together.
///
/// # Invariants
///
/// 1. Each added resource is disposed exactly once.
/// 2. Resources are disposed in insertion order.
/// 3. Adding to a bag that is already disposed disposes the new resource
///    immediately.
#[derive(Default)]
pub struct DisposeBag {
    items: Vec<Box<dyn Disposable>>,
    disposed: bool,
}

impl DisposeBag {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource.
    pub fn add(&mut self, item: impl Disposable + 'static) {
        let mut item: Box<dyn Disposable> = Box::new(item);
        if self.disposed {
            item.dispose();
            return;
        }
        self.items.push(item);
    }

    /// Number of resources waiting to be disposed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the bag holds no pending resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether [`dispose`](Disposable::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Remove every pending resource without disposing it.
    ///
    /// Used when the caller needs to release the items outside a borrow
    /// of the bag.
    pub fn take(&mut self) -> Vec<Box<dyn Disposable>> {
        self.disposed = true;
        std::mem::take(&mut self.items)
    }
}

impl Disposable for DisposeBag {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        #[cfg(feature = "tracing")]
        tracing::debug!(message = "dispose_bag.dispose", items = self.items.len());
        for mut item in self.items.drain(..) {
            item.dispose();
        }
    }
}

impl fmt::Debug for DisposeBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposeBag")
            .field("items", &self.items.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn on_dispose_runs_once() {
        let count = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&count);
        let mut d = on_dispose(move || c.set(c.get() + 1));
        d.dispose();
        d.dispose();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn bag_disposes_in_insertion_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bag = DisposeBag::new();
        for name in ["a", "b", "c"] {
            let l = Rc::clone(&log);
            bag.add(on_dispose(move || l.borrow_mut().push(name)));
        }
        assert_eq!(bag.len(), 3);
        bag.dispose();
        bag.dispose();
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert!(bag.is_disposed());
        assert!(bag.is_empty());
    }

    #[test]
    fn add_after_dispose_disposes_immediately() {
        let mut bag = DisposeBag::new();
        bag.dispose();
        let hit = Rc::new(Cell::new(false));
        let h = Rc::clone(&hit);
        bag.add(on_dispose(move || h.set(true)));
        assert!(hit.get());
        assert!(bag.is_empty());
    }

    #[test]
    fn subscription_is_disposable() {
        let marker = Rc::new(());
        let mut bag = DisposeBag::new();
        bag.add(Subscription::from_guard(Rc::clone(&marker)));
        assert_eq!(Rc::strong_count(&marker), 2);
        bag.dispose();
        assert_eq!(Rc::strong_count(&marker), 1);
    }
}
