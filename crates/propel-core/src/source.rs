#![forbid(unsafe_code)]

//! The [`Source`] trait and its combinators.
//!
//! Combinators are cold: each call to `subscribe_with` subscribes upstream
//! anew and keeps per-subscription state, so two subscribers of the same
//! `Map` or `CombineLatest` never share intermediate values.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::stream::SourceStream;
use crate::subscription::{Observer, Subscription};

/// Anything that can be subscribed to.
pub trait Source<T: 'static> {
    /// Register `observer` and return the guard that keeps it attached.
    fn subscribe_with(&self, observer: Observer<T>) -> Subscription;

    /// Register a value-only callback.
    fn subscribe(&self, next: impl Fn(&T) + 'static) -> Subscription
    where
        Self: Sized,
    {
        self.subscribe_with(Observer::new(next))
    }

    /// Transform every value with `f`.
    fn map<U, F>(self, f: F) -> Map<Self, F, T>
    where
        Self: Sized,
        F: Fn(&T) -> U + 'static,
        U: 'static,
    {
        Map {
            source: self,
            f: Rc::new(f),
            _marker: PhantomData,
        }
    }

    /// Suppress values equal to the previous one delivered to the same
    /// subscriber.
    fn distinct_until_changed(self) -> Distinct<Self, T>
    where
        Self: Sized,
        T: Clone + PartialEq,
    {
        Distinct {
            source: self,
            _marker: PhantomData,
        }
    }

    /// Type-erase into a shareable handle.
    fn shared(self) -> SharedSource<T>
    where
        Self: Sized + 'static,
    {
        Rc::new(self)
    }

    /// Bridge into a [`futures::Stream`]. The subscription lives as long as
    /// the returned stream.
    fn to_stream(&self) -> SourceStream<T>
    where
        Self: Sized,
        T: Clone,
    {
        SourceStream::subscribe(self)
    }
}

/// Reference-counted, type-erased source.
pub type SharedSource<T> = Rc<dyn Source<T>>;

impl<T: 'static> Source<T> for Rc<dyn Source<T>> {
    fn subscribe_with(&self, observer: Observer<T>) -> Subscription {
        (**self).subscribe_with(observer)
    }
}

// ---------------------------------------------------------------------------
// map
// ---------------------------------------------------------------------------

/// Source returned by [`Source::map`].
pub struct Map<S, F, T> {
    source: S,
    f: Rc<F>,
    _marker: PhantomData<fn(&T)>,
}

impl<S, F, T, U> Source<U> for Map<S, F, T>
where
    S: Source<T>,
    F: Fn(&T) -> U + 'static,
    T: 'static,
    U: 'static,
{
    fn subscribe_with(&self, observer: Observer<U>) -> Subscription {
        let f = Rc::clone(&self.f);
        self.source
            .subscribe_with(Observer::relay(Rc::new(observer), move |value, out| {
                out.next(&f(value));
            }))
    }
}

// ---------------------------------------------------------------------------
// distinct_until_changed
// ---------------------------------------------------------------------------

/// Source returned by [`Source::distinct_until_changed`].
pub struct Distinct<S, T> {
    source: S,
    _marker: PhantomData<fn(&T)>,
}

impl<S, T> Source<T> for Distinct<S, T>
where
    S: Source<T>,
    T: Clone + PartialEq + 'static,
{
    fn subscribe_with(&self, observer: Observer<T>) -> Subscription {
        let last: RefCell<Option<T>> = RefCell::new(None);
        self.source
            .subscribe_with(Observer::relay(Rc::new(observer), move |value: &T, out| {
                {
                    let mut last = last.borrow_mut();
                    if last.as_ref() == Some(value) {
                        return;
                    }
                    *last = Some(value.clone());
                }
                out.next(value);
            }))
    }
}

// ---------------------------------------------------------------------------
// combine_latest
// ---------------------------------------------------------------------------

/// Source returned by [`combine_latest`].
pub struct CombineLatest<A, B, TA, TB> {
    a: A,
    b: B,
    _marker: PhantomData<fn(&TA, &TB)>,
}

/// Emit `(a, b)` pairs once both sources have produced a value, and again
/// whenever either produces a new one.
///
/// Completes when both sources complete; the first error from either side
/// is forwarded.
pub fn combine_latest<A, B, TA, TB>(a: A, b: B) -> CombineLatest<A, B, TA, TB>
where
    A: Source<TA>,
    B: Source<TB>,
    TA: Clone + 'static,
    TB: Clone + 'static,
{
    CombineLatest {
        a,
        b,
        _marker: PhantomData,
    }
}

struct Latest<TA, TB> {
    a: Option<TA>,
    b: Option<TB>,
    completed: u8,
}

impl<TA: Clone, TB: Clone> Latest<TA, TB> {
    fn pair(&self) -> Option<(TA, TB)> {
        Some((self.a.clone()?, self.b.clone()?))
    }
}

impl<A, B, TA, TB> Source<(TA, TB)> for CombineLatest<A, B, TA, TB>
where
    A: Source<TA>,
    B: Source<TB>,
    TA: Clone + 'static,
    TB: Clone + 'static,
{
    fn subscribe_with(&self, observer: Observer<(TA, TB)>) -> Subscription {
        let observer = Rc::new(observer);
        let latest = Rc::new(RefCell::new(Latest {
            a: None,
            b: None,
            completed: 0,
        }));

        let side_a = {
            let (latest, on_next, on_error, on_done) = (
                Rc::clone(&latest),
                Rc::clone(&observer),
                Rc::clone(&observer),
                Rc::clone(&observer),
            );
            let done = Rc::clone(&latest);
            Observer::new(move |value: &TA| {
                let pair = {
                    let mut latest = latest.borrow_mut();
                    latest.a = Some(value.clone());
                    latest.pair()
                };
                if let Some(pair) = pair {
                    on_next.next(&pair);
                }
            })
            .on_error(move |err| on_error.error(err))
            .on_completed(move || complete_one(&done, &on_done))
        };

        let side_b = {
            let (latest, on_next, on_error, on_done) = (
                Rc::clone(&latest),
                Rc::clone(&observer),
                Rc::clone(&observer),
                Rc::clone(&observer),
            );
            let done = Rc::clone(&latest);
            Observer::new(move |value: &TB| {
                let pair = {
                    let mut latest = latest.borrow_mut();
                    latest.b = Some(value.clone());
                    latest.pair()
                };
                if let Some(pair) = pair {
                    on_next.next(&pair);
                }
            })
            .on_error(move |err| on_error.error(err))
            .on_completed(move || complete_one(&done, &on_done))
        };

        let sub_a = self.a.subscribe_with(side_a);
        let sub_b = self.b.subscribe_with(side_b);
        sub_a.join(sub_b)
    }
}

fn complete_one<TA, TB, O>(latest: &RefCell<Latest<TA, TB>>, observer: &Observer<O>) {
    let all_done = {
        let mut latest = latest.borrow_mut();
        latest.completed += 1;
        latest.completed == 2
    };
    if all_done {
        observer.completed();
    }
}

// ---------------------------------------------------------------------------
// constant
// ---------------------------------------------------------------------------

/// Source returned by [`constant`].
#[derive(Debug, Clone)]
pub struct Constant<T> {
    value: T,
}

/// A source that delivers `value` to each subscriber once and never
/// completes.
pub fn constant<T: Clone + 'static>(value: T) -> Constant<T> {
    Constant { value }
}

impl<T: Clone + 'static> Source<T> for Constant<T> {
    fn subscribe_with(&self, observer: Observer<T>) -> Subscription {
        observer.next(&self.value);
        Subscription::from_guard(Rc::new(observer))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorSubject;
    use crate::error::StreamError;
    use crate::subject::Subject;
    use std::cell::Cell;

    fn collect<T: Clone + 'static>(source: &impl Source<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = source.subscribe(move |v: &T| l.borrow_mut().push(v.clone()));
        (log, sub)
    }

    #[test]
    fn map_transforms_values() {
        let subject = Subject::new();
        let mapped = subject.clone().map(|v: &i32| v * 2);
        let (log, _sub) = collect(&mapped);
        subject.next(1);
        subject.next(5);
        assert_eq!(*log.borrow(), vec![2, 10]);
    }

    #[test]
    fn map_forwards_completion() {
        let subject: Subject<i32> = Subject::new();
        let mapped = subject.clone().map(|v| v + 1);
        let done = Rc::new(Cell::new(false));
        let d = Rc::clone(&done);
        let _sub = mapped.subscribe_with(Observer::new(|_| {}).on_completed(move || d.set(true)));
        subject.complete();
        assert!(done.get());
    }

    #[test]
    fn distinct_suppresses_repeats() {
        let subject = Subject::new();
        let distinct = subject.clone().distinct_until_changed();
        let (log, _sub) = collect(&distinct);
        for v in [1, 1, 2, 2, 2, 1] {
            subject.next(v);
        }
        assert_eq!(*log.borrow(), vec![1, 2, 1]);
    }

    #[test]
    fn combine_latest_waits_for_both() {
        let a = Subject::new();
        let b = BehaviorSubject::new(false);
        let combined = combine_latest(a.clone(), b.clone()).map(|(x, y): &(bool, bool)| *x && !*y);
        let (log, _sub) = collect(&combined);
        assert!(log.borrow().is_empty());

        a.next(true);
        b.set(true);
        b.set(false);
        a.next(false);
        assert_eq!(*log.borrow(), vec![true, false, true, false]);
    }

    #[test]
    fn combine_latest_completes_after_both() {
        let a: Subject<i32> = Subject::new();
        let b: Subject<i32> = Subject::new();
        let done = Rc::new(Cell::new(false));
        let d = Rc::clone(&done);
        let _sub = combine_latest(a.clone(), b.clone())
            .subscribe_with(Observer::new(|_| {}).on_completed(move || d.set(true)));
        a.complete();
        assert!(!done.get());
        b.complete();
        assert!(done.get());
    }

    #[test]
    fn combine_latest_forwards_error() {
        let a: Subject<i32> = Subject::new();
        let b: Subject<i32> = Subject::new();
        let failed = Rc::new(Cell::new(false));
        let f = Rc::clone(&failed);
        let _sub = combine_latest(a.clone(), b)
            .subscribe_with(Observer::new(|_| {}).on_error(move |_| f.set(true)));
        a.error(StreamError::msg("nope"));
        assert!(failed.get());
    }

    #[test]
    fn constant_delivers_once_per_subscriber() {
        let source = constant(true);
        let (first, _s1) = collect(&source);
        let (second, _s2) = collect(&source);
        assert_eq!(*first.borrow(), vec![true]);
        assert_eq!(*second.borrow(), vec![true]);
    }

    #[test]
    fn shared_source_subscribes_through_rc() {
        let subject = Subject::new();
        let shared: SharedSource<i32> = subject.clone().shared();
        let (log, _sub) = collect(&shared);
        subject.next(3);
        assert_eq!(*log.borrow(), vec![3]);
    }

    #[test]
    fn dropping_outer_subscription_detaches_upstream() {
        let subject: Subject<i32> = Subject::new();
        let sub = subject.clone().map(|v| *v).subscribe(|_| {});
        assert!(subject.has_observers());
        drop(sub);
        assert!(!subject.has_observers());
    }
}
