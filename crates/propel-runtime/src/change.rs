#![forbid(unsafe_code)]

//! Change events and the typed views over per-property streams.
//!
//! A property write produces one [`Changing`] event before it is committed
//! and one [`Changed`] event after. Global streams carry the type-erased
//! [`AnyChanging`] / [`AnyChanged`] wrappers; per-property streams are
//! exposed through [`PropertyChanges`], which downcasts to the typed event.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use propel_core::{Observer, Source, Subject, Subscription};

use crate::property::{PropertyId, PropertyValue};

/// A pending write, delivered before it is committed.
///
/// Subscribers may replace the pending value with
/// [`set_new_value`](Self::set_new_value). Replacing it with the old value
/// cancels the write.
#[derive(Debug)]
pub struct Changing<T> {
    property: PropertyId,
    old: T,
    pending: RefCell<T>,
}

impl<T: Clone> Changing<T> {
    pub(crate) fn new(property: PropertyId, old: T, new: T) -> Self {
        Self {
            property,
            old,
            pending: RefCell::new(new),
        }
    }

    /// The property being written.
    #[must_use]
    pub fn property(&self) -> PropertyId {
        self.property
    }

    /// Value before the write.
    #[must_use]
    pub fn old_value(&self) -> &T {
        &self.old
    }

    /// Value that will be committed, including any earlier overrides.
    #[must_use]
    pub fn new_value(&self) -> T {
        self.pending.borrow().clone()
    }

    /// Override the value that will be committed.
    pub fn set_new_value(&self, value: T) {
        *self.pending.borrow_mut() = value;
    }
}

/// A committed write.
#[derive(Debug, Clone, PartialEq)]
pub struct Changed<T> {
    property: PropertyId,
    old: T,
    new: T,
}

impl<T> Changed<T> {
    pub(crate) fn new(property: PropertyId, old: T, new: T) -> Self {
        Self { property, old, new }
    }

    /// The property that was written.
    #[must_use]
    pub fn property(&self) -> PropertyId {
        self.property
    }

    /// Value before the write.
    #[must_use]
    pub fn old_value(&self) -> &T {
        &self.old
    }

    /// Value after the write.
    #[must_use]
    pub fn new_value(&self) -> &T {
        &self.new
    }
}

/// Type-erased [`Changing`] event, as seen by global subscribers.
#[derive(Clone)]
pub struct AnyChanging {
    property: PropertyId,
    event: Rc<dyn Any>,
}

impl AnyChanging {
    pub(crate) fn new<T: PropertyValue>(event: Rc<Changing<T>>) -> Self {
        Self {
            property: event.property,
            event,
        }
    }

    /// The property being written.
    #[must_use]
    pub fn property(&self) -> PropertyId {
        self.property
    }

    /// The typed event, if `T` is the property's value type.
    #[must_use]
    pub fn downcast<T: 'static>(&self) -> Option<&Changing<T>> {
        self.event.downcast_ref()
    }
}

impl fmt::Debug for AnyChanging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyChanging").field(&self.property).finish()
    }
}

/// Type-erased [`Changed`] event, as seen by global subscribers.
#[derive(Clone)]
pub struct AnyChanged {
    property: PropertyId,
    event: Rc<dyn Any>,
}

impl AnyChanged {
    pub(crate) fn new<T: PropertyValue>(event: Changed<T>) -> Self {
        Self {
            property: event.property,
            event: Rc::new(event),
        }
    }

    /// The property that was written.
    #[must_use]
    pub fn property(&self) -> PropertyId {
        self.property
    }

    /// The typed event, if `T` is the property's value type.
    #[must_use]
    pub fn downcast<T: 'static>(&self) -> Option<&Changed<T>> {
        self.event.downcast_ref()
    }
}

impl fmt::Debug for AnyChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyChanged").field(&self.property).finish()
    }
}

/// Typed, read-only view over one property's change stream.
///
/// `E` is the erased event type of the underlying stream and `T` the
/// property's value type.
pub struct PropertyChanges<E, T> {
    subject: Subject<E>,
    _marker: PhantomData<fn() -> T>,
}

impl<E, T> PropertyChanges<E, T> {
    pub(crate) fn new(subject: Subject<E>) -> Self {
        Self {
            subject,
            _marker: PhantomData,
        }
    }
}

impl<E, T> Clone for PropertyChanges<E, T> {
    fn clone(&self) -> Self {
        Self::new(self.subject.clone())
    }
}

impl<E, T> fmt::Debug for PropertyChanges<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyChanges")
            .field("subject", &self.subject)
            .finish()
    }
}

impl<T: PropertyValue> Source<Changing<T>> for PropertyChanges<AnyChanging, T> {
    fn subscribe_with(&self, observer: Observer<Changing<T>>) -> Subscription {
        self.subject
            .subscribe_with(Observer::relay(Rc::new(observer), |event: &AnyChanging, out| {
                if let Some(typed) = event.downcast::<T>() {
                    out.next(typed);
                }
            }))
    }
}

impl<T: PropertyValue> Source<Changed<T>> for PropertyChanges<AnyChanged, T> {
    fn subscribe_with(&self, observer: Observer<Changed<T>>) -> Subscription {
        self.subject
            .subscribe_with(Observer::relay(Rc::new(observer), |event: &AnyChanged, out| {
                if let Some(typed) = event.downcast::<T>() {
                    out.next(typed);
                }
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{ObjectType, Property};

    static NOTE: ObjectType = ObjectType::new("Note");
    static BODY: Property<String> = Property::new(&NOTE, "body");

    #[test]
    fn changing_override_is_visible() {
        let event = Changing::new(BODY.id(), String::from("a"), String::from("b"));
        assert_eq!(event.new_value(), "b");
        event.set_new_value(String::from("c"));
        assert_eq!(event.old_value(), "a");
        assert_eq!(event.new_value(), "c");
        assert_eq!(event.property(), BODY.id());
    }

    #[test]
    fn erased_events_downcast_to_their_type() {
        let changing = AnyChanging::new(Rc::new(Changing::new(BODY.id(), String::new(), "x".into())));
        assert!(changing.downcast::<String>().is_some());
        assert!(changing.downcast::<u32>().is_none());

        let changed = AnyChanged::new(Changed::new(BODY.id(), String::new(), String::from("x")));
        assert_eq!(changed.property(), BODY.id());
        assert_eq!(
            changed.downcast::<String>().map(|c| c.new_value().as_str()),
            Some("x")
        );
    }

    #[test]
    fn typed_view_delivers_only_matching_events() {
        let subject: Subject<AnyChanged> = Subject::new();
        let view: PropertyChanges<AnyChanged, String> = PropertyChanges::new(subject.clone());
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let _sub = view.subscribe(move |c: &Changed<String>| l.borrow_mut().push(c.new_value().clone()));

        subject.next(AnyChanged::new(Changed::new(BODY.id(), String::new(), String::from("one"))));
        assert_eq!(*log.borrow(), vec![String::from("one")]);
    }
}
