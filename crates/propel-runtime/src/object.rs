#![forbid(unsafe_code)]

//! The change-notification core.
//!
//! # Design
//!
//! A [`ReactiveObject`] owns a [`PropertyStore`] plus a set of lazily
//! materialized notification subjects. Every write goes through
//! [`set`](ReactiveObject::set):
//!
//! 1. equal value: nothing happens (no event, no store write);
//! 2. a [`Changing`] event goes to the global stream, then the property's
//!    own stream; subscribers may replace the pending value;
//! 3. a pending value equal to the old one cancels the write;
//! 4. the value is committed to the store;
//! 5. a [`Changed`] event goes to the global stream, then the property's
//!    own stream;
//! 6. derived properties depending on the property are recomputed, then
//!    generic listeners are told which property changed.
//!
//! # Invariants
//!
//! 1. No stream observes the pending value through the store before commit.
//! 2. `version` increments by exactly 1 per committed write.
//! 3. No `RefCell` borrow of the object is held while user callbacks run,
//!    so subscribers may read and write the object re-entrantly. A nested
//!    write runs to completion before the outer dispatch continues.
//! 4. Disposal happens once. Afterwards every stream accessor hands out an
//!    already completed stream.
//!
//! # Failure Modes
//!
//! - **Use after dispose**: `get`, `set`, `derive` and `register` panic.
//! - **Disposed mid-dispatch**: a write whose `changing` subscribers dispose
//!   the object is abandoned before commit.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use propel_core::{Disposable, DisposeBag, SharedSource, Source, Subject, Subscription};
use tracing::{debug, trace};

use crate::change::{AnyChanged, AnyChanging, Changed, Changing, PropertyChanges};
use crate::config::ObjectConfig;
use crate::derived::Derived;
use crate::property::{ObjectType, Property, PropertyId, PropertyValue};
use crate::store::PropertyStore;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct Streams {
    changing: Option<Subject<AnyChanging>>,
    changed: Option<Subject<AnyChanged>>,
    changing_by: AHashMap<PropertyId, Subject<AnyChanging>>,
    changed_by: AHashMap<PropertyId, Subject<AnyChanged>>,
    listeners: Option<Subject<PropertyId>>,
}

fn materialize<E: 'static>(disposed: bool) -> Subject<E> {
    if disposed {
        Subject::completed()
    } else {
        Subject::new()
    }
}

pub(crate) struct ObjectInner {
    id: u64,
    object_type: &'static ObjectType,
    log_changes: bool,
    store: RefCell<Option<Box<dyn PropertyStore>>>,
    streams: RefCell<Streams>,
    derived: RefCell<Vec<Rc<Derived>>>,
    resources: RefCell<DisposeBag>,
    disposed: Cell<bool>,
    version: Cell<u64>,
}

impl ObjectInner {
    /// Release the store, complete every stream and dispose resources.
    fn shutdown(&self) {
        // Values may own the last handle to linked objects, whose own
        // shutdown can call back into this one: drop them unborrowed.
        let store = self.store.borrow_mut().take();
        drop(store);
        let derived = std::mem::take(&mut *self.derived.borrow_mut());
        drop(derived);

        let (changing, changed, listeners) = {
            let streams = self.streams.borrow();
            let changing: Vec<_> = streams
                .changing
                .iter()
                .chain(streams.changing_by.values())
                .cloned()
                .collect();
            let changed: Vec<_> = streams
                .changed
                .iter()
                .chain(streams.changed_by.values())
                .cloned()
                .collect();
            (changing, changed, streams.listeners.clone())
        };
        for subject in changing {
            subject.complete();
        }
        for subject in changed {
            subject.complete();
        }
        if let Some(listeners) = listeners {
            listeners.complete();
        }

        let resources = self.resources.borrow_mut().take();
        for mut resource in resources {
            resource.dispose();
        }
    }
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        if !self.disposed.replace(true) {
            self.shutdown();
        }
    }
}

/// A property bag with change notification.
///
/// Cloning creates another handle to the **same** object.
#[derive(Clone)]
pub struct ReactiveObject {
    inner: Rc<ObjectInner>,
}

/// Non-owning handle to a [`ReactiveObject`].
#[derive(Clone, Default)]
pub struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    /// The object, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<ReactiveObject> {
        self.0.upgrade().map(|inner| ReactiveObject { inner })
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakObject")
            .field(&self.0.strong_count())
            .finish()
    }
}

impl ReactiveObject {
    /// Create an object with the default configuration.
    #[must_use]
    pub fn new(object_type: &'static ObjectType) -> Self {
        Self::with_config(object_type, &ObjectConfig::default())
    }

    /// Create an object using `config`.
    #[must_use]
    pub fn with_config(object_type: &'static ObjectType, config: &ObjectConfig) -> Self {
        Self::build(object_type, config.store.build(), config.log_changes)
    }

    /// Create an object backed by a custom store.
    #[must_use]
    pub fn with_store(object_type: &'static ObjectType, store: impl PropertyStore + 'static) -> Self {
        Self::build(object_type, Box::new(store), false)
    }

    fn build(
        object_type: &'static ObjectType,
        store: Box<dyn PropertyStore>,
        log_changes: bool,
    ) -> Self {
        let id = NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed);
        trace!(object = id, object_type = object_type.name(), "object.create");
        Self {
            inner: Rc::new(ObjectInner {
                id,
                object_type,
                log_changes,
                store: RefCell::new(Some(store)),
                streams: RefCell::new(Streams::default()),
                derived: RefCell::new(Vec::new()),
                resources: RefCell::new(DisposeBag::new()),
                disposed: Cell::new(false),
                version: Cell::new(0),
            }),
        }
    }

    /// Process-unique object id, used in log events.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The declared type of this object.
    #[must_use]
    pub fn object_type(&self) -> &'static ObjectType {
        self.inner.object_type
    }

    /// Number of committed writes.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// A non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.inner))
    }

    pub(crate) fn derived(&self) -> &RefCell<Vec<Rc<Derived>>> {
        &self.inner.derived
    }

    /// Whether two handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // -----------------------------------------------------------------------
    // get / set
    // -----------------------------------------------------------------------

    /// Current value, or `T::default()` if the property was never written.
    ///
    /// # Panics
    ///
    /// If the object is disposed or the property belongs to another type.
    #[track_caller]
    #[must_use]
    pub fn get<T: PropertyValue>(&self, property: &'static Property<T>) -> T {
        let id = property.id();
        self.assert_owns(id);
        match self.read(id) {
            Some(value) => value,
            None => self.used_after_dispose("get", id),
        }
    }

    /// Write a property, running the full notification pipeline.
    ///
    /// # Panics
    ///
    /// If the object is disposed or the property belongs to another type.
    #[track_caller]
    pub fn set<T: PropertyValue>(&self, property: &'static Property<T>, value: T) {
        let id = property.id();
        self.assert_owns(id);
        let old: T = match self.read(id) {
            Some(old) => old,
            None => self.used_after_dispose("set", id),
        };
        if old == value {
            trace!(object = self.inner.id, property = %id, "set.unchanged");
            return;
        }

        let (global, local) = {
            let streams = self.inner.streams.borrow();
            (streams.changing.clone(), streams.changing_by.get(&id).cloned())
        };
        let new = if global.is_some() || local.is_some() {
            let event = Rc::new(Changing::new(id, old.clone(), value));
            let erased = AnyChanging::new(Rc::clone(&event));
            if let Some(subject) = global {
                subject.emit(&erased);
            }
            if let Some(subject) = local {
                subject.emit(&erased);
            }
            event.new_value()
        } else {
            value
        };

        if new == old {
            trace!(object = self.inner.id, property = %id, "set.vetoed");
            return;
        }
        if !self.commit(id, Box::new(new.clone())) {
            debug!(object = self.inner.id, property = %id, "set.abandoned: disposed during dispatch");
            return;
        }
        let version = self.inner.version.get() + 1;
        self.inner.version.set(version);
        if self.inner.log_changes {
            debug!(object = self.inner.id, property = %id, version, "set.commit");
        } else {
            trace!(object = self.inner.id, property = %id, version, "set.commit");
        }

        let (global, local) = {
            let streams = self.inner.streams.borrow();
            (streams.changed.clone(), streams.changed_by.get(&id).cloned())
        };
        if global.is_some() || local.is_some() {
            let event = AnyChanged::new(Changed::new(id, old, new));
            if let Some(subject) = global {
                subject.emit(&event);
            }
            if let Some(subject) = local {
                subject.emit(&event);
            }
        }

        self.recompute_derived(id);

        let listeners = self.inner.streams.borrow().listeners.clone();
        if let Some(listeners) = listeners {
            listeners.emit(&id);
        }
    }

    /// Typed read by identity. `None` once disposed.
    fn read<T: PropertyValue>(&self, id: PropertyId) -> Option<T> {
        let store = self.inner.store.borrow();
        let store = store.as_ref()?;
        let value = store.retrieve(id).and_then(|value| {
            let typed = value.downcast_ref::<T>();
            debug_assert!(typed.is_some(), "{id} stored with a foreign type");
            typed
        });
        Some(value.cloned().unwrap_or_default())
    }

    /// Value of `id` for path observation: the default once disposed.
    pub(crate) fn read_or_default<T: PropertyValue>(&self, id: PropertyId) -> T {
        self.read(id).unwrap_or_default()
    }

    /// The object a link property currently refers to.
    pub(crate) fn follow(&self, id: PropertyId) -> Option<ReactiveObject> {
        let store = self.inner.store.borrow();
        let value = store.as_ref()?.retrieve(id)?;
        id.follow(value)
    }

    fn commit(&self, id: PropertyId, value: Box<dyn Any>) -> bool {
        let previous = {
            let mut store = self.inner.store.borrow_mut();
            let Some(store) = store.as_mut() else {
                return false;
            };
            let previous = store.remove(id);
            store.store(id, value);
            previous
        };
        drop(previous);
        true
    }

    #[track_caller]
    fn assert_owns(&self, id: PropertyId) {
        assert!(
            id.owner() == self.inner.object_type,
            "{id} is not a property of {}",
            self.inner.object_type
        );
    }

    #[track_caller]
    pub(crate) fn assert_live(&self, op: &str) {
        if self.inner.disposed.get() {
            panic!(
                "{op} on disposed {} #{}",
                self.inner.object_type, self.inner.id
            );
        }
    }

    #[cold]
    #[track_caller]
    fn used_after_dispose(&self, op: &str, id: PropertyId) -> ! {
        panic!(
            "{op}({id}) on disposed {} #{}",
            self.inner.object_type, self.inner.id
        );
    }

    // -----------------------------------------------------------------------
    // Streams
    // -----------------------------------------------------------------------

    /// Pending writes to any property.
    #[must_use]
    pub fn changing(&self) -> SharedSource<AnyChanging> {
        let subject = {
            let mut streams = self.inner.streams.borrow_mut();
            let disposed = self.inner.disposed.get();
            streams
                .changing
                .get_or_insert_with(|| self.materialized("changing", None, disposed))
                .clone()
        };
        Rc::new(subject)
    }

    /// Committed writes to any property.
    #[must_use]
    pub fn changed(&self) -> SharedSource<AnyChanged> {
        let subject = {
            let mut streams = self.inner.streams.borrow_mut();
            let disposed = self.inner.disposed.get();
            streams
                .changed
                .get_or_insert_with(|| self.materialized("changed", None, disposed))
                .clone()
        };
        Rc::new(subject)
    }

    /// Pending writes to one property.
    ///
    /// # Panics
    ///
    /// If the property belongs to another type.
    #[track_caller]
    #[must_use]
    pub fn changing_of<T: PropertyValue>(
        &self,
        property: &'static Property<T>,
    ) -> PropertyChanges<AnyChanging, T> {
        let id = property.id();
        self.assert_owns(id);
        let subject = {
            let mut streams = self.inner.streams.borrow_mut();
            let disposed = self.inner.disposed.get();
            streams
                .changing_by
                .entry(id)
                .or_insert_with(|| self.materialized("changing", Some(id), disposed))
                .clone()
        };
        PropertyChanges::new(subject)
    }

    /// Committed writes to one property.
    ///
    /// # Panics
    ///
    /// If the property belongs to another type.
    #[track_caller]
    #[must_use]
    pub fn changed_of<T: PropertyValue>(
        &self,
        property: &'static Property<T>,
    ) -> PropertyChanges<AnyChanged, T> {
        let id = property.id();
        self.assert_owns(id);
        PropertyChanges::new(self.changed_subject(id))
    }

    pub(crate) fn changed_subject(&self, id: PropertyId) -> Subject<AnyChanged> {
        let mut streams = self.inner.streams.borrow_mut();
        let disposed = self.inner.disposed.get();
        streams
            .changed_by
            .entry(id)
            .or_insert_with(|| self.materialized("changed", Some(id), disposed))
            .clone()
    }

    /// Call `listener` with the identity of every committed write, after the
    /// `changed` streams and derived properties have been notified.
    pub fn on_property_changed(&self, listener: impl Fn(PropertyId) + 'static) -> Subscription {
        let subject = {
            let mut streams = self.inner.streams.borrow_mut();
            let disposed = self.inner.disposed.get();
            streams
                .listeners
                .get_or_insert_with(|| self.materialized("listeners", None, disposed))
                .clone()
        };
        subject.subscribe(move |id: &PropertyId| listener(*id))
    }

    fn materialized<E: 'static>(
        &self,
        kind: &'static str,
        property: Option<PropertyId>,
        disposed: bool,
    ) -> Subject<E> {
        match property {
            Some(property) => {
                debug!(object = self.inner.id, kind, property = %property, "stream.materialize");
            }
            None => debug!(object = self.inner.id, kind, "stream.materialize"),
        }
        materialize(disposed)
    }

    // -----------------------------------------------------------------------
    // Disposal
    // -----------------------------------------------------------------------

    /// Dispose `resource` together with this object.
    ///
    /// # Panics
    ///
    /// If the object is already disposed.
    #[track_caller]
    pub fn register(&self, resource: impl Disposable + 'static) {
        self.assert_live("register");
        self.inner.resources.borrow_mut().add(resource);
    }

    /// Release the store, complete every materialized stream and dispose
    /// registered resources. Later calls do nothing.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        debug!(
            object = self.inner.id,
            object_type = self.inner.object_type.name(),
            version = self.inner.version.get(),
            "object.dispose"
        );
        self.inner.shutdown();
    }
}

impl Disposable for ReactiveObject {
    fn dispose(&mut self) {
        ReactiveObject::dispose(self);
    }
}

impl PartialEq for ReactiveObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ReactiveObject {}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("type", &self.inner.object_type.name())
            .field("id", &self.inner.id)
            .field("version", &self.inner.version.get())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}
