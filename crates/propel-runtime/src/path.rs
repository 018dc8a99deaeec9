#![forbid(unsafe_code)]

//! Property-path observation across linked objects.
//!
//! # Design
//!
//! A [`PathObservable<T>`] follows a chain `root.p1.p2 ... pn` where every
//! property but the last is a link to another reactive object. Each
//! subscription keeps a stack of active links, one per reachable chain
//! position, each holding a subscription to that object's per-property
//! `changed` stream.
//!
//! When the property at depth `k` changes, every link deeper than `k` is
//! dropped and rebuilt from the new value, stopping at the first absent
//! link. The terminal value is then re-read; an absent link anywhere makes
//! it `T::default()`.
//!
//! # Invariants
//!
//! 1. A subscriber receives the current terminal value immediately, then
//!    once per change that alters it (values are compared with `PartialEq`).
//! 2. Objects detached from the chain never cause another emission.
//! 3. A rebuild finishes before the new value is delivered, and no borrow
//!    of the subscription state is held while the observer runs.
//!
//! # Failure Modes
//!
//! - **Invalid chain**: rejected by [`ReactiveObject::observe`] with a
//!   [`ChainError`]; a chain that validates never fails later.
//! - **Disposed intermediate object**: treated as an absent link.
//! - **Root disposed or dropped**: the subscriber is completed.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use propel_core::{Observer, Source, Subscription};
use tracing::{debug, trace};

use crate::change::AnyChanged;
use crate::error::{ChainError, ChainResult};
use crate::object::{ReactiveObject, WeakObject};
use crate::property::{Linkable, ObjectType, Property, PropertyId, PropertyValue};

// ---------------------------------------------------------------------------
// PropertyChain
// ---------------------------------------------------------------------------

/// Untyped, ordered list of property identities.
#[derive(Clone, PartialEq, Eq)]
pub struct PropertyChain {
    links: Rc<[PropertyId]>,
}

impl PropertyChain {
    /// Build a chain. Validity is checked when it is observed.
    pub fn new(ids: impl IntoIterator<Item = PropertyId>) -> Self {
        Self {
            links: ids.into_iter().collect(),
        }
    }

    /// The identities, root first.
    #[must_use]
    pub fn ids(&self) -> &[PropertyId] {
        &self.links
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the chain has no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Check that the chain starts on `root` and that every property but
    /// the last is a link to the type declaring the next one.
    pub fn validate(&self, root: &'static ObjectType) -> ChainResult<()> {
        let first = *self.links.first().ok_or(ChainError::Empty)?;
        if first.owner() != root {
            return Err(ChainError::NotOnRootType {
                property: first,
                root: root.name(),
            });
        }
        for pair in self.links.windows(2) {
            let (link, next) = (pair[0], pair[1]);
            let target = link
                .link_target()
                .ok_or(ChainError::NotALink { property: link })?;
            if next.owner() != target {
                return Err(ChainError::WrongOwner {
                    property: next,
                    expected: target.name(),
                });
            }
        }
        Ok(())
    }

    fn validate_terminal<T: PropertyValue>(&self) -> ChainResult<()> {
        let Some(&last) = self.links.last() else {
            return Err(ChainError::Empty);
        };
        if last.value_type_id() != std::any::TypeId::of::<T>() {
            return Err(ChainError::TerminalType {
                property: last,
                expected: std::any::type_name::<T>(),
                found: last.value_type_name(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for PropertyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.links.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PropertyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyChain({self})")
    }
}

// ---------------------------------------------------------------------------
// PropertyPath
// ---------------------------------------------------------------------------

/// A property chain whose terminal value type is `T`.
pub struct PropertyPath<T> {
    chain: PropertyChain,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for PropertyPath<T> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for PropertyPath<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyPath({})", self.chain)
    }
}

impl PropertyPath<()> {
    /// Start a path at a link property of the root type.
    pub fn new<L: PropertyValue + Linkable>(first: &'static Property<L>) -> PathBuilder {
        PathBuilder {
            links: vec![first.id()],
        }
    }
}

impl<T: PropertyValue> PropertyPath<T> {
    /// A single-property path.
    #[must_use]
    pub fn direct(property: &'static Property<T>) -> Self {
        Self::from_chain(PropertyChain::new([property.id()]))
    }

    /// Wrap an untyped chain. Its terminal type is checked when observed.
    #[must_use]
    pub fn from_chain(chain: PropertyChain) -> Self {
        Self {
            chain,
            _marker: PhantomData,
        }
    }

    /// The underlying chain.
    #[must_use]
    pub fn chain(&self) -> &PropertyChain {
        &self.chain
    }
}

/// Builder returned by [`PropertyPath::new`].
#[derive(Debug, Clone)]
pub struct PathBuilder {
    links: Vec<PropertyId>,
}

impl PathBuilder {
    /// Follow another link.
    #[must_use]
    pub fn then<L: PropertyValue + Linkable>(mut self, link: &'static Property<L>) -> Self {
        self.links.push(link.id());
        self
    }

    /// Finish at the terminal property.
    #[must_use]
    pub fn to<T: PropertyValue>(mut self, terminal: &'static Property<T>) -> PropertyPath<T> {
        self.links.push(terminal.id());
        PropertyPath::from_chain(PropertyChain::new(self.links))
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

impl ReactiveObject {
    /// Observe the terminal value of `path`, starting at this object.
    ///
    /// # Errors
    ///
    /// [`ChainError`] if the chain does not start on this object's type, is
    /// not a sequence of links, or does not end in a `T`.
    pub fn observe<T: PropertyValue>(
        &self,
        path: &PropertyPath<T>,
    ) -> ChainResult<PathObservable<T>> {
        path.chain.validate(self.object_type())?;
        path.chain.validate_terminal::<T>()?;
        debug!(object = self.id(), path = %path.chain, "path.observe");
        Ok(PathObservable {
            root: self.clone(),
            chain: path.chain.clone(),
            _marker: PhantomData,
        })
    }

    /// Observe one property: current value first, then every change.
    ///
    /// # Panics
    ///
    /// If the property belongs to another type.
    #[track_caller]
    #[must_use]
    pub fn observe_value<T: PropertyValue>(&self, property: &'static Property<T>) -> PathObservable<T> {
        match self.observe(&PropertyPath::direct(property)) {
            Ok(observable) => observable,
            Err(err) => panic!("{err}"),
        }
    }
}

/// Live terminal value of a property path. See the module docs.
pub struct PathObservable<T> {
    root: ReactiveObject,
    chain: PropertyChain,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for PathObservable<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            chain: self.chain.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for PathObservable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathObservable")
            .field("root", &self.root)
            .field("chain", &self.chain)
            .finish()
    }
}

impl<T: PropertyValue> Source<T> for PathObservable<T> {
    fn subscribe_with(&self, observer: Observer<T>) -> Subscription {
        let tracker = Rc::new(PathTracker {
            root: self.root.downgrade(),
            chain: self.chain.clone(),
            observer,
            state: RefCell::new(PathState {
                links: Vec::with_capacity(self.chain.len()),
                last: None,
                generation: 0,
            }),
        });
        tracker.rebuild(0);
        if self.root.is_disposed() {
            tracker.observer.completed();
        }
        Subscription::from_guard(tracker)
    }
}

struct ActiveLink {
    object: WeakObject,
    generation: u64,
    _subscription: Subscription,
}

struct PathState<T> {
    links: Vec<ActiveLink>,
    last: Option<T>,
    generation: u64,
}

struct PathTracker<T> {
    root: WeakObject,
    chain: PropertyChain,
    observer: Observer<T>,
    state: RefCell<PathState<T>>,
}

impl<T: PropertyValue> PathTracker<T> {
    /// Drop links at `from` and deeper, re-attach from the current values,
    /// then deliver the terminal value if it changed.
    fn rebuild(self: &Rc<Self>, from: usize) {
        let ids = self.chain.ids();
        let emit = {
            let mut state = self.state.borrow_mut();
            state.links.truncate(from);
            state.generation += 1;
            let generation = state.generation;

            let mut current = if from >= ids.len() {
                None
            } else if from == 0 {
                self.root.upgrade()
            } else {
                state.links[from - 1]
                    .object
                    .upgrade()
                    .and_then(|object| object.follow(ids[from - 1]))
            };

            for (depth, &id) in ids.iter().enumerate().skip(from) {
                let Some(object) = current.take() else { break };
                if object.is_disposed() {
                    break;
                }
                let subscription = self.watch(&object, depth, id, generation);
                if depth + 1 < ids.len() {
                    current = object.follow(id);
                }
                state.links.push(ActiveLink {
                    object: object.downgrade(),
                    generation,
                    _subscription: subscription,
                });
            }

            let value = if state.links.len() == ids.len() {
                state
                    .links
                    .last()
                    .and_then(|link| link.object.upgrade())
                    .map(|object| object.read_or_default::<T>(ids[ids.len() - 1]))
                    .unwrap_or_default()
            } else {
                T::default()
            };

            if state.last.as_ref() == Some(&value) {
                None
            } else {
                state.last = Some(value.clone());
                Some(value)
            }
        };

        if let Some(value) = emit {
            trace!(path = %self.chain, from, "path.emit");
            self.observer.next(&value);
        }
    }

    fn watch(
        self: &Rc<Self>,
        object: &ReactiveObject,
        depth: usize,
        id: PropertyId,
        generation: u64,
    ) -> Subscription {
        let tracker = Rc::downgrade(self);
        let completed = Rc::downgrade(self);
        let observer = Observer::new(move |_: &AnyChanged| {
            if let Some(tracker) = tracker.upgrade() {
                tracker.link_changed(depth, generation);
            }
        })
        .on_completed(move || {
            let Some(tracker) = completed.upgrade() else { return };
            if depth == 0 {
                tracker.observer.completed();
            } else {
                tracker.link_disposed(depth, generation);
            }
        });
        object.changed_subject(id).subscribe_with(observer)
    }

    fn is_live(&self, depth: usize, generation: u64) -> bool {
        let live = self
            .state
            .borrow()
            .links
            .get(depth)
            .is_some_and(|link| link.generation == generation);
        if !live {
            trace!(path = %self.chain, depth, "path.stale_notification");
        }
        live
    }

    /// The object at `depth` was disposed: re-read the chain from its
    /// parent, which now sees an absent link.
    fn link_disposed(self: &Rc<Self>, depth: usize, generation: u64) {
        if !self.is_live(depth, generation) {
            return;
        }
        debug!(path = %self.chain, depth, "path.link_disposed");
        self.rebuild(depth);
    }

    fn link_changed(self: &Rc<Self>, depth: usize, generation: u64) {
        if !self.is_live(depth, generation) {
            return;
        }
        if depth + 1 < self.chain.len() {
            debug!(path = %self.chain, depth, "path.rebuild");
        }
        self.rebuild(depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{Link, Reactive};
    use std::cell::Cell;

    static NODE: ObjectType = ObjectType::new("Node");
    static NEXT: Property<Link<Node>> = Property::link(&NODE, "next");
    static VALUE: Property<i32> = Property::new(&NODE, "value");
    static NAME: Property<String> = Property::new(&NODE, "name");

    static LEAF: ObjectType = ObjectType::new("Leaf");
    static WEIGHT: Property<u8> = Property::new(&LEAF, "weight");

    struct Node {
        object: ReactiveObject,
    }

    impl Node {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                object: ReactiveObject::new(&NODE),
            })
        }
    }

    impl Reactive for Node {
        fn object_type() -> &'static ObjectType {
            &NODE
        }

        fn reactive(&self) -> &ReactiveObject {
            &self.object
        }
    }

    fn record<T: Clone + 'static>(source: &impl Source<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = source.subscribe(move |v: &T| l.borrow_mut().push(v.clone()));
        (log, sub)
    }

    #[test]
    fn direct_path_emits_current_then_changes() {
        let node = Node::new();
        node.object.set(&VALUE, 4);
        let (log, _sub) = record(&node.object.observe_value(&VALUE));
        node.object.set(&VALUE, 5);
        node.object.set(&NAME, String::from("ignored"));
        assert_eq!(*log.borrow(), vec![4, 5]);
    }

    #[test]
    fn two_link_path_follows_replacement() {
        let root = Node::new();
        let path = PropertyPath::new(&NEXT).to(&VALUE);
        let (log, _sub) = record(&root.object.observe(&path).expect("valid path"));
        assert_eq!(*log.borrow(), vec![0]);

        let a = Node::new();
        a.object.set(&VALUE, 10);
        root.object.set(&NEXT, Link::new(Rc::clone(&a)));
        a.object.set(&VALUE, 11);

        root.object.set(&NEXT, Link::none());
        a.object.set(&VALUE, 12);
        assert_eq!(*log.borrow(), vec![0, 10, 11, 0]);
    }

    #[test]
    fn equal_terminal_values_are_not_repeated() {
        let root = Node::new();
        let a = Node::new();
        let b = Node::new();
        a.object.set(&VALUE, 3);
        b.object.set(&VALUE, 3);
        root.object.set(&NEXT, Link::new(a));

        let path = PropertyPath::new(&NEXT).to(&VALUE);
        let (log, _sub) = record(&root.object.observe(&path).expect("valid path"));
        root.object.set(&NEXT, Link::new(b));
        assert_eq!(*log.borrow(), vec![3]);
    }

    #[test]
    fn unsubscribe_detaches_every_link() {
        let root = Node::new();
        let a = Node::new();
        root.object.set(&NEXT, Link::new(Rc::clone(&a)));

        let path = PropertyPath::new(&NEXT).to(&VALUE);
        let sub = root.object.observe(&path).expect("valid path").subscribe(|_| {});
        assert!(root.object.changed_subject(NEXT.id()).has_observers());
        assert!(a.object.changed_subject(VALUE.id()).has_observers());

        drop(sub);
        assert!(!root.object.changed_subject(NEXT.id()).has_observers());
        assert!(!a.object.changed_subject(VALUE.id()).has_observers());
    }

    #[test]
    fn disposing_root_completes_subscriber() {
        let root = Node::new();
        let done = Rc::new(Cell::new(false));
        let d = Rc::clone(&done);
        let _sub = root
            .object
            .observe_value(&VALUE)
            .subscribe_with(Observer::new(|_| {}).on_completed(move || d.set(true)));
        root.object.dispose();
        assert!(done.get());
    }

    #[test]
    fn disposing_root_that_owns_the_only_link_handle() {
        let root = Node::new();
        let a = Node::new();
        a.object.set(&VALUE, 6);
        root.object.set(&NEXT, Link::new(a));

        let done = Rc::new(Cell::new(false));
        let d = Rc::clone(&done);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let path = PropertyPath::new(&NEXT).to(&VALUE);
        let _sub = root.object.observe(&path).expect("valid path").subscribe_with(
            Observer::new(move |v: &i32| l.borrow_mut().push(*v)).on_completed(move || d.set(true)),
        );

        root.object.dispose();
        assert_eq!(*log.borrow(), vec![6, 0]);
        assert!(done.get());
    }

    #[test]
    fn chain_errors() {
        let root = Node::new();

        let empty: PropertyPath<i32> = PropertyPath::from_chain(PropertyChain::new([]));
        assert_eq!(root.object.observe(&empty).err(), Some(ChainError::Empty));

        let foreign = PropertyPath::direct(&WEIGHT);
        assert!(matches!(
            root.object.observe(&foreign).err(),
            Some(ChainError::NotOnRootType { root: "Node", .. })
        ));

        let not_link: PropertyPath<i32> =
            PropertyPath::from_chain(PropertyChain::new([NAME.id(), VALUE.id()]));
        assert_eq!(
            root.object.observe(&not_link).err(),
            Some(ChainError::NotALink { property: NAME.id() })
        );

        let wrong_owner: PropertyPath<u8> =
            PropertyPath::from_chain(PropertyChain::new([NEXT.id(), WEIGHT.id()]));
        assert_eq!(
            root.object.observe(&wrong_owner).err(),
            Some(ChainError::WrongOwner {
                property: WEIGHT.id(),
                expected: "Node"
            })
        );

        let wrong_type: PropertyPath<String> =
            PropertyPath::from_chain(PropertyChain::new([NEXT.id(), VALUE.id()]));
        assert!(matches!(
            root.object.observe(&wrong_type).err(),
            Some(ChainError::TerminalType { .. })
        ));
    }

    #[test]
    fn chain_display() {
        let path = PropertyPath::new(&NEXT).then(&NEXT).to(&NAME);
        assert_eq!(path.chain().to_string(), "Node.next -> Node.next -> Node.name");
        assert_eq!(path.chain().len(), 3);
    }
}
