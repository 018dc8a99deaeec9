//! Property-based invariant tests for the notification pipeline.
//!
//! 1. A write is a no-op (no event, no version bump) iff the new value
//!    equals the current one.
//! 2. Overrides from `changing` subscribers compose in subscription order,
//!    and the committed value is what `changed` reports.
//! 3. A two-link path observer emits exactly the de-duplicated sequence of
//!    terminal values produced by any sequence of link and leaf writes.

use std::cell::RefCell;
use std::rc::Rc;

use propel_core::Source;
use propel_runtime::{
    AnyChanged, Changed, Changing, Link, ObjectType, Property, PropertyPath, Reactive,
    ReactiveObject,
};
use proptest::prelude::*;

static CELL: ObjectType = ObjectType::new("Cell");
static VALUE: Property<i16> = Property::new(&CELL, "value");
static NEXT: Property<Link<Node>> = Property::link(&CELL, "next");

struct Node {
    object: ReactiveObject,
}

impl Reactive for Node {
    fn object_type() -> &'static ObjectType {
        &CELL
    }

    fn reactive(&self) -> &ReactiveObject {
        &self.object
    }
}

fn node(value: i16) -> Rc<Node> {
    let node = Rc::new(Node {
        object: ReactiveObject::new(&CELL),
    });
    node.object.set(&VALUE, value);
    node
}

#[derive(Debug, Clone, Copy)]
enum Override {
    Add(i16),
    Clamp(i16),
    Negate,
}

impl Override {
    fn apply(self, value: i16) -> i16 {
        match self {
            Self::Add(n) => value.saturating_add(n),
            Self::Clamp(max) => value.min(max),
            Self::Negate => value.saturating_neg(),
        }
    }
}

fn override_strategy() -> impl Strategy<Value = Override> {
    prop_oneof![
        (-5i16..5).prop_map(Override::Add),
        (-10i16..10).prop_map(Override::Clamp),
        Just(Override::Negate),
    ]
}

#[derive(Debug, Clone, Copy)]
enum PathOp {
    Link(Option<usize>),
    Leaf(usize, i16),
}

fn path_op_strategy() -> impl Strategy<Value = PathOp> {
    prop_oneof![
        proptest::option::of(0usize..3).prop_map(PathOp::Link),
        (0usize..3, 0i16..4).prop_map(|(i, v)| PathOp::Leaf(i, v)),
    ]
}

proptest! {
    #[test]
    fn set_is_a_no_op_iff_equal(values in proptest::collection::vec(-3i16..3, 0..48)) {
        let obj = ReactiveObject::new(&CELL);
        let events = Rc::new(RefCell::new(0u64));
        let e = Rc::clone(&events);
        let _sub = obj.changed().subscribe(move |_: &AnyChanged| *e.borrow_mut() += 1);

        let mut current = 0i16;
        let mut expected = 0u64;
        for v in values {
            if v != current {
                expected += 1;
                current = v;
            }
            obj.set(&VALUE, v);
            prop_assert_eq!(obj.get(&VALUE), current);
        }
        prop_assert_eq!(*events.borrow(), expected);
        prop_assert_eq!(obj.version(), expected);
    }

    #[test]
    fn overrides_compose_in_subscription_order(
        overrides in proptest::collection::vec(override_strategy(), 0..6),
        start in -20i16..20,
        written in -20i16..20,
    ) {
        let obj = ReactiveObject::new(&CELL);
        obj.set(&VALUE, start);

        let _subs: Vec<_> = overrides
            .iter()
            .map(|&op| {
                obj.changing_of(&VALUE)
                    .subscribe(move |c: &Changing<i16>| c.set_new_value(op.apply(c.new_value())))
            })
            .collect();
        let committed = Rc::new(RefCell::new(Vec::new()));
        let c = Rc::clone(&committed);
        let _changed = obj
            .changed_of(&VALUE)
            .subscribe(move |e: &Changed<i16>| c.borrow_mut().push(*e.new_value()));

        obj.set(&VALUE, written);

        let folded = overrides.iter().fold(written, |v, op| op.apply(v));
        if written == start || folded == start {
            prop_assert_eq!(obj.get(&VALUE), start);
            prop_assert!(committed.borrow().is_empty());
        } else {
            prop_assert_eq!(obj.get(&VALUE), folded);
            prop_assert_eq!(&*committed.borrow(), &vec![folded]);
        }
    }

    #[test]
    fn path_emits_deduplicated_terminal_values(ops in proptest::collection::vec(path_op_strategy(), 0..40)) {
        let root = node(0);
        let leaves = [node(0), node(1), node(2)];
        let path = PropertyPath::new(&NEXT).to(&VALUE);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = root
            .object
            .observe(&path)
            .expect("valid path")
            .subscribe(move |v: &i16| s.borrow_mut().push(*v));

        let mut linked: Option<usize> = None;
        let mut expected = vec![0i16];
        for op in ops {
            match op {
                PathOp::Link(target) => {
                    linked = target;
                    root.object.set(&NEXT, Link::from(target.map(|i| Rc::clone(&leaves[i]))));
                }
                PathOp::Leaf(i, v) => leaves[i].object.set(&VALUE, v),
            }
            let terminal = linked.map_or(0, |i| leaves[i].object.get(&VALUE));
            if expected.last() != Some(&terminal) {
                expected.push(terminal);
            }
        }
        prop_assert_eq!(&*seen.borrow(), &expected);
    }
}
