//! Property-based invariant tests for subjects and behavior subjects.
//!
//! 1. Every observer sees exactly the values emitted while it was
//!    subscribed, in emission order.
//! 2. BehaviorSubject version equals the number of value-changing sets.
//! 3. distinct_until_changed never delivers two equal values in a row.

use std::cell::RefCell;
use std::rc::Rc;

use propel_core::{BehaviorSubject, Source, Subject, Subscription};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Subscribe,
    Unsubscribe(usize),
    Emit(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Subscribe),
        (0usize..8).prop_map(Op::Unsubscribe),
        any::<u8>().prop_map(Op::Emit),
    ]
}

struct Tracked {
    log: Rc<RefCell<Vec<u8>>>,
    expected: Vec<u8>,
    subscription: Option<Subscription>,
}

proptest! {
    #[test]
    fn observers_see_exactly_their_window(ops in proptest::collection::vec(op_strategy(), 0..64)) {
        let subject: Subject<u8> = Subject::new();
        let mut tracked: Vec<Tracked> = Vec::new();

        for op in ops {
            match op {
                Op::Subscribe => {
                    let log = Rc::new(RefCell::new(Vec::new()));
                    let l = Rc::clone(&log);
                    let subscription = subject.subscribe(move |v| l.borrow_mut().push(*v));
                    tracked.push(Tracked { log, expected: Vec::new(), subscription: Some(subscription) });
                }
                Op::Unsubscribe(i) => {
                    if let Some(t) = tracked.get_mut(i) {
                        t.subscription = None;
                    }
                }
                Op::Emit(v) => {
                    subject.next(v);
                    for t in tracked.iter_mut().filter(|t| t.subscription.is_some()) {
                        t.expected.push(v);
                    }
                }
            }
        }

        for t in &tracked {
            prop_assert_eq!(&*t.log.borrow(), &t.expected);
        }
    }

    #[test]
    fn behavior_version_counts_changes(values in proptest::collection::vec(0u8..4, 0..64)) {
        let b = BehaviorSubject::new(0u8);
        let mut expected_version = 0u64;
        let mut current = 0u8;
        for v in values {
            if v != current {
                expected_version += 1;
                current = v;
            }
            b.set(v);
        }
        prop_assert_eq!(b.version(), expected_version);
        prop_assert_eq!(b.get(), current);
    }

    #[test]
    fn distinct_never_repeats(values in proptest::collection::vec(0u8..3, 0..64)) {
        let subject: Subject<u8> = Subject::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let _sub = subject.clone().distinct_until_changed().subscribe(move |v| l.borrow_mut().push(*v));
        for v in &values {
            subject.next(*v);
        }
        let log = log.borrow();
        prop_assert!(log.windows(2).all(|w| w[0] != w[1]));
        let mut dedup = values.clone();
        dedup.dedup();
        prop_assert_eq!(&*log, &dedup);
    }
}
