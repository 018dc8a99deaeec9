#![forbid(unsafe_code)]

//! Derived properties.
//!
//! A derived property is an ordinary property whose value is recomputed
//! from other properties of the same object. Recomputation is eager: it
//! runs right after a dependency's `changed` notifications, and the result
//! is written through [`ReactiveObject::set`], so a derived property emits
//! its own `changing`/`changed` events and can itself be a dependency.
//!
//! Writes that leave the derived value unchanged are no-ops, which also
//! stops mutually dependent properties from recursing forever once they
//! settle.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::trace;

use crate::object::ReactiveObject;
use crate::property::{Property, PropertyId, PropertyValue};

pub(crate) struct Derived {
    target: PropertyId,
    dependencies: SmallVec<[PropertyId; 4]>,
    recompute: Box<dyn Fn(&ReactiveObject)>,
}

impl fmt::Debug for Derived {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("target", &self.target)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl ReactiveObject {
    /// Keep `target` equal to `compute(self)` whenever any of
    /// `dependencies` changes. The value is computed once immediately.
    ///
    /// # Panics
    ///
    /// If the object is disposed, if `target` or a dependency belongs to
    /// another type, or if `target` depends on itself.
    #[track_caller]
    pub fn derive<T: PropertyValue>(
        &self,
        target: &'static Property<T>,
        dependencies: &[PropertyId],
        compute: impl Fn(&ReactiveObject) -> T + 'static,
    ) {
        self.assert_live("derive");
        let target_id = target.id();
        assert!(
            !dependencies.contains(&target_id),
            "derived property {target_id} cannot depend on itself"
        );
        for dependency in dependencies {
            assert!(
                dependency.owner() == self.object_type(),
                "{dependency} is not a property of {}",
                self.object_type()
            );
        }

        let entry = Rc::new(Derived {
            target: target_id,
            dependencies: dependencies.iter().copied().collect(),
            recompute: Box::new(move |object: &ReactiveObject| {
                let value = compute(object);
                object.set(target, value);
            }),
        });
        (entry.recompute)(self);
        self.derived().borrow_mut().push(entry);
    }

    /// Recompute every derived property that depends on `changed`.
    pub(crate) fn recompute_derived(&self, changed: PropertyId) {
        let affected: SmallVec<[Rc<Derived>; 4]> = self
            .derived()
            .borrow()
            .iter()
            .filter(|entry| entry.dependencies.contains(&changed))
            .cloned()
            .collect();
        for entry in affected {
            if self.is_disposed() {
                return;
            }
            trace!(object = self.id(), source = %changed, target = %entry.target, "derived.recompute");
            (entry.recompute)(self);
        }
    }
}
