#![forbid(unsafe_code)]

//! Static property identity.
//!
//! Properties are declared once, as `static` items, and identified by the
//! address of their descriptor. Two descriptors with the same name on the
//! same type are still distinct properties.
//!
//! ```ignore
//! static PERSON: ObjectType = ObjectType::new("Person");
//! static NAME: Property<String> = Property::new(&PERSON, "name");
//! static FRIEND: Property<Link<Person>> = Property::link(&PERSON, "friend");
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ptr;
use std::rc::Rc;

use crate::object::ReactiveObject;

/// Bound shared by every property value type.
pub trait PropertyValue: Clone + PartialEq + Default + 'static {}

impl<T: Clone + PartialEq + Default + 'static> PropertyValue for T {}

// ---------------------------------------------------------------------------
// ObjectType
// ---------------------------------------------------------------------------

/// Identity of a reactive object type. Declare as a `static`.
pub struct ObjectType {
    name: &'static str,
}

impl ObjectType {
    /// Create a type descriptor.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// Type name, for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ObjectType {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for ObjectType {}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectType").field(&self.name).finish()
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct LinkInfo {
    target: fn() -> &'static ObjectType,
    navigate: fn(&dyn Any) -> Option<ReactiveObject>,
}

/// Type-erased property descriptor.
pub struct PropertyInfo {
    owner: &'static ObjectType,
    name: &'static str,
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    link: Option<LinkInfo>,
}

/// Typed property descriptor. Declare as a `static`.
pub struct Property<T> {
    info: PropertyInfo,
    _marker: PhantomData<fn() -> T>,
}

impl<T: PropertyValue> Property<T> {
    /// A plain value property.
    #[must_use]
    pub const fn new(owner: &'static ObjectType, name: &'static str) -> Self {
        Self {
            info: PropertyInfo {
                owner,
                name,
                type_id: TypeId::of::<T>,
                type_name: std::any::type_name::<T>,
                link: None,
            },
            _marker: PhantomData,
        }
    }
}

impl<L: PropertyValue + Linkable> Property<L> {
    /// A property whose value refers to another reactive object. Only link
    /// properties may appear in the middle of a property path.
    #[must_use]
    pub const fn link(owner: &'static ObjectType, name: &'static str) -> Self {
        Self {
            info: PropertyInfo {
                owner,
                name,
                type_id: TypeId::of::<L>,
                type_name: std::any::type_name::<L>,
                link: Some(LinkInfo {
                    target: L::target_type,
                    navigate: navigate::<L>,
                }),
            },
            _marker: PhantomData,
        }
    }
}

fn navigate<L: Linkable + 'static>(value: &dyn Any) -> Option<ReactiveObject> {
    value.downcast_ref::<L>().and_then(Linkable::linked_object)
}

impl<T> Property<T> {
    /// Identity of this property.
    #[must_use]
    pub fn id(&'static self) -> PropertyId {
        PropertyId(&self.info)
    }

    /// Property name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Declaring type.
    #[must_use]
    pub fn owner(&self) -> &'static ObjectType {
        self.info.owner
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Property({}.{})", self.info.owner.name, self.info.name)
    }
}

// ---------------------------------------------------------------------------
// PropertyId
// ---------------------------------------------------------------------------

/// Copyable identity of a declared property, compared by descriptor
/// address.
#[derive(Clone, Copy)]
pub struct PropertyId(&'static PropertyInfo);

impl PropertyId {
    /// Property name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.0.name
    }

    /// Declaring type.
    #[must_use]
    pub fn owner(self) -> &'static ObjectType {
        self.0.owner
    }

    /// `TypeId` of the value type.
    #[must_use]
    pub fn value_type_id(self) -> TypeId {
        (self.0.type_id)()
    }

    /// Name of the value type, for diagnostics.
    #[must_use]
    pub fn value_type_name(self) -> &'static str {
        (self.0.type_name)()
    }

    /// Whether the value refers to another reactive object.
    #[must_use]
    pub fn is_link(self) -> bool {
        self.0.link.is_some()
    }

    /// Type of the object a link property refers to.
    #[must_use]
    pub fn link_target(self) -> Option<&'static ObjectType> {
        self.0.link.map(|link| (link.target)())
    }

    /// Follow a stored link value to the object it refers to.
    pub(crate) fn follow(self, value: &dyn Any) -> Option<ReactiveObject> {
        self.0.link.and_then(|link| (link.navigate)(value))
    }
}

impl PartialEq for PropertyId {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.0, other.0)
    }
}

impl Eq for PropertyId {}

impl Hash for PropertyId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        ptr::hash(self.0, state);
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({self})")
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0.owner.name, self.0.name)
    }
}

// ---------------------------------------------------------------------------
// Reactive / Linkable / Link
// ---------------------------------------------------------------------------

/// A view-model type backed by a [`ReactiveObject`].
pub trait Reactive: 'static {
    /// The declared type every property of this model is owned by.
    fn object_type() -> &'static ObjectType
    where
        Self: Sized;

    /// The backing object.
    fn reactive(&self) -> &ReactiveObject;
}

/// A property value that may refer to a reactive object.
pub trait Linkable {
    /// Type of the referenced object.
    fn target_type() -> &'static ObjectType
    where
        Self: Sized;

    /// The referenced object, if any.
    fn linked_object(&self) -> Option<ReactiveObject>;
}

/// Optional reference to another reactive model.
///
/// Equality is reference identity: two links are equal when both are empty
/// or both point to the same allocation.
pub struct Link<R>(Option<Rc<R>>);

impl<R> Link<R> {
    /// A link to `target`.
    #[must_use]
    pub fn new(target: Rc<R>) -> Self {
        Self(Some(target))
    }

    /// The empty link.
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    /// The referenced model.
    #[must_use]
    pub fn get(&self) -> Option<&Rc<R>> {
        self.0.as_ref()
    }

    /// Whether the link points somewhere.
    #[must_use]
    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }
}

impl<R> Clone for Link<R> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<R> Default for Link<R> {
    fn default() -> Self {
        Self(None)
    }
}

impl<R> PartialEq for Link<R> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<R> From<Rc<R>> for Link<R> {
    fn from(target: Rc<R>) -> Self {
        Self::new(target)
    }
}

impl<R> From<Option<Rc<R>>> for Link<R> {
    fn from(target: Option<Rc<R>>) -> Self {
        Self(target)
    }
}

impl<R> fmt::Debug for Link<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(target) => write!(f, "Link({:p})", Rc::as_ptr(target)),
            None => f.write_str("Link(none)"),
        }
    }
}

impl<R: Reactive> Linkable for Link<R> {
    fn target_type() -> &'static ObjectType {
        R::object_type()
    }

    fn linked_object(&self) -> Option<ReactiveObject> {
        self.0.as_ref().map(|target| target.reactive().clone())
    }
}
