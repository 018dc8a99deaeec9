#![forbid(unsafe_code)]

//! Per-object property storage.
//!
//! A store maps [`PropertyId`] to a boxed value. It never sees the value
//! type: the typed accessors on [`ReactiveObject`](crate::ReactiveObject)
//! downcast on the way out, and a property's identity fixes its type.
//!
//! Two strategies ship with the crate:
//!
//! | Store         | Lookup      | Best for                             |
//! |---------------|-------------|--------------------------------------|
//! | [`HashStore`]   | O(1) hash   | objects with many properties         |
//! | [`LinearStore`] | O(n) scan   | small objects (a handful of fields)  |

use std::any::Any;
use std::fmt;
use std::str::FromStr;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::error::ConfigError;
use crate::property::PropertyId;

/// Storage strategy for one object's property values.
pub trait PropertyStore {
    /// The stored value, or `None` if the property was never written.
    fn retrieve(&self, id: PropertyId) -> Option<&dyn Any>;

    /// Store or replace a value.
    fn store(&mut self, id: PropertyId, value: Box<dyn Any>);

    /// Remove a value, returning it.
    fn remove(&mut self, id: PropertyId) -> Option<Box<dyn Any>>;

    /// Number of stored values.
    fn len(&self) -> usize;

    /// Whether no value is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored value.
    fn clear(&mut self);
}

/// Hash-map backed store.
#[derive(Default)]
pub struct HashStore {
    values: AHashMap<PropertyId, Box<dyn Any>>,
}

impl HashStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PropertyStore for HashStore {
    fn retrieve(&self, id: PropertyId) -> Option<&dyn Any> {
        self.values.get(&id).map(|value| &**value)
    }

    fn store(&mut self, id: PropertyId, value: Box<dyn Any>) {
        self.values.insert(id, value);
    }

    fn remove(&mut self, id: PropertyId) -> Option<Box<dyn Any>> {
        self.values.remove(&id)
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn clear(&mut self) {
        self.values.clear();
    }
}

impl fmt::Debug for HashStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// Inline vector store with linear lookup.
#[derive(Default)]
pub struct LinearStore {
    values: SmallVec<[(PropertyId, Box<dyn Any>); 8]>,
}

impl LinearStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, id: PropertyId) -> Option<usize> {
        self.values.iter().position(|(key, _)| *key == id)
    }
}

impl PropertyStore for LinearStore {
    fn retrieve(&self, id: PropertyId) -> Option<&dyn Any> {
        self.values
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, value)| &**value)
    }

    fn store(&mut self, id: PropertyId, value: Box<dyn Any>) {
        match self.position(id) {
            Some(index) => self.values[index].1 = value,
            None => self.values.push((id, value)),
        }
    }

    fn remove(&mut self, id: PropertyId) -> Option<Box<dyn Any>> {
        let index = self.position(id)?;
        Some(self.values.swap_remove(index).1)
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn clear(&mut self) {
        self.values.clear();
    }
}

impl fmt::Debug for LinearStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.values.iter().map(|(key, _)| key))
            .finish()
    }
}

/// Which built-in store a new object gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// [`HashStore`].
    #[default]
    Hash,
    /// [`LinearStore`].
    Linear,
}

impl StoreKind {
    /// Build an empty store of this kind.
    #[must_use]
    pub fn build(self) -> Box<dyn PropertyStore> {
        match self {
            Self::Hash => Box::new(HashStore::new()),
            Self::Linear => Box::new(LinearStore::new()),
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Linear => "linear",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hash" | "map" => Ok(Self::Hash),
            "linear" | "vec" | "small" => Ok(Self::Linear),
            other => Err(ConfigError::UnknownStore(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{ObjectType, Property};

    static BOX: ObjectType = ObjectType::new("Box");
    static WIDTH: Property<u32> = Property::new(&BOX, "width");
    static TITLE: Property<String> = Property::new(&BOX, "title");

    fn exercise(mut store: Box<dyn PropertyStore>) {
        assert!(store.is_empty());
        assert!(store.retrieve(WIDTH.id()).is_none());

        store.store(WIDTH.id(), Box::new(3u32));
        store.store(TITLE.id(), Box::new(String::from("a")));
        store.store(WIDTH.id(), Box::new(4u32));
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.retrieve(WIDTH.id()).and_then(|v| v.downcast_ref::<u32>()),
            Some(&4)
        );

        let removed = store.remove(TITLE.id());
        assert_eq!(
            removed.and_then(|v| v.downcast::<String>().ok()).map(|v| *v),
            Some(String::from("a"))
        );
        assert!(store.remove(TITLE.id()).is_none());

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn hash_store_contract() {
        exercise(StoreKind::Hash.build());
    }

    #[test]
    fn linear_store_contract() {
        exercise(StoreKind::Linear.build());
    }

    #[test]
    fn store_kind_parses() {
        assert_eq!("hash".parse::<StoreKind>(), Ok(StoreKind::Hash));
        assert_eq!(" Linear ".parse::<StoreKind>(), Ok(StoreKind::Linear));
        assert_eq!(
            "btree".parse::<StoreKind>(),
            Err(ConfigError::UnknownStore("btree".into()))
        );
        assert_eq!(StoreKind::Linear.to_string(), "linear");
    }
}
