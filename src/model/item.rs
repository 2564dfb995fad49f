//! Identity of schema items and the ordered collections that own them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dialect::Dialect;

/// Opaque, immutable identifier assigned when an item is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemId(Uuid);

impl SystemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SystemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SystemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named schema item with a stable system id.
pub trait ModelItem {
    /// Human readable kind, used in error messages.
    const KIND: &'static str;

    fn system_id(&self) -> SystemId;
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
}

/// Ordered collection of items keyed by system id.
///
/// Insertion order is preserved and observable. Uniqueness of names is not
/// checked here; the owner enforces it when mutating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de> + ModelItem"))]
#[serde(from = "Vec<T>", into = "Vec<T>")]
pub struct OwnedItemList<T: Clone> {
    items: IndexMap<SystemId, T>,
}

impl<T: Clone> Default for OwnedItemList<T> {
    fn default() -> Self {
        Self {
            items: IndexMap::new(),
        }
    }
}

impl<T: ModelItem + Clone> From<Vec<T>> for OwnedItemList<T> {
    fn from(items: Vec<T>) -> Self {
        let mut list = Self::default();
        for item in items {
            list.add(item);
        }
        list
    }
}

impl<T: Clone> From<OwnedItemList<T>> for Vec<T> {
    fn from(list: OwnedItemList<T>) -> Self {
        list.items.into_values().collect()
    }
}

impl<T: ModelItem + Clone> OwnedItemList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. An item with the same id is replaced in place.
    pub fn add(&mut self, item: T) {
        self.items.insert(item.system_id(), item);
    }

    pub fn find_by_id(&self, id: SystemId) -> Option<&T> {
        self.items.get(&id)
    }

    pub fn find_by_id_mut(&mut self, id: SystemId) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    /// Look an item up by name, comparing normalized forms.
    pub fn find_by_name(&self, name: &str, dialect: Dialect) -> Option<&T> {
        let wanted = dialect.normalize(name);
        self.items
            .values()
            .find(|item| dialect.normalize(item.name()) == wanted)
    }

    pub fn find_by_name_mut(&mut self, name: &str, dialect: Dialect) -> Option<&mut T> {
        let wanted = dialect.normalize(name);
        self.items
            .values_mut()
            .find(|item| dialect.normalize(item.name()) == wanted)
    }

    pub fn contains(&self, id: SystemId) -> bool {
        self.items.contains_key(&id)
    }

    /// Remove by identity, keeping the order of the remaining items.
    /// Absent ids are a no-op.
    pub fn remove_by_id(&mut self, id: SystemId) -> Option<T> {
        self.items.shift_remove(&id)
    }

    pub fn remove(&mut self, item: &T) -> Option<T> {
        self.remove_by_id(item.system_id())
    }

    /// Keep only the items matching the predicate, returning the removed ones in order.
    pub fn drain_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let ids: Vec<SystemId> = self
            .items
            .iter()
            .filter(|(_, item)| predicate(item))
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.items.shift_remove(&id))
            .collect()
    }

    pub fn position(&self, id: SystemId) -> Option<usize> {
        self.items.get_index_of(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.values_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a, T: ModelItem + Clone> IntoIterator for &'a OwnedItemList<T> {
    type Item = &'a T;
    type IntoIter = indexmap::map::Values<'a, SystemId, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Named {
        id: SystemId,
        name: String,
    }

    impl Named {
        fn new(name: &str) -> Self {
            Self {
                id: SystemId::new(),
                name: name.to_string(),
            }
        }
    }

    impl ModelItem for Named {
        const KIND: &'static str = "Item";

        fn system_id(&self) -> SystemId {
            self.id
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn set_name(&mut self, name: String) {
            self.name = name;
        }
    }

    #[test]
    fn test_preserves_insertion_order() {
        let mut list = OwnedItemList::new();
        for name in ["c", "a", "b"] {
            list.add(Named::new(name));
        }
        let names: Vec<&str> = list.iter().map(|n| n.name()).collect();
        assert_eq!(names, ["c", "a", "b"]);

        let a = list.find_by_name("a", Dialect::Generic).unwrap().id;
        list.remove_by_id(a);
        let names: Vec<&str> = list.iter().map(|n| n.name()).collect();
        assert_eq!(names, ["c", "b"]);
    }

    #[test]
    fn test_find_by_name_uses_dialect() {
        let mut list = OwnedItemList::new();
        list.add(Named::new("CUSTOMER"));
        assert!(list.find_by_name("customer", Dialect::MySQL).is_some());
        assert!(list.find_by_name("customer", Dialect::Generic).is_none());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut list: OwnedItemList<Named> = OwnedItemList::new();
        list.add(Named::new("a"));
        assert!(list.remove_by_id(SystemId::new()).is_none());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_drain_where() {
        let mut list = OwnedItemList::new();
        for name in ["a1", "b", "a2"] {
            list.add(Named::new(name));
        }
        let removed = list.drain_where(|n| n.name.starts_with('a'));
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].name, "a1");
        assert_eq!(list.len(), 1);
    }
}
