//! Parent-reference field codec.
//!
//! An item's parent field holds either one identity or a collection of
//! identities. [`ParentSet`] normalizes both forms into a duplicate-free set
//! and writes it back in the same shape it was read from.

use serde_json::Value;

use crate::item::{Item, ItemId};

/// The normalized parents of one item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentSet {
    ids: Vec<ItemId>,
    multiple: bool,
}

impl ParentSet {
    /// An empty, single-parent set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a parent field value.
    ///
    /// `null` means no parents. Entries without an identity are skipped.
    pub fn from_value(value: &Value) -> Self {
        let mut set = Self::new();
        match value {
            Value::Array(values) => {
                set.multiple = true;
                for id in values.iter().filter_map(ItemId::from_value) {
                    set.add(id);
                }
            }
            scalar => {
                if let Some(id) = ItemId::from_value(scalar) {
                    set.ids.push(id);
                }
            }
        }
        set
    }

    /// Decodes the parent field of `item`. A missing field means no parents.
    pub fn from_item(item: &Item, parent_property: &str) -> Self {
        item.get(parent_property).map(Self::from_value).unwrap_or_default()
    }

    /// Adds a parent. Returns `false` if it was already present.
    pub fn add(&mut self, id: ItemId) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Removes a parent. Returns `false` if it was not present.
    pub fn remove(&mut self, id: &ItemId) -> bool {
        match self.ids.iter().position(|p| p == id) {
            Some(pos) => {
                self.ids.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether the source value was a collection.
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// Forces collection output on serialization.
    pub fn set_multiple(&mut self, multiple: bool) {
        self.multiple = multiple;
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemId> {
        self.ids.iter()
    }

    /// Parents present in exactly one of `self` and `other`.
    pub fn symmetric_difference(&self, other: &ParentSet) -> Vec<ItemId> {
        let added = other.ids.iter().filter(|id| !self.contains(id));
        let removed = self.ids.iter().filter(|id| !other.contains(id));
        added.chain(removed).cloned().collect()
    }

    /// Encodes the set as a parent field value.
    ///
    /// Collections stay collections. Otherwise one parent is a scalar, none
    /// is `null` and several become an array.
    pub fn to_value(&self) -> Value {
        if self.multiple || self.ids.len() > 1 {
            return Value::Array(self.ids.iter().map(ItemId::to_value).collect());
        }
        self.ids.first().map(ItemId::to_value).unwrap_or(Value::Null)
    }

    /// Writes the encoded set into `item`'s parent field.
    pub fn write_to(&self, item: &mut Item, parent_property: &str) {
        item.set(parent_property, self.to_value());
    }
}

impl FromIterator<ItemId> for ParentSet {
    fn from_iter<I: IntoIterator<Item = ItemId>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.add(id);
        }
        set
    }
}
