//! Last-observed copies of store items, keyed by identity.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::item::{Item, ItemId};

/// Snapshot cache.
///
/// Entries are only ever replaced wholesale, never edited in place.
#[derive(Default)]
pub struct ObjectCache {
    items: RwLock<HashMap<ItemId, Item>>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the snapshot for `id`.
    pub fn get(&self, id: &ItemId) -> Option<Item> {
        self.items.read().get(id).cloned()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.read().contains_key(id)
    }

    /// Replaces the snapshot, returning the previous one.
    pub fn replace(&self, id: ItemId, item: Item) -> Option<Item> {
        self.items.write().insert(id, item)
    }

    /// Stores `item` only if nothing is cached for `id` yet.
    pub fn insert_if_absent(&self, id: ItemId, item: &Item) {
        self.items.write().entry(id).or_insert_with(|| item.clone());
    }

    pub fn remove(&self, id: &ItemId) -> Option<Item> {
        self.items.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }
}
