//! The backing store contract.

use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::item::{Item, ItemId};

use super::capability::{Capability, CapabilitySet};
use super::query::{LoadOptions, PutDirectives, Query, QueryOptions, QueryResults, Subscription};

/// The uniform result of every store call that may suspend.
///
/// Synchronous stores return an already-completed future through [`ready`].
pub type StoreFuture<T> = BoxFuture<'static, StoreResult<T>>;

/// Wraps an immediate result in a completed [`StoreFuture`].
pub fn ready<T: Send + 'static>(result: StoreResult<T>) -> StoreFuture<T> {
    future::ready(result).boxed()
}

/// A completed future failing with [`StoreError::Unsupported`].
pub fn unsupported<T: Send + 'static>(capability: Capability) -> StoreFuture<T> {
    ready(Err(StoreError::Unsupported(capability)))
}

/// A push-style notification from an evented store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// An existing item was updated. Carries the new state.
    Change(Item),
    /// An item was deleted (or possibly moved).
    Delete(Item),
    /// An item was added.
    New(Item),
}

impl StoreEvent {
    /// The item the event is about.
    pub fn item(&self) -> &Item {
        match self {
            StoreEvent::Change(item) | StoreEvent::Delete(item) | StoreEvent::New(item) => item,
        }
    }
}

/// Listener registered on an evented store.
pub type StoreListener = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// A flat, query-based object store.
///
/// Only [`query`](Self::query) is required by the trait itself; every
/// optional operation defaults to [`StoreError::Unsupported`]. A store
/// announces which operations it really implements through
/// [`capabilities`](Self::capabilities), and callers never invoke an
/// operation the store did not declare. `get` and `put` must be declared
/// for a store to back a tree model.
pub trait ObjectStore: Send + Sync {
    /// The operations this store implements.
    fn capabilities(&self) -> CapabilitySet;

    /// Field holding each item's identity.
    fn id_property(&self) -> &str {
        "id"
    }

    /// Field naming each item's parents, when the store dictates it.
    ///
    /// Overrides the model's configured parent property.
    fn parent_property(&self) -> Option<&str> {
        None
    }

    /// Whether the store stamps identities and parents on writes itself.
    fn is_hierarchical(&self) -> bool {
        false
    }

    /// Runs a query.
    fn query(&self, query: &Query, options: &QueryOptions) -> StoreFuture<QueryResults>;

    /// Fetches an item. `Ok(None)` means it does not exist.
    fn get(&self, _id: &ItemId) -> StoreFuture<Option<Item>> {
        unsupported(Capability::Get)
    }

    /// Inserts or replaces an item, resolving to its identity.
    fn put(&self, _item: Item, _directives: &PutDirectives) -> StoreFuture<ItemId> {
        unsupported(Capability::Put)
    }

    /// Inserts an item, resolving to its identity.
    fn add(&self, _item: Item, _directives: &PutDirectives) -> StoreFuture<ItemId> {
        unsupported(Capability::Add)
    }

    /// Loads the store's data.
    fn load(&self, _options: &LoadOptions) -> StoreFuture<()> {
        unsupported(Capability::Load)
    }

    /// Whether `item` may have children.
    fn has_children(&self, _item: &Item) -> StoreResult<bool> {
        Err(StoreError::Unsupported(Capability::HasChildren))
    }

    /// Fetches the children of `parent`.
    fn get_children(&self, _parent: &Item, _options: &QueryOptions) -> StoreFuture<QueryResults> {
        unsupported(Capability::GetChildren)
    }

    /// Fetches the parents of `item`.
    fn get_parents(&self, _item: &Item) -> StoreFuture<Vec<Item>> {
        unsupported(Capability::GetParents)
    }

    /// Adds `parent` to the item's parent field. Returns whether it changed.
    fn add_parent(&self, _item: &mut Item, _parent: &ItemId) -> StoreResult<bool> {
        Err(StoreError::Unsupported(Capability::AddParent))
    }

    /// Removes `parent` from the item's parent field. Returns whether it changed.
    fn remove_parent(&self, _item: &mut Item, _parent: &ItemId) -> StoreResult<bool> {
        Err(StoreError::Unsupported(Capability::RemoveParent))
    }

    /// The store's own query engine.
    fn matches(&self, _query: &Query, _item: &Item) -> StoreResult<bool> {
        Err(StoreError::Unsupported(Capability::QueryEngine))
    }

    /// Whether `value` is an item of this store.
    fn is_item(&self, _value: &Value) -> StoreFuture<bool> {
        unsupported(Capability::IsItem)
    }

    /// Registers a listener for change/delete/new events.
    fn subscribe(&self, _listener: StoreListener) -> StoreResult<Subscription> {
        Err(StoreError::Unsupported(Capability::Emit))
    }
}
