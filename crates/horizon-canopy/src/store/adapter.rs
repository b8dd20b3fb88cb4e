//! Decorating wrapper that routes every store call through the capability table.

use std::sync::Arc;

use futures_util::future::{self, FutureExt};
use serde_json::Value;

use crate::error::{ModelResult, StoreError, StoreResult};
use crate::item::{Item, ItemId};
use crate::parents::ParentSet;

use super::capability::{
    AddSlot, CapabilityTable, ChangeChannel, ChildrenSlot, HasChildrenSlot, IsItemSlot, LoadSlot,
    ParentEditSlot, ParentsSlot, QueryEngineSlot, WriteHook,
};
use super::query::{LoadOptions, PutDirectives, Query, QueryOptions, QueryResults, Subscription};
use super::traits::{ObjectStore, StoreFuture, StoreListener, ready};

const TARGET: &str = "horizon_canopy::store";

/// A backing store bound to its probed capability table.
///
/// Every optional operation is dispatched on its table slot: either to the
/// store's own implementation or to the synthesized default. Writes pass
/// through the identity-stamping hook unless the store is hierarchical.
#[derive(Clone)]
pub struct StoreAdapter {
    store: Arc<dyn ObjectStore>,
    table: CapabilityTable,
    id_property: String,
    parent_property: String,
}

impl StoreAdapter {
    /// Probes `store` and wraps it.
    ///
    /// `parent_property` is used unless the store dictates its own.
    pub fn new(store: Arc<dyn ObjectStore>, parent_property: &str) -> ModelResult<Self> {
        let table = CapabilityTable::probe(store.as_ref())?;
        let parent_property = store.parent_property().unwrap_or(parent_property).to_string();
        let id_property = store.id_property().to_string();
        tracing::debug!(
            target: TARGET,
            channel = ?table.channel,
            parent_property = %parent_property,
            "store adapter ready"
        );
        Ok(Self {
            store,
            table,
            id_property,
            parent_property,
        })
    }

    pub fn table(&self) -> &CapabilityTable {
        &self.table
    }

    /// The active change-notification mode.
    pub fn channel(&self) -> ChangeChannel {
        self.table.channel
    }

    pub fn id_property(&self) -> &str {
        &self.id_property
    }

    pub fn parent_property(&self) -> &str {
        &self.parent_property
    }

    /// The wrapped store.
    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Reads the identity of `item`.
    pub fn identity(&self, item: &Item) -> Option<ItemId> {
        item.identity(&self.id_property)
    }

    /// Decodes the parent field of `item`.
    pub fn parent_set(&self, item: &Item) -> ParentSet {
        ParentSet::from_item(item, &self.parent_property)
    }

    pub fn query(&self, query: &Query, options: &QueryOptions) -> StoreFuture<QueryResults> {
        self.store.query(query, options)
    }

    pub fn get(&self, id: &ItemId) -> StoreFuture<Option<Item>> {
        self.store.get(id)
    }

    /// Writes `item` through the `put` hook.
    pub fn put(&self, mut item: Item, directives: &PutDirectives) -> StoreFuture<ItemId> {
        self.stamp(self.table.put, &mut item, directives);
        self.store.put(item, directives)
    }

    /// Inserts `item`, falling back to `put` when the store has no `add`.
    pub fn add(&self, mut item: Item, directives: &PutDirectives) -> StoreFuture<ItemId> {
        match self.table.add {
            AddSlot::Native(hook) => {
                self.stamp(hook, &mut item, directives);
                self.store.add(item, directives)
            }
            AddSlot::ViaPut => self.put(item, directives),
        }
    }

    pub fn load(&self, options: &LoadOptions) -> StoreFuture<()> {
        match self.table.load {
            LoadSlot::Native => self.store.load(options),
            LoadSlot::Immediate => ready(Ok(())),
        }
    }

    /// Whether `item` may have children. Failures count as "yes".
    pub fn has_children(&self, item: &Item) -> bool {
        match self.table.has_children {
            HasChildrenSlot::Native => self.store.has_children(item).unwrap_or_else(|err| {
                tracing::warn!(target: TARGET, error = %err, "hasChildren failed, assuming children");
                true
            }),
            HasChildrenSlot::AssumeYes => true,
        }
    }

    /// Fetches the children of `parent`, querying the parent field when the
    /// store has no `getChildren` of its own.
    pub fn get_children(&self, parent: &Item, options: &QueryOptions) -> StoreFuture<QueryResults> {
        match self.table.get_children {
            ChildrenSlot::Native => self.store.get_children(parent, options),
            ChildrenSlot::QueryByParent => match self.identity(parent) {
                Some(id) => {
                    let query = Query::by_parent(&self.parent_property, &id);
                    tracing::trace!(target: TARGET, parent = %id, "children via parent query");
                    self.store.query(&query, options)
                }
                None => ready(Err(StoreError::MissingIdentity)),
            },
        }
    }

    /// Fetches the parents of `item`.
    ///
    /// Without a native lookup each parent identity is resolved through
    /// `get`; parents that are missing or fail to load are left out.
    pub fn get_parents(&self, item: &Item) -> StoreFuture<Vec<Item>> {
        match self.table.get_parents {
            ParentsSlot::Native => self.store.get_parents(item),
            ParentsSlot::ResolveByIdentity => {
                let lookups: Vec<_> = self.parent_set(item).iter().map(|id| self.store.get(id)).collect();
                future::join_all(lookups)
                    .map(|found| {
                        Ok(found
                            .into_iter()
                            .filter_map(|result| match result {
                                Ok(parent) => parent,
                                Err(err) => {
                                    tracing::debug!(target: TARGET, error = %err, "parent lookup failed");
                                    None
                                }
                            })
                            .collect())
                    })
                    .boxed()
            }
        }
    }

    /// Adds `parent` to the parent field of `item` in place.
    pub fn add_parent(&self, item: &mut Item, parent: &ItemId) -> StoreResult<bool> {
        match self.table.add_parent {
            ParentEditSlot::Native => self.store.add_parent(item, parent),
            ParentEditSlot::ParentSetCodec => {
                let mut parents = self.parent_set(item);
                let changed = parents.add(parent.clone());
                parents.write_to(item, &self.parent_property);
                Ok(changed)
            }
        }
    }

    /// Removes `parent` from the parent field of `item` in place.
    pub fn remove_parent(&self, item: &mut Item, parent: &ItemId) -> StoreResult<bool> {
        match self.table.remove_parent {
            ParentEditSlot::Native => self.store.remove_parent(item, parent),
            ParentEditSlot::ParentSetCodec => {
                let mut parents = self.parent_set(item);
                let changed = parents.remove(parent);
                parents.write_to(item, &self.parent_property);
                Ok(changed)
            }
        }
    }

    /// Matches `item` against `query`.
    pub fn matches(&self, query: &Query, item: &Item) -> StoreResult<bool> {
        match self.table.query_engine {
            QueryEngineSlot::Native => self.store.matches(query, item),
            QueryEngineSlot::Builtin => Ok(query.matches(item)),
        }
    }

    /// Whether `value` is an item of this store.
    ///
    /// Without a native predicate the value's identity is looked up and the
    /// stored record compared for equality.
    pub fn is_item(&self, value: &Value) -> StoreFuture<bool> {
        match self.table.is_item {
            IsItemSlot::Native => self.store.is_item(value),
            IsItemSlot::IdentityEquality => {
                let Some(candidate) = Item::from_value(value.clone()) else {
                    return ready(Ok(false));
                };
                let Some(id) = self.identity(&candidate) else {
                    return ready(Ok(false));
                };
                self.store
                    .get(&id)
                    .map(move |stored: StoreResult<Option<Item>>| {
                        Ok(stored?.is_some_and(|stored| stored == candidate))
                    })
                    .boxed()
            }
        }
    }

    /// Registers `listener` when the store is evented. Other modes yield `None`.
    pub fn subscribe(&self, listener: StoreListener) -> StoreResult<Option<Subscription>> {
        match self.table.channel {
            ChangeChannel::Evented => self.store.subscribe(listener).map(Some),
            ChangeChannel::Observable | ChangeChannel::Unmonitored => Ok(None),
        }
    }

    fn stamp(&self, hook: WriteHook, item: &mut Item, directives: &PutDirectives) {
        match hook {
            WriteHook::Passthrough => {}
            WriteHook::StampIdentity => {
                if !directives.parents.is_empty() {
                    let mut parents = self.parent_set(item);
                    for parent in &directives.parents {
                        parents.add(parent.clone());
                    }
                    parents.write_to(item, &self.parent_property);
                }
                if self.identity(item).is_none() {
                    let id = directives.id.clone().unwrap_or_else(generate_identity);
                    tracing::trace!(target: TARGET, id = %id, "stamped identity");
                    item.set(self.id_property.clone(), id.to_value());
                }
            }
        }
    }
}

/// A fresh random identity.
pub fn generate_identity() -> ItemId {
    ItemId::Str(format!("{:016x}", rand::random::<u64>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Capability, CapabilitySet, MemoryStore};
    use futures_util::FutureExt;
    use serde_json::json;

    fn item(value: serde_json::Value) -> Item {
        Item::from_value(value).unwrap()
    }

    fn adapter(store: MemoryStore) -> StoreAdapter {
        StoreAdapter::new(Arc::new(store), "parent").unwrap()
    }

    #[test]
    fn test_put_stamps_identity_and_parents() {
        let store = MemoryStore::new();
        let adapter = adapter(store.clone());

        let directives = PutDirectives::default().with_parent(ItemId::Num(1));
        let id = adapter.put(item(json!({"name": "new"})), &directives).now_or_never().unwrap().unwrap();

        let ItemId::Str(text) = &id else { panic!("expected generated string id") };
        assert_eq!(text.len(), 16);
        let stored = store.snapshot(&id).unwrap();
        assert_eq!(stored.get("parent"), Some(&json!(1)));
    }

    #[test]
    fn test_hierarchical_store_is_passthrough() {
        let store = MemoryStore::new().hierarchical(true);
        let adapter = adapter(store);
        assert_eq!(adapter.table().put, WriteHook::Passthrough);
    }

    #[test]
    fn test_parents_resolve_by_identity() {
        let store = MemoryStore::with_items([
            item(json!({"id": 1})),
            item(json!({"id": 3, "parent": [1, 2]})),
        ]);
        let adapter = adapter(store.clone());
        let child = store.snapshot(&ItemId::Num(3)).unwrap();
        let parents = adapter.get_parents(&child).now_or_never().unwrap().unwrap();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].identity("id"), Some(ItemId::Num(1)));
    }

    #[test]
    fn test_parent_edits_through_codec() {
        let adapter = adapter(MemoryStore::new());
        let mut child = item(json!({"id": 3, "parent": [1, 2]}));
        assert!(adapter.remove_parent(&mut child, &ItemId::Num(2)).unwrap());
        assert_eq!(child.get("parent"), Some(&json!([1])));
        assert!(!adapter.add_parent(&mut child, &ItemId::Num(1)).unwrap());
    }

    #[test]
    fn test_is_item_by_identity() {
        let store = MemoryStore::with_items([item(json!({"id": 1, "name": "a"}))]);
        let adapter = adapter(store);
        let yes = adapter.is_item(&json!({"id": 1, "name": "a"})).now_or_never().unwrap();
        let no = adapter.is_item(&json!({"id": 1, "name": "b"})).now_or_never().unwrap();
        assert_eq!(yes, Ok(true));
        assert_eq!(no, Ok(false));
        assert_eq!(adapter.is_item(&json!(7)).now_or_never().unwrap(), Ok(false));
    }

    #[test]
    fn test_store_parent_property_wins() {
        let store = MemoryStore::new().with_parent_property("folder");
        let adapter = adapter(store);
        assert_eq!(adapter.parent_property(), "folder");
    }

    #[test]
    fn test_missing_put_fails_probe() {
        let store = MemoryStore::new().with_capabilities(CapabilitySet::ALL.without(Capability::Put));
        assert!(StoreAdapter::new(Arc::new(store), "parent").is_err());
    }
}
