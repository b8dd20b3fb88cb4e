//! In-memory reference store.
//!
//! [`MemoryStore`] keeps an ordered list of items and answers every call
//! synchronously. It can be switched into evented mode (push events through
//! [`subscribe`](ObjectStore::subscribe)) or observable mode (live query
//! results), and records the queries and loads it receives.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use horizon_canopy_core::{ConnectionGuard, Signal};
use parking_lot::{Mutex, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::item::{Item, ItemId};
use crate::parents::ParentSet;

use super::adapter::generate_identity;
use super::capability::{Capability, CapabilitySet};
use super::query::{
    LiveResults, LoadOptions, ObserveListener, ObservedChange, PutDirectives, Query, QueryOptions, QueryResults,
    Subscription,
};
use super::traits::{ObjectStore, StoreEvent, StoreFuture, StoreListener, ready};

const TARGET: &str = "horizon_canopy::store";

/// A write or removal, before and after.
#[derive(Debug, Clone)]
struct Mutation {
    before: Option<Item>,
    after: Option<Item>,
}

struct Inner {
    items: RwLock<Vec<Item>>,
    events: Arc<Signal<StoreEvent>>,
    mutations: Arc<Signal<Mutation>>,
    query_log: Mutex<Vec<Query>>,
    loads: AtomicUsize,
}

impl Inner {
    fn position(&self, items: &[Item], id_property: &str, id: &ItemId) -> Option<usize> {
        items.iter().position(|i| i.identity(id_property).as_ref() == Some(id))
    }

    fn run(&self, query: &Query, options: &QueryOptions) -> (Vec<Item>, usize) {
        let mut found: Vec<Item> = self.items.read().iter().filter(|i| query.matches(i)).cloned().collect();
        let total = options.apply(&mut found);
        (found, total)
    }
}

/// A synchronous, in-memory [`ObjectStore`].
///
/// Clones share the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
    capabilities: CapabilitySet,
    id_property: String,
    parent_property: Option<String>,
    hierarchical: bool,
}

impl MemoryStore {
    /// An empty store declaring `get`, `put`, `add`, `load` and a query engine.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                items: RwLock::new(Vec::new()),
                events: Arc::new(Signal::new()),
                mutations: Arc::new(Signal::new()),
                query_log: Mutex::new(Vec::new()),
                loads: AtomicUsize::new(0),
            }),
            capabilities: CapabilitySet::REQUIRED | Capability::Add | Capability::Load | Capability::QueryEngine,
            id_property: "id".to_string(),
            parent_property: None,
            hierarchical: false,
        }
    }

    /// A store pre-filled with `items`, in order.
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new();
        store.inner.items.write().extend(items);
        store
    }

    /// Replaces the declared capability set.
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Declares the evented change channel.
    pub fn evented(mut self) -> Self {
        self.capabilities |= Capability::Emit;
        self
    }

    /// Declares live, observable query results.
    pub fn observable(mut self) -> Self {
        self.capabilities |= Capability::Notify;
        self
    }

    /// Makes the store stamp identities and parents on writes itself.
    pub fn hierarchical(mut self, hierarchical: bool) -> Self {
        self.hierarchical = hierarchical;
        self
    }

    pub fn with_id_property(mut self, id_property: impl Into<String>) -> Self {
        self.id_property = id_property.into();
        self
    }

    /// Dictates the parent property to the model.
    pub fn with_parent_property(mut self, parent_property: impl Into<String>) -> Self {
        self.parent_property = Some(parent_property.into());
        self
    }

    /// A copy of the stored item.
    pub fn snapshot(&self, id: &ItemId) -> Option<Item> {
        let items = self.inner.items.read();
        self.inner
            .position(&items, &self.id_property, id)
            .map(|pos| items[pos].clone())
    }

    /// Copies of all stored items, in order.
    pub fn items(&self) -> Vec<Item> {
        self.inner.items.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes `item` synchronously. Same semantics as `put`.
    pub fn insert(&self, item: Item) -> StoreResult<ItemId> {
        self.write(item, &PutDirectives::default(), false)
    }

    /// Removes an item and notifies listeners.
    pub fn remove(&self, id: &ItemId) -> Option<Item> {
        let removed = {
            let mut items = self.inner.items.write();
            let pos = self.inner.position(&items, &self.id_property, id)?;
            items.remove(pos)
        };
        tracing::trace!(target: TARGET, id = %id, "memory store removed item");
        self.notify(StoreEvent::Delete(removed.clone()), Some(removed.clone()), None);
        Some(removed)
    }

    /// Emits an event to subscribers without touching the data.
    pub fn publish(&self, event: StoreEvent) {
        self.inner.events.emit(event);
    }

    /// Every query received through [`ObjectStore::query`], in order.
    pub fn query_log(&self) -> Vec<Query> {
        self.inner.query_log.lock().clone()
    }

    /// How many times `load` was called.
    pub fn load_count(&self) -> usize {
        self.inner.loads.load(Ordering::SeqCst)
    }

    /// Number of listeners currently attached through `subscribe`.
    pub fn subscriber_count(&self) -> usize {
        self.inner.events.connection_count()
    }

    fn write(&self, mut item: Item, directives: &PutDirectives, add_only: bool) -> StoreResult<ItemId> {
        if self.hierarchical {
            if !directives.parents.is_empty() {
                let parent_property = self.parent_property.as_deref().unwrap_or("parent");
                let mut parents = ParentSet::from_item(&item, parent_property);
                for parent in &directives.parents {
                    parents.add(parent.clone());
                }
                parents.write_to(&mut item, parent_property);
            }
            if item.identity(&self.id_property).is_none() {
                let id = directives.id.clone().unwrap_or_else(generate_identity);
                item.set(self.id_property.clone(), id.to_value());
            }
        }
        let id = item.identity(&self.id_property).ok_or(StoreError::MissingIdentity)?;

        let before = {
            let mut items = self.inner.items.write();
            let existing = self.inner.position(&items, &self.id_property, &id);
            if add_only && existing.is_some() {
                return Err(StoreError::backend(format!("item {id} already exists")));
            }
            let before = existing.map(|pos| items.remove(pos));
            let anchor = directives
                .before
                .as_ref()
                .and_then(|sibling| self.inner.position(&items, &self.id_property, sibling));
            match (anchor, existing) {
                (Some(pos), _) => items.insert(pos, item.clone()),
                (None, Some(pos)) => items.insert(pos, item.clone()),
                (None, None) => items.push(item.clone()),
            }
            before
        };

        tracing::trace!(target: TARGET, id = %id, replaced = before.is_some(), "memory store wrote item");
        let event = if before.is_some() {
            StoreEvent::Change(item.clone())
        } else {
            StoreEvent::New(item.clone())
        };
        self.notify(event, before, Some(item));
        Ok(id)
    }

    fn notify(&self, event: StoreEvent, before: Option<Item>, after: Option<Item>) {
        if self.capabilities.has(Capability::Emit) {
            self.inner.events.emit(event);
        }
        if self.capabilities.has(Capability::Notify) {
            self.inner.mutations.emit(Mutation { before, after });
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryStore {
    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn id_property(&self) -> &str {
        &self.id_property
    }

    fn parent_property(&self) -> Option<&str> {
        self.parent_property.as_deref()
    }

    fn is_hierarchical(&self) -> bool {
        self.hierarchical
    }

    fn query(&self, query: &Query, options: &QueryOptions) -> StoreFuture<QueryResults> {
        self.inner.query_log.lock().push(query.clone());
        let (items, total) = self.inner.run(query, options);
        let mut results = QueryResults::new(items.clone()).with_total(total);
        if self.capabilities.has(Capability::Notify) {
            let live = LiveQuery::new(&self.inner, query.clone(), options.clone(), self.id_property.clone(), items);
            results = results.with_live(live);
        }
        ready(Ok(results))
    }

    fn get(&self, id: &ItemId) -> StoreFuture<Option<Item>> {
        ready(Ok(self.snapshot(id)))
    }

    fn put(&self, item: Item, directives: &PutDirectives) -> StoreFuture<ItemId> {
        ready(self.write(item, directives, false))
    }

    fn add(&self, item: Item, directives: &PutDirectives) -> StoreFuture<ItemId> {
        ready(self.write(item, directives, true))
    }

    fn load(&self, _options: &LoadOptions) -> StoreFuture<()> {
        self.inner.loads.fetch_add(1, Ordering::SeqCst);
        ready(Ok(()))
    }

    fn matches(&self, query: &Query, item: &Item) -> StoreResult<bool> {
        Ok(query.matches(item))
    }

    fn subscribe(&self, listener: StoreListener) -> StoreResult<Subscription> {
        let guard = self.inner.events.connect_scoped(move |event| listener(event));
        Ok(Subscription::new(guard))
    }
}

/// A query result that re-runs its query on every store mutation.
struct LiveQuery {
    store: Weak<Inner>,
    query: Query,
    options: QueryOptions,
    id_property: String,
    current: Mutex<Vec<Item>>,
    changes: Arc<Signal<ObservedChange>>,
    watch: Mutex<Option<ConnectionGuard<Mutation>>>,
}

impl LiveQuery {
    fn new(
        store: &Arc<Inner>,
        query: Query,
        options: QueryOptions,
        id_property: String,
        items: Vec<Item>,
    ) -> Arc<Self> {
        let live = Arc::new(Self {
            store: Arc::downgrade(store),
            query,
            options,
            id_property,
            current: Mutex::new(items),
            changes: Arc::new(Signal::new()),
            watch: Mutex::new(None),
        });
        let weak = Arc::downgrade(&live);
        let guard = store.mutations.connect_scoped(move |mutation| {
            if let Some(live) = weak.upgrade() {
                live.on_mutation(mutation);
            }
        });
        *live.watch.lock() = Some(guard);
        live
    }

    fn on_mutation(&self, mutation: &Mutation) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        let Some(item) = mutation.after.as_ref().or(mutation.before.as_ref()) else {
            return;
        };
        let Some(id) = item.identity(&self.id_property) else {
            return;
        };

        let (fresh, _) = store.run(&self.query, &self.options);
        let (removed_from, inserted_into) = {
            let mut current = self.current.lock();
            let removed_from = store.position(&current, &self.id_property, &id);
            let inserted_into = store.position(&fresh, &self.id_property, &id);
            *current = fresh;
            (removed_from, inserted_into)
        };

        let untouched = removed_from.is_none() && inserted_into.is_none();
        let unchanged = removed_from.is_some() && removed_from == inserted_into && mutation.before == mutation.after;
        if untouched || unchanged {
            return;
        }
        self.changes.emit(ObservedChange {
            item: item.clone(),
            removed_from,
            inserted_into,
        });
    }
}

impl LiveResults for LiveQuery {
    fn observe(&self, listener: ObserveListener, include_updates: bool) -> Subscription {
        let guard = self.changes.connect_scoped(move |change: &ObservedChange| {
            if !include_updates && change.removed_from == change.inserted_into {
                return;
            }
            listener(change);
        });
        Subscription::new(guard)
    }

    fn current(&self) -> Vec<Item> {
        self.current.lock().clone()
    }
}
