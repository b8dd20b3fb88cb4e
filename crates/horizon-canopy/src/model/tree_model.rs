//! Store-backed tree model.
//!
//! `StoreTreeModel` turns a flat, query-based [`ObjectStore`] into a lazily
//! materialized tree. Children are fetched on demand and cached per parent;
//! store notifications evict the affected entries and are announced through
//! [`ModelSignals`].
//!
//! # Example
//!
//! ```
//! use horizon_canopy::{Item, ModelBuilder, ModelConfig};
//! use horizon_canopy::store::MemoryStore;
//! use serde_json::{json, Value};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = MemoryStore::with_items([
//!     Item::from_value(json!({"id": 1, "name": "Simpsons", "parent": null})).unwrap(),
//!     Item::from_value(json!({"id": 2, "name": "Homer", "parent": 1})).unwrap(),
//! ]);
//! let model = ModelBuilder::new()
//!     .store(store)
//!     .config(ModelConfig::new().with_query_field("parent", Value::Null))
//!     .build()
//!     .unwrap();
//!
//! let root = model.get_root().await.unwrap();
//! let children = model.get_children(&root).await.unwrap();
//! assert_eq!(model.get_label(&children[0]).as_deref(), Some("Homer"));
//! # });
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use horizon_canopy_core::{ConnectionId, DeferredQueue};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::ModelConfig;
use crate::error::{ConstructionError, ModelError, ModelResult};
use crate::item::{Item, ItemId};
use crate::parents::ParentSet;
use crate::store::{
    ChangeChannel, LoadOptions, ObjectStore, ObservedChange, PutDirectives, Query, QueryOptions, QueryResults,
    StoreAdapter, StoreEvent, Subscription,
};

use super::children::{ChildrenCache, LookupState};
use super::events::{ChildrenChange, ItemChange, ModelEvent, ModelSignals, RootAction, RootChange};
use super::root::{RootPhase, RootResolver};
use super::router::{Bridge, Notification};
use super::shape::{RootPolicy, SingleRoot, TreeShape};
use super::snapshot::ObjectCache;

const TARGET: &str = "horizon_canopy::model";

/// Builder for [`StoreTreeModel`].
#[derive(Default)]
pub struct ModelBuilder {
    store: Option<Arc<dyn ObjectStore>>,
    config: ModelConfig,
    shape: Option<Arc<dyn TreeShape>>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backing store. Required.
    pub fn store(mut self, store: impl ObjectStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Sets a backing store that is shared with other owners.
    pub fn shared_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the tree shape. Defaults to [`SingleRoot`].
    pub fn shape(mut self, shape: impl TreeShape + 'static) -> Self {
        self.shape = Some(Arc::new(shape));
        self
    }

    /// Probes the store and builds the model.
    ///
    /// Fails without side effects if no store was given or the store lacks
    /// `get` or `put`.
    pub fn build(self) -> ModelResult<Arc<StoreTreeModel>> {
        let store = self.store.ok_or(ConstructionError::MissingStore)?;
        let adapter = StoreAdapter::new(store, &self.config.parent_property)?;
        let shape = self.shape.unwrap_or_else(|| Arc::new(SingleRoot));

        let (root, root_query, forest) = match shape.root_policy(&adapter, &self.config) {
            RootPolicy::Query(query) => (RootResolver::new(), query, None),
            RootPolicy::Forest { root, children } => (
                RootResolver::fabricated(root),
                self.config.query.clone(),
                Some(RwLock::new(children)),
            ),
        };

        let queue = Arc::new(DeferredQueue::new());
        let wake = Arc::new(Notify::new());
        let bridge = Bridge::new(queue.clone(), wake.clone());

        let listener = bridge.clone();
        let store_subscription = adapter.subscribe(Arc::new(move |event: &StoreEvent| {
            listener.post(Notification::from_store_event(event));
        }))?;

        tracing::debug!(
            target: TARGET,
            channel = ?adapter.channel(),
            forest = forest.is_some(),
            "tree model constructed"
        );

        Ok(Arc::new(StoreTreeModel {
            adapter,
            config: self.config,
            shape,
            objects: ObjectCache::new(),
            children: ChildrenCache::new(),
            root,
            root_query,
            forest_children: forest,
            signals: ModelSignals::new(),
            queue,
            wake,
            bridge,
            gate: tokio::sync::Mutex::new(()),
            store_subscription: Mutex::new(store_subscription),
            destroyed: AtomicBool::new(false),
        }))
    }
}

/// A tree model over a backing object store.
pub struct StoreTreeModel {
    adapter: StoreAdapter,
    config: ModelConfig,
    shape: Arc<dyn TreeShape>,
    objects: ObjectCache,
    children: ChildrenCache,
    root: RootResolver,
    root_query: Query,
    /// Children of the fabricated root, in forest mode.
    forest_children: Option<RwLock<Option<Vec<Item>>>>,
    signals: ModelSignals,
    queue: Arc<DeferredQueue<Notification>>,
    wake: Arc<Notify>,
    bridge: Bridge,
    gate: tokio::sync::Mutex<()>,
    store_subscription: Mutex<Option<Subscription>>,
    destroyed: AtomicBool,
}

impl StoreTreeModel {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::new()
    }

    // =========================================================================
    // Tree traversal
    // =========================================================================

    /// Resolves the root, loading the store first if no load was requested.
    ///
    /// The first successful resolution is cached; later calls neither load
    /// nor query again.
    pub async fn get_root(&self) -> ModelResult<Item> {
        self.ensure_alive()?;
        let observe = |results: &QueryResults| self.observe_root(results);
        self.root
            .resolve(
                &self.adapter,
                &self.root_query,
                &QueryOptions::default(),
                &self.config.load_options,
                observe,
            )
            .await
    }

    /// Returns the children of `parent`, from the cache when possible.
    pub async fn get_children(&self, parent: &Item) -> ModelResult<Vec<Item>> {
        self.ensure_alive()?;
        if self.is_forest_root(parent) {
            return self.forest_root_children().await;
        }
        let id = self.get_identity(parent).ok_or(ModelError::MissingIdentity)?;

        let lookup = self.children.resolve_with(&id, || {
            self.shape
                .fetch_children(&self.adapter, parent, &self.config.query_options)
        })?;
        self.objects.insert_if_absent(id.clone(), parent);

        match lookup.state {
            LookupState::Ready(results) => Ok(results.items()),
            LookupState::Pending(fetch) => match fetch.await {
                Ok(results) => {
                    let stored = self.children.materialize(&id, lookup.generation, results.clone(), |results| {
                        self.observe_children(parent, results)
                    });
                    let items = results.items();
                    if stored {
                        for child in &items {
                            if let Some(child_id) = self.get_identity(child) {
                                self.objects.replace(child_id, child.clone());
                            }
                        }
                    }
                    Ok(items)
                }
                Err(err) => {
                    self.children.fail(&id, lookup.generation);
                    Err(err.into())
                }
            },
        }
    }

    /// Returns the parents of `item`.
    ///
    /// Parents that cannot be found are left out. In forest mode an item
    /// without parents reports the fabricated root.
    pub async fn get_parents(&self, item: &Item) -> ModelResult<Vec<Item>> {
        self.ensure_alive()?;
        if self.is_forest_root(item) {
            return Ok(Vec::new());
        }
        let parents = self.adapter.get_parents(item).await?;
        if parents.is_empty() && self.is_forest() {
            return Ok(self.root.get().cloned().into_iter().collect());
        }
        Ok(parents)
    }

    /// Whether `item` has, or may have, children.
    ///
    /// Answered from a materialized cache entry when there is one.
    pub fn may_have_children(&self, item: &Item) -> bool {
        if self.is_forest_root(item) {
            return true;
        }
        if let Some(count) = self.get_identity(item).and_then(|id| self.children.materialized_len(&id)) {
            return count > 0;
        }
        self.adapter.has_children(item)
    }

    /// Whether `item` is a child of `parent`.
    pub fn is_child_of(&self, parent: &Item, item: &Item) -> bool {
        if self.is_forest_root(parent) {
            let id = self.get_identity(item);
            let listed = self
                .forest_children
                .as_ref()
                .and_then(|children| children.read().clone())
                .is_some_and(|children| children.iter().any(|c| self.get_identity(c) == id));
            return listed || self.adapter.matches(&self.root_query, item).unwrap_or(false);
        }
        match self.get_identity(parent) {
            Some(parent_id) => self.adapter.parent_set(item).contains(&parent_id),
            None => false,
        }
    }

    // =========================================================================
    // Inspecting items
    // =========================================================================

    /// The label of `item`. The root reports the configured root label.
    pub fn get_label(&self, item: &Item) -> Option<String> {
        if let Some(label) = &self.config.root_label
            && self.is_root(item)
        {
            return Some(label.clone());
        }
        item.get(&self.config.label_attr).map(value_text)
    }

    /// The icon of `item`, when an icon attribute is configured.
    pub fn get_icon(&self, item: &Item) -> Option<String> {
        let attr = self.config.icon_attr.as_deref()?;
        item.get(attr).map(value_text)
    }

    pub fn get_identity(&self, item: &Item) -> Option<ItemId> {
        self.adapter.identity(item)
    }

    /// Whether `value` is an item of the store, or the fabricated root.
    pub async fn is_item(&self, value: &Value) -> ModelResult<bool> {
        if let Some(root) = self.forest_root()
            && Item::from_value(value.clone()).as_ref() == Some(root)
        {
            return Ok(true);
        }
        Ok(self.adapter.is_item(value).await?)
    }

    /// Looks up an item by identity. The fabricated root is found too.
    pub async fn fetch_item_by_identity(&self, id: &ItemId) -> ModelResult<Option<Item>> {
        self.ensure_alive()?;
        if let Some(root) = self.forest_root()
            && self.get_identity(root).as_ref() == Some(id)
        {
            return Ok(Some(root.clone()));
        }
        Ok(self.adapter.get(id).await?)
    }

    /// Loads the store once. [`get_root`](Self::get_root) skips its own load
    /// when this was called first.
    pub async fn load_store(&self, options: &LoadOptions) -> ModelResult<()> {
        self.ensure_alive()?;
        self.root.load(&self.adapter, options).await
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Drops `args` onto `parent`.
    ///
    /// An item that already exists in the store is re-parented: in a
    /// multi-parent store (the parent's own parent field is a collection)
    /// `parent` is added to its parents, otherwise it is moved from its
    /// first parent. Anything else is written as a new child of `parent`.
    pub async fn new_item(&self, args: Item, parent: &Item, before: Option<&Item>) -> ModelResult<Option<Item>> {
        self.ensure_alive()?;
        let parent_property = self.adapter.parent_property().to_string();
        let multi_parent = matches!(parent.get(&parent_property), Some(Value::Array(_)));
        let target = if self.is_forest_root(parent) {
            None
        } else {
            Some(self.get_identity(parent).ok_or(ModelError::MissingIdentity)?)
        };

        if let Some(id) = self.get_identity(&args)
            && let Some(mut existing) = self.adapter.get(&id).await?
        {
            if multi_parent {
                if let Some(parent_id) = &target {
                    self.adapter.add_parent(&mut existing, parent_id)?;
                }
                self.adapter.put(existing, &PutDirectives::overwrite()).await?;
                self.settle_local_write(vec![parent.clone()]).await;
            } else {
                let old_parents = self.get_parents(&existing).await?;
                self.paste_item(&existing, old_parents.first(), parent, false, before)
                    .await?;
            }
            return Ok(self.adapter.get(&id).await?);
        }

        let mut item = args;
        if multi_parent && let Some(parent_id) = &target {
            let mut parents = ParentSet::from_item(&item, &parent_property);
            parents.set_multiple(true);
            parents.add(parent_id.clone());
            parents.write_to(&mut item, &parent_property);
        }
        let directives = PutDirectives {
            parents: target.into_iter().collect(),
            before: before.and_then(|b| self.get_identity(b)),
            ..PutDirectives::default()
        };
        let id = self.adapter.put(item, &directives).await?;
        let created = self.adapter.get(&id).await?;
        tracing::debug!(target: TARGET, id = %id, "new item written");

        if self.is_monitored() {
            self.settle_local_write(vec![parent.clone()]).await;
        } else if let Some(created) = &created {
            self.route(Notification::Added(created.clone())).await;
        }
        Ok(created)
    }

    /// Moves or copies `child` from `old_parent` to `new_parent`.
    ///
    /// Moving removes `old_parent` from the child's parents; copying keeps
    /// it. Both parents' children are invalidated.
    pub async fn paste_item(
        &self,
        child: &Item,
        old_parent: Option<&Item>,
        new_parent: &Item,
        copy: bool,
        before: Option<&Item>,
    ) -> ModelResult<()> {
        self.ensure_alive()?;
        let new_id = self.get_identity(new_parent).ok_or(ModelError::MissingIdentity)?;
        let old_id = old_parent.and_then(|p| self.get_identity(p));

        let mut updated = child.clone();
        let mut affected = vec![new_parent.clone()];
        let mut root_action = None;

        if old_id.as_ref() != Some(&new_id) {
            let to_root = self.is_root(new_parent);
            let from_root = old_parent.is_some_and(|p| self.is_root(p));
            if !copy && let Some(old_parent) = old_parent {
                affected.push(old_parent.clone());
                if let Some(old_id) = &old_id {
                    self.adapter.remove_parent(&mut updated, old_id)?;
                }
            }
            if to_root || from_root {
                root_action = Some(if to_root { RootAction::Attach } else { RootAction::Detach });
            }
            if !(to_root && self.is_forest()) {
                self.adapter.add_parent(&mut updated, &new_id)?;
            }
        }

        let directives = PutDirectives {
            before: before.and_then(|b| self.get_identity(b)),
            overwrite: true,
            ..PutDirectives::default()
        };
        self.adapter.put(updated.clone(), &directives).await?;
        tracing::debug!(target: TARGET, to = %new_id, copy, "item pasted");

        if let Some(action) = root_action {
            self.emit_root_change(updated, action);
        }
        self.settle_local_write(affected).await;
        Ok(())
    }

    /// Writes one field of `item` through the store. Writing the value the
    /// field already holds does nothing.
    pub async fn set_value(&self, item: &Item, property: &str, value: impl Into<Value>) -> ModelResult<()> {
        self.ensure_alive()?;
        let value = value.into();
        if item.get(property) == Some(&value) {
            return Ok(());
        }
        let mut updated = item.clone();
        let old_value = updated.set(property, value);

        if self.is_forest_root(item) {
            self.signals.emit(ModelEvent::Change(ItemChange {
                item: updated.clone(),
                property: property.to_string(),
                old_value,
                new_value: updated.get(property).cloned(),
            }));
            return Ok(());
        }

        self.adapter.put(updated.clone(), &PutDirectives::overwrite()).await?;
        if !self.is_monitored() {
            self.route(Notification::Changed {
                item: updated,
                previous: Some(item.clone()),
            })
            .await;
        }
        Ok(())
    }

    /// Evicts and re-fetches the children of `parent`, announcing the result.
    pub async fn invalidate_children(&self, parent: &Item) -> ModelResult<()> {
        self.ensure_alive()?;
        self.children_changed(vec![parent.clone()]).await;
        Ok(())
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Routes every queued store notification, in order. Returns how many ran.
    ///
    /// Calls are serialized; a second caller waits for the first to finish.
    #[tracing::instrument(skip_all, target = "horizon_canopy::model", level = "trace")]
    pub async fn process_events(&self) -> usize {
        let _gate = self.gate.lock().await;
        let mut routed = 0;
        loop {
            let batch = self.queue.take_batch();
            if batch.is_empty() {
                break;
            }
            for notification in batch {
                if self.is_destroyed() {
                    return routed;
                }
                self.route(notification).await;
                routed += 1;
            }
        }
        routed
    }

    /// Spawns a task that routes notifications as they arrive, until the
    /// model is destroyed or dropped.
    pub fn spawn_event_pump(self: &Arc<Self>) -> JoinHandle<()> {
        let model = Arc::downgrade(self);
        let wake = self.wake.clone();
        tokio::spawn(async move {
            loop {
                wake.notified().await;
                let Some(model) = model.upgrade() else {
                    break;
                };
                if model.is_destroyed() {
                    break;
                }
                model.process_events().await;
            }
            tracing::debug!(target: TARGET, "event pump stopped");
        })
    }

    /// Number of store notifications waiting to be routed.
    pub fn pending_events(&self) -> usize {
        self.queue.pending_count()
    }

    pub fn signals(&self) -> &ModelSignals {
        &self.signals
    }

    pub fn on_change<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&ItemChange) + Send + Sync + 'static,
    {
        self.signals.on_change(slot)
    }

    pub fn on_children_change<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&ChildrenChange) + Send + Sync + 'static,
    {
        self.signals.on_children_change(slot)
    }

    pub fn on_delete<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Item) + Send + Sync + 'static,
    {
        self.signals.on_delete(slot)
    }

    pub fn on_root_change<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&RootChange) + Send + Sync + 'static,
    {
        self.signals.on_root_change(slot)
    }

    // =========================================================================
    // Lifecycle and inspection
    // =========================================================================

    /// Releases every cache and subscription. Later calls fail with
    /// [`ModelError::Destroyed`].
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let dropped = self.queue.close();
        let subscription = self.store_subscription.lock().take();
        drop(subscription);
        self.children.clear();
        self.objects.clear();
        self.root.clear();
        self.signals.disconnect_all();
        self.wake.notify_one();
        tracing::debug!(target: TARGET, dropped, "tree model destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn adapter(&self) -> &StoreAdapter {
        &self.adapter
    }

    /// Where root resolution stands.
    pub fn root_phase(&self) -> RootPhase {
        self.root.phase()
    }

    /// A copy of the last-observed state of an item.
    pub fn snapshot(&self, id: &ItemId) -> Option<Item> {
        self.objects.get(id)
    }

    /// Generation of the children cache entry for `parent`, if one exists.
    pub fn children_generation(&self, parent: &ItemId) -> Option<u64> {
        self.children.generation(parent)
    }

    // =========================================================================
    // Internals shared with the router
    // =========================================================================

    pub(crate) fn objects(&self) -> &ObjectCache {
        &self.objects
    }

    pub(crate) fn children(&self) -> &ChildrenCache {
        &self.children
    }

    pub(crate) fn root_query(&self) -> &Query {
        &self.root_query
    }

    pub(crate) fn is_forest(&self) -> bool {
        self.forest_children.is_some()
    }

    fn forest_root(&self) -> Option<&Item> {
        if self.is_forest() { self.root.get() } else { None }
    }

    pub(crate) fn is_forest_root(&self, item: &Item) -> bool {
        self.is_forest() && self.is_root(item)
    }

    fn is_root(&self, item: &Item) -> bool {
        match (self.root.get(), self.get_identity(item)) {
            (Some(root), Some(id)) => self.get_identity(root) == Some(id),
            _ => false,
        }
    }

    /// Whether `item` sits directly under the resolved root.
    pub(crate) fn is_child_of_root(&self, item: &Item) -> bool {
        match self.root.get() {
            Some(root) => self.is_child_of(root, item),
            None => false,
        }
    }

    fn is_monitored(&self) -> bool {
        self.adapter.channel().is_monitored()
    }

    fn ensure_alive(&self) -> ModelResult<()> {
        if self.is_destroyed() {
            return Err(ModelError::Destroyed);
        }
        Ok(())
    }

    /// After a local write: a monitored store echoes the change itself, so
    /// only evict; otherwise announce the new children here.
    async fn settle_local_write(&self, parents: Vec<Item>) {
        if self.is_monitored() {
            for parent in &parents {
                if let Some(id) = self.get_identity(parent) {
                    self.children.evict(&id);
                }
            }
        } else {
            self.children_changed(parents).await;
        }
    }

    async fn forest_root_children(&self) -> ModelResult<Vec<Item>> {
        if let Some(children) = self.forest_children.as_ref().and_then(|c| c.read().clone()) {
            return Ok(children);
        }
        let children = self.query_root_children().await?;
        if let Some(slot) = &self.forest_children {
            *slot.write() = Some(children.clone());
        }
        Ok(children)
    }

    async fn query_root_children(&self) -> ModelResult<Vec<Item>> {
        let results = self
            .adapter
            .query(&self.root_query, &self.config.query_options)
            .await?;
        let items = results.items();
        for child in &items {
            if let Some(id) = self.get_identity(child) {
                self.objects.replace(id, child.clone());
            }
        }
        Ok(items)
    }

    /// Re-runs the root query in forest mode, announcing the root's children
    /// if their membership or order changed.
    pub(crate) async fn requery_root(&self) -> ModelResult<()> {
        let (Some(slot), Some(root)) = (&self.forest_children, self.forest_root()) else {
            return Ok(());
        };
        let fresh = self.query_root_children().await?;
        let old = slot.write().replace(fresh.clone()).unwrap_or_default();

        let ids = |items: &[Item]| items.iter().map(|i| self.get_identity(i)).collect::<Vec<_>>();
        if ids(&old) != ids(&fresh) {
            tracing::debug!(target: TARGET, count = fresh.len(), "root children changed");
            self.signals.emit(ModelEvent::ChildrenChange(ChildrenChange {
                parent: root.clone(),
                children: fresh,
            }));
        }
        Ok(())
    }

    fn observe_children(&self, parent: &Item, results: &QueryResults) -> Option<Subscription> {
        if self.adapter.channel() != ChangeChannel::Observable {
            return None;
        }
        let live = results.live()?;
        let bridge = self.bridge.clone();
        let parent = parent.clone();
        Some(live.observe(
            Arc::new(move |change: &ObservedChange| {
                bridge.post(Notification::from_observed(&parent, change));
            }),
            true,
        ))
    }

    fn observe_root(&self, results: &QueryResults) -> Option<Subscription> {
        if self.adapter.channel() != ChangeChannel::Observable {
            return None;
        }
        let live = results.live()?;
        let bridge = self.bridge.clone();
        Some(live.observe(
            Arc::new(move |change: &ObservedChange| {
                if change.removed_from.is_some() && change.removed_from == change.inserted_into {
                    bridge.post(Notification::Changed {
                        item: change.item.clone(),
                        previous: None,
                    });
                }
            }),
            true,
        ))
    }
}

impl Drop for StoreTreeModel {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::shape::Forest;
    use crate::store::{Capability, CapabilitySet, MemoryStore};
    use serde_json::json;

    fn item(value: Value) -> Item {
        Item::from_value(value).unwrap()
    }

    fn simpsons() -> MemoryStore {
        MemoryStore::with_items([
            item(json!({"id": 1, "name": "Simpsons", "parent": null, "icon": "house"})),
            item(json!({"id": 2, "name": "Homer", "parent": 1})),
            item(json!({"id": 3, "name": "Bart", "parent": 2})),
        ])
    }

    fn single_root(store: &MemoryStore) -> Arc<StoreTreeModel> {
        ModelBuilder::new()
            .store(store.clone())
            .config(
                ModelConfig::new()
                    .with_query_field("parent", Value::Null)
                    .with_icon_attr("icon"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_missing_store() {
        let err = ModelBuilder::new().build().err().unwrap();
        assert_eq!(err, ModelError::Construction(ConstructionError::MissingStore));
    }

    #[test]
    fn test_missing_get_is_fatal() {
        let store = MemoryStore::new().with_capabilities(CapabilitySet::NONE | Capability::Put);
        let err = ModelBuilder::new().store(store).build().err().unwrap();
        assert_eq!(
            err,
            ModelError::Construction(ConstructionError::MissingCapability(Capability::Get))
        );
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_labels_and_icons() {
        let store = simpsons();
        let model = single_root(&store);
        let root = model.get_root().await.unwrap();
        assert_eq!(model.get_label(&root).as_deref(), Some("Simpsons"));
        assert_eq!(model.get_icon(&root).as_deref(), Some("house"));
        assert_eq!(model.get_identity(&root), Some(ItemId::Num(1)));

        let labelled = ModelBuilder::new()
            .store(store)
            .config(ModelConfig::new().with_query_field("parent", Value::Null).with_root_label("Family"))
            .build()
            .unwrap();
        let root = labelled.get_root().await.unwrap();
        assert_eq!(labelled.get_label(&root).as_deref(), Some("Family"));
    }

    #[tokio::test]
    async fn test_may_have_children_uses_cache() {
        let store = simpsons();
        let model = single_root(&store);
        let bart = store.snapshot(&ItemId::Num(3)).unwrap();

        assert!(model.may_have_children(&bart));
        assert!(model.get_children(&bart).await.unwrap().is_empty());
        assert!(!model.may_have_children(&bart));
    }

    #[tokio::test]
    async fn test_get_children_snapshots_children() {
        let store = simpsons();
        let model = single_root(&store);
        let root = model.get_root().await.unwrap();
        model.get_children(&root).await.unwrap();
        assert_eq!(model.snapshot(&ItemId::Num(2)), store.snapshot(&ItemId::Num(2)));
        assert_eq!(model.snapshot(&ItemId::Num(1)), Some(root));
    }

    #[tokio::test]
    async fn test_is_child_of() {
        let store = simpsons();
        let model = single_root(&store);
        let homer = store.snapshot(&ItemId::Num(2)).unwrap();
        let bart = store.snapshot(&ItemId::Num(3)).unwrap();
        assert!(model.is_child_of(&homer, &bart));
        assert!(!model.is_child_of(&bart, &homer));
    }

    #[tokio::test]
    async fn test_fetch_item_by_identity_in_forest() {
        let store = simpsons();
        let model = ModelBuilder::new()
            .store(store)
            .shape(Forest::new())
            .config(ModelConfig::new().with_query_field("parent", Value::Null))
            .build()
            .unwrap();

        let root = model.fetch_item_by_identity(&ItemId::from("$root$")).await.unwrap().unwrap();
        assert_eq!(root.get("root"), Some(&json!(true)));
        assert_eq!(model.get_label(&root).as_deref(), Some("ROOT"));
        assert!(model.is_item(&root.clone().into_value()).await.unwrap());

        let homer = model.fetch_item_by_identity(&ItemId::Num(2)).await.unwrap();
        assert!(homer.is_some());
    }

    #[tokio::test]
    async fn test_destroyed_model_rejects_calls() {
        let store = simpsons().evented();
        let model = single_root(&store);
        model.destroy();
        assert_eq!(model.get_root().await.unwrap_err(), ModelError::Destroyed);
        assert_eq!(store.subscriber_count(), 0);
    }
}
