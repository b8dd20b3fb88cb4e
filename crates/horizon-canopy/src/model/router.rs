//! Change routing.
//!
//! Store callbacks never run model logic themselves. They post a
//! [`Notification`] through a [`Bridge`]; the model drains the queue later
//! (see [`StoreTreeModel::process_events`]) and routes each notification to
//! completion before taking the next one. Cache updates for an item always
//! happen before the public callbacks about that item fire.

use std::sync::Arc;

use horizon_canopy_core::DeferredQueue;
use serde_json::Value;
use tokio::sync::Notify;

use crate::error::{ModelError, ModelResult};
use crate::item::{Item, ItemId};
use crate::parents::ParentSet;
use crate::store::{ObservedChange, StoreEvent};

use super::events::{ChildrenChange, ItemChange, ModelEvent, RootAction, RootChange};
use super::tree_model::StoreTreeModel;

const TARGET: &str = "horizon_canopy::router";

/// A store-side change waiting to be routed.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// An item was updated. `previous`, when known, is diffed instead of the snapshot.
    Changed { item: Item, previous: Option<Item> },
    /// An item was deleted, or possibly moved. `from` is the parent whose
    /// live children reported the removal.
    Deleted { item: Item, from: Option<Item> },
    /// An item was added.
    Added(Item),
    /// The order of a parent's children changed.
    Reordered { parent: Item },
}

impl Notification {
    /// Translates an evented-store event.
    pub fn from_store_event(event: &StoreEvent) -> Self {
        match event {
            StoreEvent::Change(item) => Notification::Changed {
                item: item.clone(),
                previous: None,
            },
            StoreEvent::Delete(item) => Notification::Deleted {
                item: item.clone(),
                from: None,
            },
            StoreEvent::New(item) => Notification::Added(item.clone()),
        }
    }

    /// Translates a position change in the live children of `parent`.
    pub fn from_observed(parent: &Item, change: &ObservedChange) -> Self {
        match (change.removed_from, change.inserted_into) {
            (_, None) => Notification::Deleted {
                item: change.item.clone(),
                from: Some(parent.clone()),
            },
            (None, _) => Notification::Added(change.item.clone()),
            (from, into) if from == into => Notification::Changed {
                item: change.item.clone(),
                previous: None,
            },
            _ => Notification::Reordered { parent: parent.clone() },
        }
    }
}

/// Posting side of a model's notification queue.
#[derive(Clone)]
pub struct Bridge {
    queue: Arc<DeferredQueue<Notification>>,
    wake: Arc<Notify>,
}

impl Bridge {
    pub(crate) fn new(queue: Arc<DeferredQueue<Notification>>, wake: Arc<Notify>) -> Self {
        Self { queue, wake }
    }

    /// Queues `notification` and wakes the event pump.
    pub fn post(&self, notification: Notification) {
        if self.queue.post(notification).is_some() {
            self.wake.notify_one();
        }
    }
}

impl StoreTreeModel {
    /// Routes one notification. Failures are logged and the notification dropped.
    #[tracing::instrument(skip_all, target = "horizon_canopy::router", level = "trace")]
    pub(crate) async fn route(&self, notification: Notification) {
        let result = match notification {
            Notification::Changed { item, previous } => self.route_change(item, previous).await,
            Notification::Deleted { item, from } => self.route_delete(item, from).await,
            Notification::Added(item) => self.route_new(item).await,
            Notification::Reordered { parent } => self.route_reorder(parent).await,
        };
        if let Err(err) = result {
            tracing::warn!(target: TARGET, error = %err, "dropped store notification");
        }
    }

    async fn route_change(&self, item: Item, previous: Option<Item>) -> ModelResult<()> {
        let id = self.identity_of(&item)?;
        let old = previous.or_else(|| self.objects().get(&id));
        self.objects().replace(id.clone(), item.clone());

        let Some(old) = old else {
            tracing::trace!(target: TARGET, id = %id, "no snapshot to diff against");
            return Ok(());
        };

        let mut changes = Vec::new();
        for (property, old_value) in old.fields() {
            match item.get(property) {
                Some(new_value) if new_value == old_value => {}
                new_value => changes.push((property.clone(), Some(old_value.clone()), new_value.cloned())),
            }
        }
        for (property, new_value) in item.fields() {
            if !old.contains(property) {
                changes.push((property.clone(), None, Some(new_value.clone())));
            }
        }
        tracing::debug!(target: TARGET, id = %id, fields = changes.len(), "item changed");

        let parent_property = self.adapter().parent_property().to_string();
        let mut requery = false;
        for (property, old_value, new_value) in changes {
            if property == parent_property {
                let old_parents = ParentSet::from_value(old_value.as_ref().unwrap_or(&Value::Null));
                let new_parents = ParentSet::from_value(new_value.as_ref().unwrap_or(&Value::Null));
                let affected: Vec<Item> = old_parents
                    .symmetric_difference(&new_parents)
                    .iter()
                    .filter_map(|parent| self.objects().get(parent))
                    .collect();
                self.children_changed(affected).await;
            }
            if self.is_forest() && self.root_query().constrains(&property) {
                requery = true;
            }
            self.signals().emit(ModelEvent::Change(ItemChange {
                item: item.clone(),
                property,
                old_value,
                new_value,
            }));
        }
        if requery {
            self.requery_root().await?;
        }
        Ok(())
    }

    async fn route_delete(&self, item: Item, from: Option<Item>) -> ModelResult<()> {
        let id = self.identity_of(&item)?;
        // The incoming item may already carry its new parents; the snapshot
        // still names the former ones.
        let former = self.objects().get(&id).unwrap_or_else(|| item.clone());

        // A delete may really be a move, so only drop the snapshot once the
        // store confirms the item is gone. A failed check counts as gone.
        match self.adapter().get(&id).await {
            Ok(Some(_)) => tracing::debug!(target: TARGET, id = %id, "deleted item still exists, keeping snapshot"),
            Ok(None) | Err(_) => {
                self.objects().remove(&id);
            }
        }
        self.children().evict(&id);
        self.signals().emit(ModelEvent::Delete(item.clone()));

        let mut parents = self.get_parents(&former).await?;
        parents.extend(from);
        if self.is_child_of_root(&former) {
            self.emit_root_change(item, RootAction::Delete);
        }
        self.children_changed(parents).await;
        Ok(())
    }

    async fn route_new(&self, item: Item) -> ModelResult<()> {
        let id = self.identity_of(&item)?;
        self.objects().replace(id, item.clone());

        let parents = self.get_parents(&item).await?;
        if self.is_child_of_root(&item) {
            self.emit_root_change(item, RootAction::New);
        }
        self.children_changed(parents).await;
        Ok(())
    }

    async fn route_reorder(&self, parent: Item) -> ModelResult<()> {
        let children = self.get_children(&parent).await?;
        self.signals()
            .emit(ModelEvent::ChildrenChange(ChildrenChange { parent, children }));
        Ok(())
    }

    /// Evicts and re-fetches the children of each parent, announcing the new lists.
    pub(crate) async fn children_changed(&self, parents: Vec<Item>) {
        let mut seen: Vec<ItemId> = Vec::new();
        for parent in parents {
            let Some(id) = self.get_identity(&parent) else {
                continue;
            };
            if seen.contains(&id) {
                continue;
            }
            seen.push(id.clone());

            if self.is_forest_root(&parent) {
                if let Err(err) = self.requery_root().await {
                    tracing::warn!(target: TARGET, error = %err, "root re-query failed");
                }
                continue;
            }

            self.children().evict(&id);
            match self.get_children(&parent).await {
                Ok(children) => self
                    .signals()
                    .emit(ModelEvent::ChildrenChange(ChildrenChange { parent, children })),
                Err(err) => {
                    tracing::warn!(target: TARGET, parent = %id, error = %err, "children re-fetch failed");
                }
            }
        }
    }

    pub(crate) fn emit_root_change(&self, item: Item, action: RootAction) {
        tracing::debug!(target: TARGET, action = %action, "root membership changed");
        self.signals()
            .emit(ModelEvent::RootChange(RootChange { item, action }));
    }

    fn identity_of(&self, item: &Item) -> ModelResult<ItemId> {
        self.get_identity(item).ok_or(ModelError::MissingIdentity)
    }
}
