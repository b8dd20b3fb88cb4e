//! Public callback surface of a tree model.

use std::fmt;

use horizon_canopy_core::{ConnectionId, Signal};
use serde_json::Value;

use crate::item::Item;

/// One field of an item changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemChange {
    /// The item after the change.
    pub item: Item,
    /// Name of the changed field.
    pub property: String,
    /// Previous value; `None` if the field was added.
    pub old_value: Option<Value>,
    /// New value; `None` if the field was removed.
    pub new_value: Option<Value>,
}

/// The children of a parent changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildrenChange {
    pub parent: Item,
    pub children: Vec<Item>,
}

/// How an item's membership under the root changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootAction {
    /// A new item appeared under the root.
    New,
    /// An item under the root was deleted.
    Delete,
    /// An existing item was moved under the root.
    Attach,
    /// An item was moved away from the root.
    Detach,
}

impl RootAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RootAction::New => "new",
            RootAction::Delete => "delete",
            RootAction::Attach => "attach",
            RootAction::Detach => "detach",
        }
    }
}

impl fmt::Display for RootAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root membership changed.
#[derive(Debug, Clone, PartialEq)]
pub struct RootChange {
    pub item: Item,
    pub action: RootAction,
}

/// Any public model notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    Change(ItemChange),
    ChildrenChange(ChildrenChange),
    Delete(Item),
    RootChange(RootChange),
}

/// Signals emitted by a tree model.
///
/// Each notification is emitted on [`events`](Self::events) first and then
/// on its typed signal. By the time any slot runs, the model's caches
/// already reflect the change.
pub struct ModelSignals {
    /// Every notification, in emission order.
    pub events: Signal<ModelEvent>,

    /// Emitted once per changed field.
    pub change: Signal<ItemChange>,

    /// Emitted when a parent's children were re-fetched after a change.
    pub children_change: Signal<ChildrenChange>,

    /// Emitted when an item was deleted from the store.
    pub delete: Signal<Item>,

    /// Emitted when membership under the root changed.
    pub root_change: Signal<RootChange>,
}

impl Default for ModelSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSignals {
    pub fn new() -> Self {
        Self {
            events: Signal::new(),
            change: Signal::new(),
            children_change: Signal::new(),
            delete: Signal::new(),
            root_change: Signal::new(),
        }
    }

    /// Emits `event` on the catch-all and the typed signal.
    pub fn emit(&self, event: ModelEvent) {
        self.events.emit(event.clone());
        match event {
            ModelEvent::Change(change) => self.change.emit(change),
            ModelEvent::ChildrenChange(change) => self.children_change.emit(change),
            ModelEvent::Delete(item) => self.delete.emit(item),
            ModelEvent::RootChange(change) => self.root_change.emit(change),
        }
    }

    pub fn on_change<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&ItemChange) + Send + Sync + 'static,
    {
        self.change.connect(slot)
    }

    pub fn on_children_change<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&ChildrenChange) + Send + Sync + 'static,
    {
        self.children_change.connect(slot)
    }

    pub fn on_delete<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Item) + Send + Sync + 'static,
    {
        self.delete.connect(slot)
    }

    pub fn on_root_change<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&RootChange) + Send + Sync + 'static,
    {
        self.root_change.connect(slot)
    }

    /// Drops every connected slot.
    pub fn disconnect_all(&self) {
        self.events.disconnect_all();
        self.change.disconnect_all();
        self.children_change.disconnect_all();
        self.delete.disconnect_all();
        self.root_change.disconnect_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_emit_reaches_both_signals() {
        let signals = ModelSignals::new();
        let all = Arc::new(Mutex::new(Vec::new()));
        let deleted = Arc::new(Mutex::new(Vec::new()));

        let sink = all.clone();
        signals.events.connect(move |event| sink.lock().push(event.clone()));
        let sink = deleted.clone();
        signals.on_delete(move |item| sink.lock().push(item.clone()));

        let item = Item::from_value(json!({"id": 1})).unwrap();
        signals.emit(ModelEvent::Delete(item.clone()));
        signals.emit(ModelEvent::RootChange(RootChange {
            item: item.clone(),
            action: RootAction::Detach,
        }));

        assert_eq!(all.lock().len(), 2);
        assert_eq!(*deleted.lock(), vec![item]);
    }

    #[test]
    fn test_root_action_names() {
        let names: Vec<_> = [RootAction::New, RootAction::Delete, RootAction::Attach, RootAction::Detach]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, ["new", "delete", "attach", "detach"]);
    }
}
