//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use horizon_canopy::store::MemoryStore;
use horizon_canopy::{Item, ItemId, ModelBuilder, ModelConfig, StoreTreeModel};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber once. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn item(value: Value) -> Item {
    Item::from_value(value).expect("test item must be an object")
}

/// The Simpsons family: one root with two children and a grandchild.
pub fn family() -> MemoryStore {
    MemoryStore::with_items([
        item(json!({"id": 1, "name": "Simpsons", "parent": null})),
        item(json!({"id": 2, "name": "Homer", "parent": 1})),
        item(json!({"id": 3, "name": "Marge", "parent": 1})),
        item(json!({"id": 4, "name": "Bart", "parent": 2})),
    ])
}

/// A single-root model whose root is the item without a parent.
pub fn single_root(store: &MemoryStore) -> Arc<StoreTreeModel> {
    ModelBuilder::new()
        .store(store.clone())
        .config(ModelConfig::new().with_query_field("parent", Value::Null))
        .build()
        .expect("model must build")
}

pub fn ids(items: &[Item]) -> Vec<ItemId> {
    items.iter().filter_map(|i| i.identity("id")).collect()
}

/// Collects every value a signal slot receives.
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sink(&self) -> impl Fn(&T) + Send + Sync + 'static {
        let seen = self.seen.clone();
        move |value: &T| seen.lock().push(value.clone())
    }

    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.seen.lock())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}
