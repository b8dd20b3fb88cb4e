//! Horizon Canopy - store-backed tree models.
//!
//! A [`StoreTreeModel`] presents the items of a flat, query-based
//! [`ObjectStore`](store::ObjectStore) as a tree. Parent links live in a
//! field of each child; children are fetched lazily, cached per parent and
//! kept coherent as the store reports changes.
//!
//! # Quick Start
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
//!     Item::from_value(json!({"id": 3, "name": "Marge", "parent": 1})).unwrap(),
//! ]);
//!
//! let model = ModelBuilder::new()
//!     .store(store)
//!     .config(ModelConfig::new().with_query_field("parent", Value::Null))
//!     .build()
//!     .unwrap();
//!
//! model.on_children_change(|change| {
//!     println!("{} children now", change.children.len());
//! });
//!
//! let root = model.get_root().await.unwrap();
//! assert_eq!(model.get_children(&root).await.unwrap().len(), 2);
//! # });
//! ```
//!
//! # Change Notifications
//!
//! Store callbacks only queue work. Call
//! [`StoreTreeModel::process_events`] to route queued notifications, or
//! start [`StoreTreeModel::spawn_event_pump`] on a tokio runtime.

mod config;
pub mod error;
mod item;
pub mod model;
mod parents;
pub mod store;

pub use config::ModelConfig;
pub use error::{ConstructionError, ModelError, ModelResult, StoreError, StoreResult};
pub use item::{Item, ItemId};
pub use model::{
    ChildrenChange, Forest, ItemChange, ModelBuilder, ModelEvent, RootAction, RootChange, SingleRoot,
    StoreTreeModel, TreeShape,
};
pub use parents::ParentSet;
