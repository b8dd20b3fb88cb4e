//! Tree-shape strategies.
//!
//! A [`TreeShape`] decides how the root is found and how children are
//! fetched. The engine itself is shared by every shape.

use serde_json::Value;

use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};
use crate::item::Item;
use crate::store::{Query, QueryOptions, QueryResults, StoreAdapter, StoreFuture};

/// How the root of a tree is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum RootPolicy {
    /// Run the query once; it must yield exactly one item.
    Query(Query),
    /// Use a locally fabricated root that owns its children list.
    Forest {
        root: Item,
        /// Initial children. `None` means "query on first access".
        children: Option<Vec<Item>>,
    },
}

/// Strategy for root resolution and children fetching.
pub trait TreeShape: Send + Sync {
    /// How the root is obtained.
    fn root_policy(&self, store: &StoreAdapter, config: &ModelConfig) -> RootPolicy;

    /// Starts fetching the children of `parent`.
    ///
    /// Every concrete shape must supply this.
    fn fetch_children(
        &self,
        _store: &StoreAdapter,
        _parent: &Item,
        _options: &QueryOptions,
    ) -> ModelResult<StoreFuture<QueryResults>> {
        Err(ModelError::AbstractMethod("TreeShape::fetch_children"))
    }
}

/// A tree with one store-backed root selected by the configured query.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleRoot;

impl TreeShape for SingleRoot {
    fn root_policy(&self, _store: &StoreAdapter, config: &ModelConfig) -> RootPolicy {
        RootPolicy::Query(config.query.clone())
    }

    fn fetch_children(
        &self,
        store: &StoreAdapter,
        parent: &Item,
        options: &QueryOptions,
    ) -> ModelResult<StoreFuture<QueryResults>> {
        Ok(store.get_children(parent, options))
    }
}

/// A tree whose top-level items share a fabricated root.
///
/// The configured query selects the root's children.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    children: Option<Vec<Item>>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the root with `children` instead of querying on first access.
    pub fn with_children(children: Vec<Item>) -> Self {
        Self {
            children: Some(children),
        }
    }
}

impl TreeShape for Forest {
    fn root_policy(&self, store: &StoreAdapter, config: &ModelConfig) -> RootPolicy {
        let label = config.root_label.clone().unwrap_or_else(|| "ROOT".to_string());
        let root = Item::new()
            .with(store.id_property(), config.root_id.clone())
            .with(config.label_attr.clone(), label)
            .with("root", Value::Bool(true));
        RootPolicy::Forest {
            root,
            children: self.children.clone(),
        }
    }

    fn fetch_children(
        &self,
        store: &StoreAdapter,
        parent: &Item,
        options: &QueryOptions,
    ) -> ModelResult<StoreFuture<QueryResults>> {
        Ok(store.get_children(parent, options))
    }
}
