//! One-time root resolution.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::error::{ModelError, ModelResult};
use crate::item::Item;
use crate::store::{LoadOptions, Query, QueryOptions, QueryResults, StoreAdapter, Subscription};

const TARGET: &str = "horizon_canopy::root";

/// Where root resolution stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootPhase {
    Unresolved,
    Loading,
    Resolved,
}

/// Resolves the root once and caches it for the model's lifetime.
///
/// Concurrent callers share a single resolution. A failed resolution leaves
/// the resolver unresolved, so a later call tries again.
pub struct RootResolver {
    phase: Mutex<RootPhase>,
    root: OnceCell<Item>,
    loaded: OnceCell<()>,
    load_requested: AtomicBool,
    /// The root observer and the live results it watches.
    observer: Mutex<Option<(Subscription, QueryResults)>>,
}

impl Default for RootResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl RootResolver {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(RootPhase::Unresolved),
            root: OnceCell::new(),
            loaded: OnceCell::new(),
            load_requested: AtomicBool::new(false),
            observer: Mutex::new(None),
        }
    }

    /// A resolver that already holds a fabricated root.
    pub fn fabricated(root: Item) -> Self {
        Self {
            phase: Mutex::new(RootPhase::Resolved),
            root: OnceCell::new_with(Some(root)),
            ..Self::new()
        }
    }

    pub fn phase(&self) -> RootPhase {
        *self.phase.lock()
    }

    /// The resolved root, if any.
    pub fn get(&self) -> Option<&Item> {
        self.root.get()
    }

    /// Whether a store load has been requested.
    pub fn is_load_requested(&self) -> bool {
        self.load_requested.load(Ordering::SeqCst)
    }

    /// Loads the store once. Later calls wait for, or reuse, the first load.
    pub async fn load(&self, store: &StoreAdapter, options: &LoadOptions) -> ModelResult<()> {
        self.load_requested.store(true, Ordering::SeqCst);
        self.loaded
            .get_or_try_init(|| async {
                tracing::debug!(target: TARGET, "loading store");
                store.load(options).await.map_err(ModelError::from)
            })
            .await?;
        Ok(())
    }

    /// Resolves the root with `query`, loading the store first if needed.
    ///
    /// `observe` is handed the query results once and may return a
    /// subscription. The subscription and the results are both kept until
    /// [`clear`](Self::clear), so a live view stays live.
    pub async fn resolve<F>(
        &self,
        store: &StoreAdapter,
        query: &Query,
        options: &QueryOptions,
        load_options: &LoadOptions,
        observe: F,
    ) -> ModelResult<Item>
    where
        F: FnOnce(&QueryResults) -> Option<Subscription>,
    {
        let root = self
            .root
            .get_or_try_init(|| async {
                *self.phase.lock() = RootPhase::Loading;
                let resolved = self.run(store, query, options, load_options, observe).await;
                *self.phase.lock() = match resolved {
                    Ok(_) => RootPhase::Resolved,
                    Err(_) => RootPhase::Unresolved,
                };
                resolved
            })
            .await?;
        Ok(root.clone())
    }

    async fn run<F>(
        &self,
        store: &StoreAdapter,
        query: &Query,
        options: &QueryOptions,
        load_options: &LoadOptions,
        observe: F,
    ) -> ModelResult<Item>
    where
        F: FnOnce(&QueryResults) -> Option<Subscription>,
    {
        self.load(store, load_options).await?;

        let results = store.query(query, options).await?;
        let mut items = results.items();
        if items.len() != 1 {
            tracing::warn!(target: TARGET, count = items.len(), "root query did not yield exactly one item");
            return Err(ModelError::Cardinality { count: items.len() });
        }
        let root = items.remove(0);

        *self.observer.lock() = observe(&results).map(|subscription| (subscription, results));
        tracing::debug!(target: TARGET, root = ?store.identity(&root), "root resolved");
        Ok(root)
    }

    /// Drops the root observer and its live results.
    pub fn clear(&self) {
        let observer = self.observer.lock().take();
        drop(observer);
    }
}
