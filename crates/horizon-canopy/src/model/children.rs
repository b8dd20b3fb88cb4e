//! Children cache, keyed by parent identity.
//!
//! Each parent has at most one entry: either a fetch in flight or a
//! materialized result set, possibly with a live observer attached. Any
//! change that may affect a parent's children evicts its entry outright and
//! the next access fetches again.
//!
//! Every entry carries a generation number. A fetch that settles after its
//! entry was evicted (or replaced) finds a different generation and its
//! result is discarded instead of being stored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::error::{ModelResult, StoreResult};
use crate::item::ItemId;
use crate::store::{QueryResults, StoreFuture, Subscription};

const TARGET: &str = "horizon_canopy::children";

/// A children fetch that any number of callers may await.
pub type SharedFetch = Shared<BoxFuture<'static, StoreResult<QueryResults>>>;

enum Entry {
    Pending {
        generation: u64,
        fetch: SharedFetch,
    },
    Materialized {
        generation: u64,
        results: QueryResults,
        handle: Option<Subscription>,
    },
}

impl Entry {
    fn generation(&self) -> u64 {
        match self {
            Entry::Pending { generation, .. } | Entry::Materialized { generation, .. } => *generation,
        }
    }

    fn lookup(&self) -> Lookup {
        match self {
            Entry::Pending { generation, fetch } => Lookup {
                generation: *generation,
                state: LookupState::Pending(fetch.clone()),
            },
            Entry::Materialized {
                generation, results, ..
            } => Lookup {
                generation: *generation,
                state: LookupState::Ready(results.clone()),
            },
        }
    }
}

/// What [`ChildrenCache::resolve_with`] found or started.
pub struct Lookup {
    /// Generation of the entry the lookup refers to.
    pub generation: u64,
    pub state: LookupState,
}

pub enum LookupState {
    /// Already materialized.
    Ready(QueryResults),
    /// A fetch is in flight; await it and then call
    /// [`materialize`](ChildrenCache::materialize) or [`fail`](ChildrenCache::fail).
    Pending(SharedFetch),
}

/// Per-model children cache.
pub struct ChildrenCache {
    entries: Mutex<HashMap<ItemId, Entry>>,
    next_generation: AtomicU64,
}

impl Default for ChildrenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ChildrenCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Returns the entry for `parent`, or starts `compute` and caches it as pending.
    ///
    /// `compute` is not invoked when an entry exists, whatever its state.
    pub fn resolve_with<F>(&self, parent: &ItemId, compute: F) -> ModelResult<Lookup>
    where
        F: FnOnce() -> ModelResult<StoreFuture<QueryResults>>,
    {
        if let Some(entry) = self.entries.lock().get(parent) {
            tracing::trace!(target: TARGET, parent = %parent, generation = entry.generation(), "cache hit");
            return Ok(entry.lookup());
        }

        // The store call runs without the lock held.
        let fetch = compute()?.shared();

        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(parent) {
            return Ok(entry.lookup());
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(target: TARGET, parent = %parent, generation, "fetch started");
        entries.insert(
            parent.clone(),
            Entry::Pending {
                generation,
                fetch: fetch.clone(),
            },
        );
        Ok(Lookup {
            generation,
            state: LookupState::Pending(fetch),
        })
    }

    /// Replaces the pending entry of `generation` with its settled results.
    ///
    /// `attach` runs only when this call wins, and its subscription is kept
    /// with the entry. Returns `false` if the entry was already materialized
    /// or has been superseded.
    pub fn materialize<F>(&self, parent: &ItemId, generation: u64, results: QueryResults, attach: F) -> bool
    where
        F: FnOnce(&QueryResults) -> Option<Subscription>,
    {
        let mut entries = self.entries.lock();
        match entries.get(parent) {
            Some(Entry::Pending { generation: current, .. }) if *current == generation => {
                let handle = attach(&results);
                tracing::trace!(
                    target: TARGET,
                    parent = %parent,
                    generation,
                    observed = handle.is_some(),
                    "children materialized"
                );
                entries.insert(
                    parent.clone(),
                    Entry::Materialized {
                        generation,
                        results,
                        handle,
                    },
                );
                true
            }
            Some(Entry::Materialized { generation: current, .. }) if *current == generation => false,
            _ => {
                tracing::trace!(target: TARGET, parent = %parent, generation, "discarding superseded fetch");
                false
            }
        }
    }

    /// Evicts the pending entry of `generation` after its fetch failed.
    pub fn fail(&self, parent: &ItemId, generation: u64) {
        let removed = {
            let mut entries = self.entries.lock();
            match entries.get(parent) {
                Some(Entry::Pending { generation: current, .. }) if *current == generation => entries.remove(parent),
                _ => None,
            }
        };
        if removed.is_some() {
            tracing::debug!(target: TARGET, parent = %parent, generation, "evicted failed fetch");
        }
    }

    /// Drops the entry for `parent`, detaching its observer.
    pub fn evict(&self, parent: &ItemId) -> bool {
        let removed = self.entries.lock().remove(parent);
        if removed.is_some() {
            tracing::trace!(target: TARGET, parent = %parent, "evicted");
        }
        removed.is_some()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.lock());
        tracing::debug!(target: TARGET, count = entries.len(), "cleared");
    }

    /// Generation of the current entry for `parent`.
    pub fn generation(&self, parent: &ItemId) -> Option<u64> {
        self.entries.lock().get(parent).map(Entry::generation)
    }

    /// Number of children if the entry for `parent` is materialized.
    pub fn materialized_len(&self, parent: &ItemId) -> Option<usize> {
        match self.entries.lock().get(parent)? {
            Entry::Materialized { results, .. } => Some(results.len()),
            Entry::Pending { .. } => None,
        }
    }

    pub fn contains(&self, parent: &ItemId) -> bool {
        self.entries.lock().contains_key(parent)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
