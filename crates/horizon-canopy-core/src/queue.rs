//! Deferred FIFO queue for cross-boundary hand-off.
//!
//! Producers (typically callbacks invoked by an external collaborator) post
//! values without doing any work; a consumer later takes them in posting
//! order and processes them at a point of its choosing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// A unique identifier for a queued entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueuedId(u64);

impl QueuedId {
    /// Get the raw u64 value of this id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Global counter for generating unique queue ids.
static NEXT_QUEUED_ID: AtomicU64 = AtomicU64::new(1);

fn next_queued_id() -> QueuedId {
    QueuedId(NEXT_QUEUED_ID.fetch_add(1, Ordering::Relaxed))
}

const DEFAULT_BATCH_SIZE: usize = 32;

struct Entry<T> {
    id: QueuedId,
    value: T,
}

struct QueueState<T> {
    entries: VecDeque<Entry<T>>,
    batch_size: usize,
    closed: bool,
}

/// A thread-safe FIFO of deferred values.
///
/// Once [`close`](Self::close)d, the queue drops everything pending and
/// refuses further posts.
pub struct DeferredQueue<T> {
    state: Mutex<QueueState<T>>,
}

impl<T> DeferredQueue<T> {
    /// Create a new queue.
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_BATCH_SIZE)
    }

    /// Create a new queue with a custom batch size for [`take_batch`](Self::take_batch).
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: VecDeque::new(),
                batch_size: batch_size.max(1),
                closed: false,
            }),
        }
    }

    /// Post a value to the back of the queue.
    ///
    /// Returns `None` if the queue has been closed.
    pub fn post(&self, value: T) -> Option<QueuedId> {
        let mut state = self.state.lock();
        if state.closed {
            tracing::trace!(target: "horizon_canopy_core::queue", "queue closed, dropping post");
            return None;
        }
        let id = next_queued_id();
        state.entries.push_back(Entry { id, value });
        tracing::trace!(target: "horizon_canopy_core::queue", id = id.as_u64(), pending = state.entries.len(), "posted");
        Some(id)
    }

    /// Cancel a pending entry, returning its value if it was still queued.
    pub fn cancel(&self, id: QueuedId) -> Option<T> {
        let mut state = self.state.lock();
        let pos = state.entries.iter().position(|e| e.id == id)?;
        state.entries.remove(pos).map(|e| e.value)
    }

    /// Check if there are any pending entries.
    pub fn has_pending(&self) -> bool {
        !self.state.lock().entries.is_empty()
    }

    /// Get the number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Take up to `batch_size` entries from the front of the queue.
    pub fn take_batch(&self) -> Vec<T> {
        let mut state = self.state.lock();
        let count = state.entries.len().min(state.batch_size);
        state.entries.drain(..count).map(|e| e.value).collect()
    }

    /// Take every pending entry.
    pub fn take_all(&self) -> Vec<T> {
        self.state.lock().entries.drain(..).map(|e| e.value).collect()
    }

    /// Set the batch size used by [`take_batch`](Self::take_batch).
    pub fn set_batch_size(&self, size: usize) {
        self.state.lock().batch_size = size.max(1);
    }

    /// Close the queue, discarding pending entries. Returns how many were dropped.
    pub fn close(&self) -> usize {
        let mut state = self.state.lock();
        state.closed = true;
        let dropped = state.entries.len();
        state.entries.clear();
        dropped
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
