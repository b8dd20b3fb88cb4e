//! Core systems for Horizon Canopy.
//!
//! This crate provides the infrastructure the store-backed tree model is
//! built on:
//!
//! - **Signal/Slot System**: Type-safe publish/subscribe for change callbacks
//! - **Deferred Queue**: FIFO hand-off between store callbacks and the engine
//! - **Logging**: Tracing target and span names shared across the workspace
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_canopy_core::Signal;
//!
//! let item_deleted = Signal::<String>::new();
//!
//! let conn_id = item_deleted.connect(|id| {
//!     println!("Item {} deleted", id);
//! });
//!
//! item_deleted.emit("42".to_string());
//! item_deleted.disconnect(conn_id);
//! ```
//!
//! # Deferred Queue Example
//!
//! ```
//! use horizon_canopy_core::DeferredQueue;
//!
//! let queue = DeferredQueue::new();
//! queue.post("changed");
//! queue.post("deleted");
//!
//! assert_eq!(queue.take_all(), vec!["changed", "deleted"]);
//! ```

pub mod logging;
mod queue;
pub mod signal;

pub use queue::{DeferredQueue, QueuedId};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
