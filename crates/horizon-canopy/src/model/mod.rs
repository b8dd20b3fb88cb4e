//! The tree model and its internals.
//!
//! [`StoreTreeModel`] is the public facade. The remaining types are exposed
//! for custom [`TreeShape`]s and for inspection in tests.

mod children;
mod events;
mod root;
mod router;
mod shape;
mod snapshot;
mod tree_model;

pub use children::{ChildrenCache, Lookup, LookupState, SharedFetch};
pub use events::{ChildrenChange, ItemChange, ModelEvent, ModelSignals, RootAction, RootChange};
pub use root::{RootPhase, RootResolver};
pub use router::{Bridge, Notification};
pub use shape::{Forest, RootPolicy, SingleRoot, TreeShape};
pub use snapshot::ObjectCache;
pub use tree_model::{ModelBuilder, StoreTreeModel};
