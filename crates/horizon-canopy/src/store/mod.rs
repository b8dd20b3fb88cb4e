//! Backing store contract, capability probing and the in-memory store.
//!
//! A tree model talks to its store only through a [`StoreAdapter`], which
//! is built by probing the store's declared [`CapabilitySet`] once. Missing
//! optional capabilities are filled in with local defaults; missing `get` or
//! `put` makes construction fail.

mod adapter;
mod capability;
mod memory;
mod query;
mod traits;

pub use adapter::{StoreAdapter, generate_identity};
pub use capability::{
    AddSlot, Capability, CapabilitySet, CapabilityTable, ChangeChannel, ChildrenSlot, HasChildrenSlot, IsItemSlot,
    LoadSlot, ParentEditSlot, ParentsSlot, QueryEngineSlot, WriteHook,
};
pub use memory::MemoryStore;
pub use query::{
    LiveResults, LoadOptions, ObserveListener, ObservedChange, PutDirectives, Query, QueryOptions, QueryResults,
    SortField, Subscription,
};
pub use traits::{ObjectStore, StoreEvent, StoreFuture, StoreListener, ready, unsupported};
