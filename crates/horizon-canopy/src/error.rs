//! Error types for store-backed tree models.

use crate::item::ItemId;
use crate::store::Capability;

/// Result alias for backing store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result alias for model operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Errors reported by a backing store.
///
/// `Clone` so a single failed fetch can be delivered to every caller that
/// awaited it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The store was asked for a capability it does not declare.
    #[error("store does not support {0}")]
    Unsupported(Capability),

    /// The requested item does not exist.
    #[error("item not found: {0}")]
    NotFound(ItemId),

    /// An item without an identity reached an operation that needs one.
    #[error("store item has no identity")]
    MissingIdentity,

    /// Backend-specific failure.
    #[error("store operation failed: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Why a model could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    /// No store was supplied.
    #[error("store parameter is required")]
    MissingStore,

    /// A mandatory capability (`get` or `put`) is absent.
    #[error("store MUST support {0}")]
    MissingCapability(Capability),
}

/// Errors that can occur in the tree model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// The model could not be constructed; it is unusable.
    #[error("cannot construct model: {0}")]
    Construction(#[from] ConstructionError),

    /// The root query did not yield exactly one item.
    #[error("root query returned {count} items, but must return exactly one item")]
    Cardinality { count: usize },

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A tree shape did not supply a required operation.
    #[error("{0} requires an implementation")]
    AbstractMethod(&'static str),

    /// An item without an identity was passed where one is required.
    #[error("item has no identity")]
    MissingIdentity,

    /// The model has been destroyed.
    #[error("model has been destroyed")]
    Destroyed,

    /// The configuration could not be parsed.
    #[error("invalid model configuration: {0}")]
    Config(String),
}

impl ModelError {
    /// Returns `true` for errors that make the model unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Construction(_) | Self::AbstractMethod(_) | Self::Destroyed
        )
    }
}
