//! Error types for proxima.

use thiserror::Error;

/// Errors raised by index builders, searches, and persistence.
#[derive(Debug, Error)]
pub enum Error {
    /// Build attempted with zero features.
    #[error("empty feature pool")]
    EmptyPool,

    /// Cut-plane construction attempted over an empty index range.
    #[error("elements is empty")]
    EmptyElements,

    /// A feature's length differs from the builder's configured dimension.
    #[error("invalid feature dim: expected {expected}, got {got}")]
    InvalidFeatureDim { expected: usize, got: usize },

    /// Pop attempted on a drained priority queue.
    #[error("empty queue")]
    EmptyQueue,

    /// Search attempted on an index whose build never succeeded.
    #[error("index is not built")]
    NotBuilt,

    /// A parallel build worker failed; carries the first observed cause.
    #[error("build failed: {0}")]
    BuildFailed(String),

    /// I/O failure while saving or loading an index.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or incompatible persisted index data.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for proxima operations.
pub type Result<T> = std::result::Result<T, Error>;
