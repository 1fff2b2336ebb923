use kvmap_types::{NativeKey, TypeError};

/// Errors from store client operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A lookup or delete was attempted with a key that has no id.
    #[error("key is incomplete: {0}")]
    IncompleteKey(NativeKey),

    /// The key's kind or id breaks the key-space rules.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] TypeError),

    /// A query clause cannot be evaluated.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A write was attempted inside a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnly,

    /// Another writer modified a key this transaction depends on.
    #[error("transaction conflict on {key}")]
    Conflict { key: NativeKey },

    /// `begin` was called on a transaction.
    #[error("nested transactions are not supported")]
    NestedTransaction,

    /// The store connection has been closed.
    #[error("store connection is closed")]
    Closed,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal invariant failure (e.g. a poisoned lock).
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
