use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid entity id {id}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("invalid kind {kind:?}: {reason}")]
    InvalidKind { kind: String, reason: String },
}
