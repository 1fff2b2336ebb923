use kvmap_types::TypeError;
use thiserror::Error;

/// Errors from mapping entities to and from property bags.
#[derive(Debug, Error)]
pub enum MappingError {
    /// An attribute holds a value the store cannot represent.
    #[error("unsupported value for attribute {attribute}: {reason}")]
    UnsupportedValue { attribute: String, reason: String },

    /// The entity did not serialize to a map of attributes.
    #[error("entity must serialize to an object, got {found}")]
    NotAnObject { found: &'static str },

    /// The entity's `Serialize` impl failed.
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// A stored record does not fit the entity's shape.
    #[error("cannot deserialize {key}: {reason}")]
    Deserialize { key: String, reason: String },

    /// No mapping is registered under the collection symbol.
    #[error("unmapped collection: {0}")]
    UnmappedCollection(String),

    /// The collection maps a different entity type.
    #[error("collection {collection} maps {actual}, not {expected}")]
    TypeMismatch {
        collection: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A mapping is already registered under the collection symbol.
    #[error("collection already registered: {0}")]
    DuplicateCollection(String),

    /// The mapping's kind name breaks the key-space rules.
    #[error("invalid collection kind: {0}")]
    InvalidKind(#[from] TypeError),
}

/// Result alias for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;
