use kvmap_mapper::MappingError;
use kvmap_store::StoreError;
use kvmap_types::NativeKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("store write failed during {operation}: {source}")]
    StoreWrite {
        operation: &'static str,
        source: StoreError,
    },

    #[error("store read failed during {operation}: {source}")]
    StoreRead {
        operation: &'static str,
        source: StoreError,
    },

    #[error("{operation} on {collection} requires an entity id")]
    IdentityRequired {
        operation: &'static str,
        collection: String,
    },

    #[error("record not found: {0}")]
    NotFound(NativeKey),

    #[error("operation not supported by this store binding: {operation}")]
    UnsupportedOperation { operation: &'static str },

    #[error("transaction failed: {0}")]
    Transaction(StoreError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AdapterError {
    pub(crate) fn write(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| AdapterError::StoreWrite { operation, source }
    }

    pub(crate) fn read(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| AdapterError::StoreRead { operation, source }
    }

    /// The underlying store error, if this error came from the store.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            AdapterError::StoreWrite { source, .. }
            | AdapterError::StoreRead { source, .. }
            | AdapterError::Transaction(source) => Some(source),
            _ => None,
        }
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
