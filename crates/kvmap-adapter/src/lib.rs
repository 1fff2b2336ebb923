//! Data-mapper adapter for schemaless key-value stores.
//!
//! Application entities go in and come out; the store only ever sees
//! [`NativeKey`](kvmap_types::NativeKey)s and property bags. The adapter
//! never caches: every read is a store round-trip.
//!
//! # Modules
//!
//! - [`adapter`]: [`Adapter`] facade, [`AdapterBuilder`] and transactions
//! - [`session`]: [`Session`], collection-addressed operations on one scope
//! - [`command`]: [`Command`], per-collection create/update/find/first/last/delete
//! - [`query`]: [`Query`], deferred queries with lazy result iteration
//! - [`collection`]: [`Collection`], the shared write path
//! - [`config`]: [`AdapterConfig`]
//! - [`error`]: [`AdapterError`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use kvmap_adapter::Adapter;
//! use kvmap_mapper::{Document, SerdeMapping};
//! use kvmap_store::{InMemoryDatastore, StoreClient};
//! use serde_json::json;
//!
//! let store: Arc<dyn StoreClient> = Arc::new(InMemoryDatastore::new());
//! let adapter = Adapter::builder(store)
//!     .register::<Document, _>("notes", SerdeMapping::new("Note"))?
//!     .build()?;
//!
//! let note = Document::from_json(json!({"title": "hello"})).unwrap();
//! let note = adapter.create("notes", note)?;
//! let found: Option<Document> = adapter.find("notes", note.id.as_ref().unwrap())?;
//! assert_eq!(found, Some(note));
//! # Ok::<(), kvmap_adapter::AdapterError>(())
//! ```

pub mod adapter;
pub mod collection;
pub mod command;
pub mod config;
pub mod error;
pub mod query;
pub mod session;

#[cfg(test)]
mod testing;

pub use adapter::{Adapter, AdapterBuilder};
pub use collection::Collection;
pub use command::Command;
pub use config::AdapterConfig;
pub use error::{AdapterError, AdapterResult};
pub use query::{Clause, Query, QueryIter};
pub use session::Session;

pub use kvmap_store::{FilterOp, TransactionOptions};
