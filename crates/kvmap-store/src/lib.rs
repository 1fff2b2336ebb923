//! Store client contract and in-memory datastore for kvmap.
//!
//! The adapter layer talks to a schemaless key-value store only through the
//! [`StoreClient`] trait: key construction, single-record save/lookup/delete,
//! native queries and transaction scopes. Nothing above this crate knows how
//! records are laid out or transported.
//!
//! # Storage Backends
//!
//! - [`InMemoryDatastore`] -- `BTreeMap`-based store with optimistic
//!   transactions, for tests, the CLI and embedding
//!
//! # Design Rules
//!
//! 1. `save` is an upsert; an incomplete key asks the store to allocate an id.
//! 2. Missing records are `Ok(None)` on lookup and a no-op on delete.
//! 3. Query cursors release their resources on exhaustion or drop.
//! 4. A transaction commits all of its writes or none of them.
//! 5. Errors are propagated, never swallowed or retried.

pub mod error;
pub mod memory;
pub mod query;
pub mod snapshot;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryDatastore, InMemoryTransaction};
pub use query::{Direction, Filter, FilterOp, NativeQuery, Order};
pub use snapshot::DatastoreSnapshot;
pub use traits::{RowCursor, StoreClient, StoreTransaction, StoredEntity, TransactionOptions};
