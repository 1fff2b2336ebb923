use kvmap_types::{EntityId, NativeKey, PropertyBag};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::query::NativeQuery;

/// A record as the store returns it: its complete key plus its properties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredEntity {
    pub key: NativeKey,
    pub properties: PropertyBag,
}

/// Lazy stream of query results.
///
/// Backends may hold cursor resources while the iterator is alive; they must
/// release them when the iterator is exhausted or dropped.
pub type RowCursor<'a> = Box<dyn Iterator<Item = StoreResult<StoredEntity>> + Send + 'a>;

/// Options for [`StoreClient::begin`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOptions {
    /// Reject every write issued inside the transaction.
    pub read_only: bool,
}

impl TransactionOptions {
    pub fn read_only() -> Self {
        Self { read_only: true }
    }
}

/// Connection to a schemaless key-value store.
///
/// All implementations must satisfy these invariants:
/// - `save` with an incomplete key allocates a fresh id and returns the
///   completed key; with a complete key it overwrites (upsert).
/// - `lookup` of a missing key is `Ok(None)`, never an error.
/// - `delete` of a missing key is a no-op.
/// - Errors are propagated, never swallowed or retried.
pub trait StoreClient: Send + Sync {
    /// Build a key. Pure: no store round-trip.
    fn key(&self, kind: &str, id: Option<EntityId>) -> NativeKey {
        NativeKey::new(kind, id)
    }

    /// Write one record and return its complete key.
    fn save(&self, key: &NativeKey, properties: &PropertyBag) -> StoreResult<NativeKey>;

    /// Point lookup.
    fn lookup(&self, key: &NativeKey) -> StoreResult<Option<PropertyBag>>;

    /// Delete one record.
    fn delete(&self, key: &NativeKey) -> StoreResult<()>;

    /// Start executing a query and return a cursor over its rows.
    fn run_query(&self, query: &NativeQuery) -> StoreResult<RowCursor<'_>>;

    /// Open a transaction scope.
    fn begin(&self, options: TransactionOptions) -> StoreResult<Box<dyn StoreTransaction + '_>>;

    /// Release the connection. Later calls fail with `StoreError::Closed`.
    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// A store transaction.
///
/// Reads see the transaction's own writes. Nothing becomes visible to other
/// clients until `commit`, which applies every write atomically or none.
/// Dropping a transaction without committing rolls it back.
pub trait StoreTransaction: StoreClient {
    /// Identifier for logging.
    fn id(&self) -> &str;

    /// The transaction viewed as a plain client.
    fn as_client(&self) -> &dyn StoreClient;

    fn commit(self: Box<Self>) -> StoreResult<()>;

    fn rollback(self: Box<Self>) -> StoreResult<()>;
}
