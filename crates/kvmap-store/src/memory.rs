use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use kvmap_types::{validate_kind, EntityId, NativeKey, PropertyBag};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::query::NativeQuery;
use crate::traits::{RowCursor, StoreClient, StoreTransaction, StoredEntity, TransactionOptions};

/// In-memory datastore.
///
/// Intended for tests, the CLI and embedding. Records live in a `BTreeMap`
/// keyed by complete [`NativeKey`]s, so iteration follows native key order.
/// Every write bumps a per-key version that transactions use for optimistic
/// conflict detection. Numeric ids come from one store-wide sequence and
/// are never reused.
pub struct InMemoryDatastore {
    state: RwLock<DatastoreState>,
    open_cursors: AtomicUsize,
    queries_run: AtomicU64,
    closed: AtomicBool,
}

#[derive(Default)]
pub(crate) struct DatastoreState {
    pub(crate) records: BTreeMap<NativeKey, PropertyBag>,
    // Deleted keys keep a tombstone version only while a transaction is
    // open; the last transaction to finish prunes them.
    versions: HashMap<NativeKey, u64>,
    clock: u64,
    pub(crate) next_id: i64,
    open_transactions: usize,
}

impl DatastoreState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // Keep the sequence ahead of caller-chosen numeric ids.
    pub(crate) fn reserve(&mut self, id: &EntityId) {
        if let EntityId::Id(n) = id {
            if *n >= self.next_id {
                self.next_id = n + 1;
            }
        }
    }

    /// Validate a key and allocate an id if it is incomplete.
    fn complete_key(&mut self, key: &NativeKey) -> StoreResult<NativeKey> {
        validate_kind(&key.kind)?;
        match &key.id {
            Some(id) => {
                id.validate()?;
                self.reserve(id);
                Ok(key.clone())
            }
            None => Ok(key.with_id(EntityId::Id(self.allocate_id()))),
        }
    }

    pub(crate) fn put(&mut self, key: NativeKey, properties: PropertyBag) {
        self.clock += 1;
        self.versions.insert(key.clone(), self.clock);
        self.records.insert(key, properties);
    }

    fn remove(&mut self, key: &NativeKey) -> bool {
        if self.records.remove(key).is_none() {
            return false;
        }
        if self.open_transactions == 0 {
            self.versions.remove(key);
        } else {
            self.clock += 1;
            self.versions.insert(key.clone(), self.clock);
        }
        true
    }

    fn transaction_started(&mut self) {
        self.open_transactions += 1;
    }

    fn transaction_finished(&mut self) {
        self.open_transactions = self.open_transactions.saturating_sub(1);
        if self.open_transactions == 0 {
            let records = &self.records;
            self.versions.retain(|key, _| records.contains_key(key));
        }
    }

    #[cfg(test)]
    fn tracked_versions(&self) -> usize {
        self.versions.len()
    }

    fn version(&self, key: &NativeKey) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn rows_of_kind(&self, kind: &str) -> BTreeMap<NativeKey, PropertyBag> {
        self.records
            .range(NativeKey::incomplete(kind)..)
            .take_while(|(key, _)| key.kind == kind)
            .map(|(key, props)| (key.clone(), props.clone()))
            .collect()
    }
}

fn require_complete(key: &NativeKey) -> StoreResult<()> {
    if key.is_complete() {
        Ok(())
    } else {
        Err(StoreError::IncompleteKey(key.clone()))
    }
}

impl InMemoryDatastore {
    /// Create a new empty datastore.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DatastoreState::default()),
            open_cursors: AtomicUsize::new(0),
            queries_run: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn from_state(state: DatastoreState) -> Self {
        Self {
            state: RwLock::new(state),
            ..Self::new()
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.read_state().map(|s| s.records.len()).unwrap_or(0)
    }

    /// Returns `true` if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of query cursors that have not been exhausted or dropped.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Number of queries executed since creation.
    pub fn queries_run(&self) -> u64 {
        self.queries_run.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn read_state(&self) -> StoreResult<RwLockReadGuard<'_, DatastoreState>> {
        self.state
            .read()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {e}")))
    }

    fn write_state(&self) -> StoreResult<RwLockWriteGuard<'_, DatastoreState>> {
        self.state
            .write()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {e}")))
    }

    fn cursor(&self, rows: Vec<StoredEntity>) -> RowCursor<'_> {
        self.queries_run.fetch_add(1, Ordering::SeqCst);
        Box::new(MemoryCursor::new(rows, &self.open_cursors))
    }
}

impl Default for InMemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreClient for InMemoryDatastore {
    fn save(&self, key: &NativeKey, properties: &PropertyBag) -> StoreResult<NativeKey> {
        self.ensure_open()?;
        let mut state = self.write_state()?;
        let key = state.complete_key(key)?;
        state.put(key.clone(), properties.clone());
        debug!(key = %key, properties = properties.len(), "saved record");
        Ok(key)
    }

    fn lookup(&self, key: &NativeKey) -> StoreResult<Option<PropertyBag>> {
        self.ensure_open()?;
        require_complete(key)?;
        let state = self.read_state()?;
        Ok(state.records.get(key).cloned())
    }

    fn delete(&self, key: &NativeKey) -> StoreResult<()> {
        self.ensure_open()?;
        require_complete(key)?;
        let existed = self.write_state()?.remove(key);
        debug!(key = %key, existed, "deleted record");
        Ok(())
    }

    fn run_query(&self, query: &NativeQuery) -> StoreResult<RowCursor<'_>> {
        self.ensure_open()?;
        query.validate()?;
        let rows = {
            let state = self.read_state()?;
            let candidates = state
                .rows_of_kind(&query.kind)
                .into_iter()
                .map(|(key, properties)| StoredEntity { key, properties });
            query.evaluate(candidates)
        };
        debug!(kind = %query.kind, rows = rows.len(), "query executed");
        Ok(self.cursor(rows))
    }

    fn begin(&self, options: TransactionOptions) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        self.ensure_open()?;
        self.write_state()?.transaction_started();
        Ok(Box::new(InMemoryTransaction::new(self, options)))
    }

    fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(records = self.len(), "datastore closed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDatastore")
            .field("record_count", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Cursor over materialized query rows.
///
/// Counts itself in the owning store's open-cursor gauge until it is either
/// exhausted or dropped.
struct MemoryCursor<'a> {
    rows: std::vec::IntoIter<StoredEntity>,
    open: Option<&'a AtomicUsize>,
}

impl<'a> MemoryCursor<'a> {
    fn new(rows: Vec<StoredEntity>, open: &'a AtomicUsize) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            rows: rows.into_iter(),
            open: Some(open),
        }
    }

    fn release(&mut self) {
        if let Some(open) = self.open.take() {
            open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Iterator for MemoryCursor<'_> {
    type Item = StoreResult<StoredEntity>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rows.next() {
            Some(row) => Some(Ok(row)),
            None => {
                self.release();
                None
            }
        }
    }
}

impl Drop for MemoryCursor<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Optimistic transaction over an [`InMemoryDatastore`].
///
/// Writes are staged locally and applied under the store's write lock on
/// commit. Every key the transaction reads or writes is pinned to the
/// version it had when first touched; commit fails with
/// [`StoreError::Conflict`] if any of them moved in the meantime.
pub struct InMemoryTransaction<'a> {
    store: &'a InMemoryDatastore,
    id: String,
    options: TransactionOptions,
    inner: Mutex<TxState>,
}

#[derive(Default)]
struct TxState {
    // `None` stages a delete.
    writes: BTreeMap<NativeKey, Option<PropertyBag>>,
    observed: HashMap<NativeKey, u64>,
    finished: bool,
}

impl TxState {
    fn observe(&mut self, state: &DatastoreState, key: &NativeKey) {
        self.observed
            .entry(key.clone())
            .or_insert_with(|| state.version(key));
    }
}

impl<'a> InMemoryTransaction<'a> {
    fn new(store: &'a InMemoryDatastore, options: TransactionOptions) -> Self {
        let id = uuid::Uuid::now_v7().to_string();
        debug!(tx = %id, read_only = options.read_only, "transaction started");
        Self {
            store,
            id,
            options,
            inner: Mutex::new(TxState::default()),
        }
    }

    // Lock order: store state first, then transaction state.
    fn tx_state(&self) -> StoreResult<MutexGuard<'_, TxState>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {e}")))
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        if self.options.read_only {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Number of staged writes (saves and deletes).
    pub fn pending_writes(&self) -> usize {
        self.tx_state().map(|s| s.writes.len()).unwrap_or(0)
    }
}

impl StoreClient for InMemoryTransaction<'_> {
    fn save(&self, key: &NativeKey, properties: &PropertyBag) -> StoreResult<NativeKey> {
        self.store.ensure_open()?;
        self.ensure_writable()?;
        // Ids are allocated eagerly from the shared sequence.
        let mut state = self.store.write_state()?;
        let key = state.complete_key(key)?;
        let mut tx = self.tx_state()?;
        tx.observe(&state, &key);
        tx.writes.insert(key.clone(), Some(properties.clone()));
        debug!(tx = %self.id, key = %key, "staged save");
        Ok(key)
    }

    fn lookup(&self, key: &NativeKey) -> StoreResult<Option<PropertyBag>> {
        self.store.ensure_open()?;
        require_complete(key)?;
        let state = self.store.read_state()?;
        let mut tx = self.tx_state()?;
        if let Some(staged) = tx.writes.get(key) {
            return Ok(staged.clone());
        }
        tx.observe(&state, key);
        Ok(state.records.get(key).cloned())
    }

    fn delete(&self, key: &NativeKey) -> StoreResult<()> {
        self.store.ensure_open()?;
        self.ensure_writable()?;
        require_complete(key)?;
        let state = self.store.read_state()?;
        let mut tx = self.tx_state()?;
        tx.observe(&state, key);
        tx.writes.insert(key.clone(), None);
        debug!(tx = %self.id, key = %key, "staged delete");
        Ok(())
    }

    fn run_query(&self, query: &NativeQuery) -> StoreResult<RowCursor<'_>> {
        self.store.ensure_open()?;
        query.validate()?;
        let rows = {
            let state = self.store.read_state()?;
            let mut tx = self.tx_state()?;
            let mut merged = state.rows_of_kind(&query.kind);
            for (key, staged) in tx.writes.iter().filter(|(k, _)| k.kind == query.kind) {
                match staged {
                    Some(properties) => {
                        merged.insert(key.clone(), properties.clone());
                    }
                    None => {
                        merged.remove(key);
                    }
                }
            }
            let rows = query.evaluate(
                merged
                    .into_iter()
                    .map(|(key, properties)| StoredEntity { key, properties }),
            );
            for row in &rows {
                tx.observe(&state, &row.key);
            }
            rows
        };
        debug!(tx = %self.id, kind = %query.kind, rows = rows.len(), "query executed");
        Ok(self.store.cursor(rows))
    }

    fn begin(&self, _options: TransactionOptions) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        Err(StoreError::NestedTransaction)
    }
}

impl StoreTransaction for InMemoryTransaction<'_> {
    fn id(&self) -> &str {
        &self.id
    }

    fn as_client(&self) -> &dyn StoreClient {
        self
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        self.store.ensure_open()?;
        let mut state = self.store.write_state()?;
        let mut tx = self.tx_state()?;
        tx.finished = true;

        // Read-only transactions are checked too: a read that raced a
        // commit would otherwise mix two states.
        for (key, version) in &tx.observed {
            if state.version(key) != *version {
                warn!(tx = %self.id, key = %key, "transaction conflict");
                return Err(StoreError::Conflict { key: key.clone() });
            }
        }

        let writes = std::mem::take(&mut tx.writes);
        let count = writes.len();
        for (key, staged) in writes {
            match staged {
                Some(properties) => state.put(key, properties),
                None => {
                    state.remove(&key);
                }
            }
        }
        debug!(tx = %self.id, writes = count, "transaction committed");
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StoreResult<()> {
        let mut tx = self.tx_state()?;
        tx.finished = true;
        debug!(tx = %self.id, discarded = tx.writes.len(), "transaction rolled back");
        tx.writes.clear();
        Ok(())
    }
}

impl Drop for InMemoryTransaction<'_> {
    fn drop(&mut self) {
        if let Ok(tx) = self.inner.get_mut() {
            if !tx.finished && !tx.writes.is_empty() {
                warn!(
                    tx = %self.id,
                    discarded = tx.writes.len(),
                    "transaction dropped without commit; rolling back"
                );
            }
        }
        if let Ok(mut state) = self.store.write_state() {
            state.transaction_finished();
        }
    }
}

impl std::fmt::Debug for InMemoryTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransaction")
            .field("id", &self.id)
            .field("read_only", &self.options.read_only)
            .field("pending_writes", &self.pending_writes())
            .finish()
    }
}
