use kvmap_mapper::{Entity, MapperRegistry};
use kvmap_store::StoreClient;
use kvmap_types::EntityId;
use tracing::warn;

use crate::command::Command;
use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::query::Query;

/// Collection-addressed operations against one store scope.
///
/// The scope is either the adapter's base client or an open transaction;
/// the operations behave the same in both.
#[derive(Clone, Copy)]
pub struct Session<'a> {
    store: &'a dyn StoreClient,
    registry: &'a MapperRegistry,
    config: &'a AdapterConfig,
}

impl<'a> Session<'a> {
    pub fn new(
        store: &'a dyn StoreClient,
        registry: &'a MapperRegistry,
        config: &'a AdapterConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    pub fn store(&self) -> &'a dyn StoreClient {
        self.store
    }

    /// Command object for the collection registered under `symbol`.
    pub fn command<E: Entity>(&self, symbol: &str) -> AdapterResult<Command<'a, E>> {
        let mapping = self.registry.resolve::<E>(symbol)?;
        Ok(Command::new(self.store, symbol, mapping, self.config))
    }

    /// Deferred query over the collection registered under `symbol`.
    pub fn query<E: Entity>(&self, symbol: &str) -> AdapterResult<Query<'a, E>> {
        Ok(self.command::<E>(symbol)?.query())
    }

    /// Deferred query with a block of clauses applied.
    pub fn query_with<E, F>(&self, symbol: &str, configure: F) -> AdapterResult<Query<'a, E>>
    where
        E: Entity,
        F: FnOnce(Query<'a, E>) -> Query<'a, E>,
    {
        Ok(self.query::<E>(symbol)?.configure(configure))
    }

    // ---- Record operations ----

    pub fn create<E: Entity>(&self, symbol: &str, entity: E) -> AdapterResult<E> {
        self.command::<E>(symbol)?.create(entity)
    }

    pub fn update<E: Entity>(&self, symbol: &str, entity: E) -> AdapterResult<E> {
        self.command::<E>(symbol)?.update(entity)
    }

    pub fn persist<E: Entity>(&self, symbol: &str, entity: E) -> AdapterResult<E> {
        self.command::<E>(symbol)?.persist(entity)
    }

    pub fn find<E: Entity>(&self, symbol: &str, id: &EntityId) -> AdapterResult<Option<E>> {
        self.command::<E>(symbol)?.find(id)
    }

    pub fn first<E: Entity>(&self, symbol: &str) -> AdapterResult<Option<E>> {
        self.command::<E>(symbol)?.first()
    }

    pub fn last<E: Entity>(&self, symbol: &str) -> AdapterResult<Option<E>> {
        self.command::<E>(symbol)?.last()
    }

    pub fn delete<E: Entity>(&self, symbol: &str, entity: &E) -> AdapterResult<()> {
        self.command::<E>(symbol)?.delete(entity)
    }

    // ---- Unsupported on key-value stores ----

    /// Bulk removal of a collection. Key-value stores have no such primitive.
    pub fn clear(&self, symbol: &str) -> AdapterResult<()> {
        unsupported("clear", symbol)
    }

    /// Bulk fetch by ids.
    pub fn fetch<E: Entity>(&self, symbol: &str, _ids: &[EntityId]) -> AdapterResult<Vec<E>> {
        unsupported("fetch", symbol)
    }

    /// Raw statement execution.
    pub fn execute(&self, statement: &str) -> AdapterResult<()> {
        unsupported("execute", statement)
    }
}

fn unsupported<T>(operation: &'static str, target: &str) -> AdapterResult<T> {
    warn!(operation, target, "operation not supported by key-value stores");
    Err(AdapterError::UnsupportedOperation { operation })
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("registry", self.registry)
            .field("config", self.config)
            .finish()
    }
}
