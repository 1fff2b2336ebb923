use std::sync::Arc;

use kvmap_mapper::{Entity, MappedCollection};
use kvmap_store::StoreClient;
use kvmap_types::EntityId;
use tracing::debug;

use crate::collection::Collection;
use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::query::Query;

/// Per-collection operations: writes, point reads and key-ordered reads.
///
/// Every call is a fresh store round-trip. Nothing is cached.
pub struct Command<'a, E> {
    collection: Collection<'a, E>,
    config: &'a AdapterConfig,
}

impl<'a, E: Entity> Command<'a, E> {
    pub fn new(
        store: &'a dyn StoreClient,
        symbol: impl Into<String>,
        mapping: Arc<dyn MappedCollection<E>>,
        config: &'a AdapterConfig,
    ) -> Self {
        Self {
            collection: Collection::new(store, symbol, mapping),
            config,
        }
    }

    pub fn collection(&self) -> &Collection<'a, E> {
        &self.collection
    }

    /// Insert `entity` and return it with its store-assigned id.
    ///
    /// An entity that already carries an id is written under that id.
    pub fn create(&self, mut entity: E) -> AdapterResult<E> {
        self.collection.insert(&mut entity)?;
        Ok(entity)
    }

    /// Overwrite the record for an identified entity.
    ///
    /// With `strict_update` set, the record must already exist.
    pub fn update(&self, entity: E) -> AdapterResult<E> {
        if self.config.strict_update {
            let key = self.collection.identified_key(&entity, "update")?;
            let existing = self
                .collection
                .store()
                .lookup(&key)
                .map_err(AdapterError::read("update"))?;
            if existing.is_none() {
                return Err(AdapterError::NotFound(key));
            }
        }
        self.collection.write(&entity, "update")?;
        Ok(entity)
    }

    /// Create when the entity has no id, update otherwise.
    pub fn persist(&self, entity: E) -> AdapterResult<E> {
        if entity.id().is_some() {
            self.update(entity)
        } else {
            self.create(entity)
        }
    }

    /// Point lookup by id. A missing record is `Ok(None)`.
    pub fn find(&self, id: &EntityId) -> AdapterResult<Option<E>> {
        let key = self.collection.key_for(Some(id.clone()));
        let found = self
            .collection
            .store()
            .lookup(&key)
            .map_err(AdapterError::read("find"))?;
        debug!(collection = %self.collection.symbol(), key = %key, hit = found.is_some(), "find");
        match found {
            Some(properties) => Ok(Some(self.collection.mapping().deserialize(&key, properties)?)),
            None => Ok(None),
        }
    }

    /// Whether a record with `id` exists.
    pub fn exists(&self, id: &EntityId) -> AdapterResult<bool> {
        let key = self.collection.key_for(Some(id.clone()));
        let found = self
            .collection
            .store()
            .lookup(&key)
            .map_err(AdapterError::read("exists"))?;
        Ok(found.is_some())
    }

    /// Entity with the smallest key.
    pub fn first(&self) -> AdapterResult<Option<E>> {
        self.query().order(Query::<E>::KEY).first()
    }

    /// Entity with the largest key.
    pub fn last(&self) -> AdapterResult<Option<E>> {
        self.query().order_desc(Query::<E>::KEY).first()
    }

    /// Delete the record for an identified entity. Deleting a missing
    /// record succeeds.
    pub fn delete(&self, entity: &E) -> AdapterResult<()> {
        let key = self.collection.identified_key(entity, "delete")?;
        self.collection
            .store()
            .delete(&key)
            .map_err(AdapterError::write("delete"))?;
        debug!(collection = %self.collection.symbol(), key = %key, "deleted entity");
        Ok(())
    }

    pub fn delete_by_id(&self, id: &EntityId) -> AdapterResult<()> {
        let key = self.collection.key_for(Some(id.clone()));
        self.collection
            .store()
            .delete(&key)
            .map_err(AdapterError::write("delete"))?;
        debug!(collection = %self.collection.symbol(), key = %key, "deleted entity");
        Ok(())
    }

    /// A fresh query over this collection.
    pub fn query(&self) -> Query<'a, E> {
        Query::new(
            self.collection.store(),
            Arc::clone(self.collection.mapping()),
            self.config,
        )
    }
}
