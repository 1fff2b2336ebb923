use std::sync::Arc;

use kvmap_mapper::{Entity, MappedCollection};
use kvmap_store::{StoreClient, StoreError};
use kvmap_types::{EntityId, NativeKey};
use tracing::debug;

use crate::error::{AdapterError, AdapterResult};

/// One mapped collection bound to a store client.
///
/// Owns the write path shared by every command: key construction,
/// serialization through the mapping, and the store round-trip.
pub struct Collection<'a, E> {
    store: &'a dyn StoreClient,
    symbol: String,
    mapping: Arc<dyn MappedCollection<E>>,
}

impl<'a, E: Entity> Collection<'a, E> {
    pub fn new(
        store: &'a dyn StoreClient,
        symbol: impl Into<String>,
        mapping: Arc<dyn MappedCollection<E>>,
    ) -> Self {
        Self {
            store,
            symbol: symbol.into(),
            mapping,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn kind(&self) -> &str {
        self.mapping.kind()
    }

    pub fn store(&self) -> &'a dyn StoreClient {
        self.store
    }

    pub fn mapping(&self) -> &Arc<dyn MappedCollection<E>> {
        &self.mapping
    }

    /// Native key for `id`, or an incomplete key when `id` is `None`.
    pub fn key_for(&self, id: Option<EntityId>) -> NativeKey {
        self.store.key(self.mapping.kind(), id)
    }

    /// Save `entity` and write the resulting id back into it.
    ///
    /// Without an id the store allocates one. With an id this overwrites.
    pub fn insert(&self, entity: &mut E) -> AdapterResult<NativeKey> {
        let key = self.key_for(entity.id().cloned());
        let properties = self.mapping.serialize(entity)?;
        let saved = self
            .store
            .save(&key, &properties)
            .map_err(AdapterError::write("create"))?;

        let Some(id) = saved.id.clone() else {
            return Err(AdapterError::StoreWrite {
                operation: "create",
                source: StoreError::IncompleteKey(saved),
            });
        };
        entity.set_id(id);
        debug!(collection = %self.symbol, key = %saved, "saved entity");
        Ok(saved)
    }

    /// Save an entity that already carries an id.
    pub fn write(&self, entity: &E, operation: &'static str) -> AdapterResult<NativeKey> {
        let key = self.identified_key(entity, operation)?;
        let properties = self.mapping.serialize(entity)?;
        let saved = self
            .store
            .save(&key, &properties)
            .map_err(AdapterError::write(operation))?;
        debug!(collection = %self.symbol, key = %saved, operation, "wrote entity");
        Ok(saved)
    }

    /// Complete key of an entity, failing when it has no id yet.
    pub fn identified_key(&self, entity: &E, operation: &'static str) -> AdapterResult<NativeKey> {
        match entity.id() {
            Some(id) => Ok(self.key_for(Some(id.clone()))),
            None => Err(AdapterError::IdentityRequired {
                operation,
                collection: self.symbol.clone(),
            }),
        }
    }
}
