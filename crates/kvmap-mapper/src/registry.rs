//! Collection symbol resolution.
//!
//! [`MapperRegistry`] maps collection symbols (e.g. `"widgets"`) to the
//! [`MappedCollection`] for one entity type. Resolution is typed: asking for
//! a collection with the wrong entity type is an error, not a downcast panic.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::sync::Arc;

use kvmap_types::validate_kind;
use tracing::debug;

use crate::error::{MappingError, MappingResult};
use crate::traits::{Entity, MappedCollection};

struct Registered {
    kind: String,
    entity_type: &'static str,
    // Holds an `Arc<dyn MappedCollection<E>>` for the registered `E`.
    mapping: Arc<dyn Any + Send + Sync>,
}

/// Registry of mapped collections keyed by collection symbol.
#[derive(Default)]
pub struct MapperRegistry {
    collections: BTreeMap<String, Registered>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `mapping` for entity type `E` under `symbol`.
    ///
    /// Fails if the symbol is already taken or the mapping's kind is not a
    /// valid native kind name.
    pub fn register<E, M>(&mut self, symbol: impl Into<String>, mapping: M) -> MappingResult<()>
    where
        E: Entity,
        M: MappedCollection<E> + 'static,
    {
        let symbol = symbol.into();
        if self.collections.contains_key(&symbol) {
            return Err(MappingError::DuplicateCollection(symbol));
        }
        validate_kind(mapping.kind())?;

        let kind = mapping.kind().to_string();
        let mapping: Arc<dyn MappedCollection<E>> = Arc::new(mapping);
        debug!(collection = %symbol, kind = %kind, entity = type_name::<E>(), "registered collection");
        self.collections.insert(
            symbol,
            Registered {
                kind,
                entity_type: type_name::<E>(),
                mapping: Arc::new(mapping),
            },
        );
        Ok(())
    }

    /// Resolve `symbol` to the mapping for entity type `E`.
    pub fn resolve<E: Entity>(&self, symbol: &str) -> MappingResult<Arc<dyn MappedCollection<E>>> {
        let registered = self
            .collections
            .get(symbol)
            .ok_or_else(|| MappingError::UnmappedCollection(symbol.to_string()))?;
        registered
            .mapping
            .downcast_ref::<Arc<dyn MappedCollection<E>>>()
            .cloned()
            .ok_or_else(|| MappingError::TypeMismatch {
                collection: symbol.to_string(),
                expected: type_name::<E>(),
                actual: registered.entity_type,
            })
    }

    /// Native kind registered under `symbol`.
    pub fn kind_of(&self, symbol: &str) -> Option<&str> {
        self.collections.get(symbol).map(|r| r.kind.as_str())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.collections.contains_key(symbol)
    }

    /// Registered symbols in sorted order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.collections.iter().map(|(s, r)| (s, &r.kind)))
            .finish()
    }
}
