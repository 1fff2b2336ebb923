//! The [`Entity`] and [`MappedCollection`] traits.
//!
//! An entity is any application record with a mutable identity. A mapped
//! collection describes how one entity type is laid out in the store: the
//! native kind name, the attribute-to-property name mapping, and the
//! serialize/deserialize pair.

use kvmap_types::{EntityId, NativeKey, PropertyBag};

use crate::error::MappingResult;

/// An application record with a mutable identity.
///
/// `id()` is `None` until the first successful write; the adapter assigns
/// the store-allocated id through `set_id`.
pub trait Entity: Send + Sync + 'static {
    fn id(&self) -> Option<&EntityId>;

    fn set_id(&mut self, id: EntityId);
}

/// Mapping metadata for one entity type.
///
/// Implementations are immutable after construction and shared between
/// threads.
pub trait MappedCollection<E>: Send + Sync {
    /// Native kind name in the store.
    fn kind(&self) -> &str;

    /// Native property name for an entity attribute.
    fn native_property(&self, attribute: &str) -> String {
        attribute.to_string()
    }

    /// Entity attributes to a property bag. The identity is not part of the bag.
    fn serialize(&self, entity: &E) -> MappingResult<PropertyBag>;

    /// Stored record back to an entity, with its identity taken from `key`.
    fn deserialize(&self, key: &NativeKey, properties: PropertyBag) -> MappingResult<E>;
}
