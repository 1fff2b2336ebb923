//! Entity mapping for kvmap.
//!
//! This crate is the adapter's only source of (de)serialization: it turns
//! application entities into [`PropertyBag`](kvmap_types::PropertyBag)s and
//! back, and it resolves collection symbols to mapping metadata.
//!
//! # Modules
//!
//! - [`error`]: Error types for mapping operations
//! - [`traits`]: The [`Entity`] and [`MappedCollection`] traits
//! - [`serde_mapping`]: [`SerdeMapping`], a mapping for any `serde` entity
//! - [`document`]: [`Document`], a schemaless entity
//! - [`registry`]: [`MapperRegistry`] for symbol → mapping resolution

pub mod document;
pub mod error;
pub mod registry;
pub mod serde_mapping;
pub mod traits;

pub use document::Document;
pub use error::{MappingError, MappingResult};
pub use registry::MapperRegistry;
pub use serde_mapping::{json_to_value, value_to_json, SerdeMapping};
pub use traits::{Entity, MappedCollection};
