//! Foundation types for kvmap.
//!
//! This crate provides the store-agnostic data model shared by every other
//! kvmap crate: what a stored record looks like and how it is addressed.
//!
//! # Key Types
//!
//! - [`Value`]: A single property value (scalar or compound)
//! - [`PropertyBag`]: Name-ordered mapping of property names to values
//! - [`EntityId`]: Numeric or named identity of one record
//! - [`NativeKey`]: (kind, id) pair locating a record in the key space

pub mod error;
pub mod key;
pub mod property;
pub mod value;

pub use error::TypeError;
pub use key::{validate_kind, EntityId, NativeKey, KEY_PROPERTY};
pub use property::PropertyBag;
pub use value::Value;
