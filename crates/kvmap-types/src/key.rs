use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Pseudo-property addressing the native key in filters and orders.
pub const KEY_PROPERTY: &str = "__key__";

/// Identity of one record within a kind.
///
/// Records are identified either by a positive numeric id (usually allocated
/// by the store on first save) or by a caller-chosen name. In native key
/// order every numeric id sorts before every name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric id, strictly positive.
    Id(i64),
    /// Caller-chosen string name.
    Name(String),
}

impl EntityId {
    /// Check the id against the key-space rules.
    ///
    /// Numeric ids must be positive. Names must be non-empty and must not use
    /// the reserved `__` prefix.
    pub fn validate(&self) -> Result<(), TypeError> {
        match self {
            EntityId::Id(id) if *id <= 0 => Err(TypeError::InvalidId {
                id: id.to_string(),
                reason: "numeric ids must be positive".into(),
            }),
            EntityId::Name(name) if name.is_empty() => Err(TypeError::InvalidId {
                id: String::new(),
                reason: "names must not be empty".into(),
            }),
            EntityId::Name(name) if name.starts_with("__") => Err(TypeError::InvalidId {
                id: name.clone(),
                reason: "names starting with '__' are reserved".into(),
            }),
            _ => Ok(()),
        }
    }

    /// The numeric id, if this is one.
    pub fn as_id(&self) -> Option<i64> {
        match self {
            EntityId::Id(id) => Some(*id),
            EntityId::Name(_) => None,
        }
    }

    /// The name, if this is one.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            EntityId::Id(_) => None,
            EntityId::Name(name) => Some(name),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Id(id) => write!(f, "{id}"),
            EntityId::Name(name) => write!(f, "{name:?}"),
        }
    }
}

/// Parses all-digit text as a numeric id and anything else as a name.
impl FromStr for EntityId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            let n = s.parse::<i64>().map_err(|e| TypeError::InvalidId {
                id: s.to_string(),
                reason: e.to_string(),
            })?;
            EntityId::Id(n)
        } else {
            EntityId::Name(s.to_string())
        };
        id.validate()?;
        Ok(id)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Id(id)
    }
}

impl From<&str> for EntityId {
    fn from(name: &str) -> Self {
        EntityId::Name(name.to_string())
    }
}

impl From<String> for EntityId {
    fn from(name: String) -> Self {
        EntityId::Name(name)
    }
}

/// Location of one record in the store's key space.
///
/// A key without an id is *incomplete*: saving it asks the store to allocate
/// an id. Lookups and deletes need a complete key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NativeKey {
    pub kind: String,
    pub id: Option<EntityId>,
}

impl NativeKey {
    pub fn new(kind: impl Into<String>, id: Option<EntityId>) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }

    /// A key whose id the store will allocate.
    pub fn incomplete(kind: impl Into<String>) -> Self {
        Self::new(kind, None)
    }

    pub fn is_complete(&self) -> bool {
        self.id.is_some()
    }

    /// The same kind with the given id.
    pub fn with_id(&self, id: EntityId) -> Self {
        Self::new(self.kind.clone(), Some(id))
    }
}

impl fmt::Display for NativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}({id})", self.kind),
            None => write!(f, "{}(?)", self.kind),
        }
    }
}

/// Validate a kind name.
///
/// Kinds must be non-empty, must not use the reserved `__` prefix and must
/// not contain whitespace or control characters.
pub fn validate_kind(kind: &str) -> Result<(), TypeError> {
    if kind.is_empty() {
        return Err(TypeError::InvalidKind {
            kind: kind.to_string(),
            reason: "kind must not be empty".into(),
        });
    }
    if kind.starts_with("__") {
        return Err(TypeError::InvalidKind {
            kind: kind.to_string(),
            reason: "kinds starting with '__' are reserved".into(),
        });
    }
    if let Some(ch) = kind.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(TypeError::InvalidKind {
            kind: kind.to_string(),
            reason: format!("contains forbidden character: {ch:?}"),
        });
    }
    Ok(())
}
