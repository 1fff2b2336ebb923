use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, AdapterResult};

/// Adapter behaviour knobs.
///
/// Loadable from TOML; every field is optional there:
///
/// ```toml
/// strict_update = true
/// default_limit = 100
/// max_limit = 1000
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterConfig {
    /// When `true`, `update` of an id with no stored record fails with
    /// `NotFound` instead of creating it.
    pub strict_update: bool,
    /// Limit applied to queries that do not set one.
    pub default_limit: Option<usize>,
    /// Queries asking for more rows are clamped to this many.
    pub max_limit: Option<usize>,
}

impl AdapterConfig {
    pub fn from_toml_str(text: &str) -> AdapterResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| AdapterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> AdapterResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AdapterError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> AdapterResult<()> {
        if self.max_limit == Some(0) {
            return Err(AdapterError::Config("max_limit must be positive".into()));
        }
        if let (Some(default), Some(max)) = (self.default_limit, self.max_limit) {
            if default > max {
                return Err(AdapterError::Config(format!(
                    "default_limit {default} exceeds max_limit {max}"
                )));
            }
        }
        Ok(())
    }

    /// The limit a query actually runs with.
    pub fn effective_limit(&self, requested: Option<usize>) -> Option<usize> {
        let limit = requested.or(self.default_limit);
        match (limit, self.max_limit) {
            (Some(l), Some(max)) => Some(l.min(max)),
            (None, Some(max)) => Some(max),
            (l, None) => l,
        }
    }
}
