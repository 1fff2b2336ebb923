//! JSON snapshots of an [`InMemoryDatastore`].
//!
//! Snapshots let short-lived processes (the CLI in particular) keep a
//! datastore between runs. Writes go to a temporary file in the target
//! directory first and are renamed into place, so a crash never leaves a
//! half-written snapshot behind.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::memory::{DatastoreState, InMemoryDatastore};
use crate::traits::StoredEntity;

/// Serializable image of a datastore: every record plus the id sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatastoreSnapshot {
    pub next_id: i64,
    pub entities: Vec<StoredEntity>,
}

impl InMemoryDatastore {
    /// Capture every committed record in key order.
    pub fn snapshot(&self) -> StoreResult<DatastoreSnapshot> {
        let state = self.read_state()?;
        Ok(DatastoreSnapshot {
            next_id: state.next_id.max(1),
            entities: state
                .records
                .iter()
                .map(|(key, properties)| StoredEntity {
                    key: key.clone(),
                    properties: properties.clone(),
                })
                .collect(),
        })
    }

    /// Rebuild a datastore from a snapshot.
    ///
    /// Every key must be complete and valid. The id sequence resumes past
    /// both the recorded `next_id` and the largest stored numeric id.
    pub fn from_snapshot(snapshot: DatastoreSnapshot) -> StoreResult<Self> {
        let mut state = DatastoreState::default();
        for entity in snapshot.entities {
            if !entity.key.is_complete() {
                return Err(StoreError::IncompleteKey(entity.key));
            }
            kvmap_types::validate_kind(&entity.key.kind)?;
            if let Some(id) = &entity.key.id {
                id.validate()?;
                state.reserve(id);
            }
            state.put(entity.key, entity.properties);
        }
        state.next_id = state.next_id.max(snapshot.next_id).max(1);
        Ok(Self::from_state(state))
    }

    /// Write a snapshot to `path` atomically.
    pub fn save_snapshot(&self, path: &Path) -> StoreResult<()> {
        let snapshot = self.snapshot()?;
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;

        debug!(path = %path.display(), records = snapshot.entities.len(), "snapshot saved");
        Ok(())
    }

    /// Load a datastore from a snapshot file.
    pub fn load_snapshot(path: &Path) -> StoreResult<Self> {
        let bytes = std::fs::read(path)?;
        let snapshot: DatastoreSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        debug!(path = %path.display(), records = snapshot.entities.len(), "snapshot loaded");
        Self::from_snapshot(snapshot)
    }

    /// Load `path` if it exists, otherwise start empty.
    pub fn open_snapshot(path: &Path) -> StoreResult<Self> {
        if path.exists() {
            Self::load_snapshot(path)
        } else {
            Ok(Self::new())
        }
    }
}
