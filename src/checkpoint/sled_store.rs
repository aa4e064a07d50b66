//! Sled-backed checkpoint store.

use crate::checkpoint::{session_prefix, Checkpoint, CheckpointStore, SessionSummary};
use crate::error::StorageError;
use crate::storage::{open_db, to_storage_data, to_storage_io};
use sled::Tree;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const TREE_CHECKPOINTS: &str = "checkpoints";

pub struct SledCheckpointStore {
    db: sled::Db,
    tree: Tree,
}

impl SledCheckpointStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::from_db(open_db(path)?)
    }

    /// Share an already-open database, e.g. with the session log.
    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let tree = db.open_tree(TREE_CHECKPOINTS).map_err(to_storage_io)?;
        Ok(Self { db, tree })
    }

    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn session_keys(&self, session_id: &str) -> Result<Vec<sled::IVec>, StorageError> {
        self.tree
            .scan_prefix(session_prefix(session_id))
            .keys()
            .map(|k| k.map_err(to_storage_io))
            .collect()
    }
}

impl CheckpointStore for SledCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let key = checkpoint.key();
        let value = serde_json::to_vec(checkpoint).map_err(to_storage_data)?;
        self.tree
            .insert(key.as_slice(), value)
            .map_err(to_storage_io)?;
        for old in self.session_keys(&checkpoint.session_id)? {
            if old.as_ref() != key.as_slice() {
                self.tree.remove(old).map_err(to_storage_io)?;
            }
        }
        self.db.flush().map_err(to_storage_io)?;
        debug!(session_id = %checkpoint.session_id, step = %checkpoint.step, "checkpoint saved");
        Ok(())
    }

    fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>, StorageError> {
        let Some(entry) = self.tree.scan_prefix(session_prefix(session_id)).next_back() else {
            return Ok(None);
        };
        let (_, value) = entry.map_err(to_storage_io)?;
        let checkpoint = serde_json::from_slice(&value).map_err(to_storage_data)?;
        Ok(Some(checkpoint))
    }

    fn delete(&self, session_id: &str) -> Result<(), StorageError> {
        for key in self.session_keys(session_id)? {
            self.tree.remove(key).map_err(to_storage_io)?;
        }
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StorageError> {
        let mut latest: BTreeMap<String, SessionSummary> = BTreeMap::new();
        for entry in self.tree.iter() {
            let (_, value) = entry.map_err(to_storage_io)?;
            let checkpoint: Checkpoint =
                serde_json::from_slice(&value).map_err(to_storage_data)?;
            let summary = SessionSummary {
                session_id: checkpoint.session_id.clone(),
                step: checkpoint.step,
                created_at: checkpoint.created_at,
            };
            match latest.get(&summary.session_id) {
                Some(existing) if existing.step >= summary.step => {}
                _ => {
                    latest.insert(summary.session_id.clone(), summary);
                }
            }
        }
        Ok(latest.into_values().collect())
    }
}
