//! In-memory checkpoint store for tests and throwaway runs.

use crate::checkpoint::{Checkpoint, CheckpointStore, SessionSummary};
use crate::error::StorageError;
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    latest: Mutex<BTreeMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        self.latest
            .lock()
            .insert(checkpoint.session_id.clone(), checkpoint.clone());
        Ok(())
    }

    fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>, StorageError> {
        Ok(self.latest.lock().get(session_id).cloned())
    }

    fn delete(&self, session_id: &str) -> Result<(), StorageError> {
        self.latest.lock().remove(session_id);
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StorageError> {
        Ok(self
            .latest
            .lock()
            .values()
            .map(|c| SessionSummary {
                session_id: c.session_id.clone(),
                step: c.step,
                created_at: c.created_at.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::fixtures;

    #[test]
    fn shared_behaviour() {
        fixtures::exercise_store(&MemoryCheckpointStore::new());
    }
}
