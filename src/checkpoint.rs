//! Per-session, per-step checkpoints.
//!
//! A checkpoint is written after every completed step and supersedes the
//! previous one for that session. Final success deletes it; any failure
//! leaves the latest one in place for `resume`.

pub mod memory;
pub mod sled_store;

pub use memory::MemoryCheckpointStore;
pub use sled_store::SledCheckpointStore;

use crate::error::StorageError;
use crate::identity::IdentitySnapshot;
use crate::pipeline::state::{Step, StepOutputs, StepTiming};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub session_id: String,
    /// Last completed step.
    pub step: Step,
    pub outputs: StepOutputs,
    pub timing: StepTiming,
    pub identity: IdentitySnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    pub conversation_hash: String,
    /// RFC 3339.
    pub created_at: String,
}

impl Checkpoint {
    pub fn key(&self) -> Vec<u8> {
        checkpoint_key(&self.session_id, self.step)
    }
}

/// Session summary for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub step: Step,
    pub created_at: String,
}

/// Key prefix shared by every checkpoint of `session_id`.
///
/// The `\0` terminator keeps `a` from matching keys of `a:b` or `a1`.
pub fn session_prefix(session_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(session_id.len() + 1);
    prefix.extend_from_slice(session_id.as_bytes());
    prefix.push(0);
    prefix
}

/// Session prefix followed by the step index, so a session's keys sort by step.
pub fn checkpoint_key(session_id: &str, step: Step) -> Vec<u8> {
    let mut key = session_prefix(session_id);
    key.push(step.index());
    key
}

pub trait CheckpointStore: Send + Sync {
    /// Persist `checkpoint` durably and drop earlier steps of its session.
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StorageError>;

    /// Highest-step checkpoint for `session_id`.
    fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>, StorageError>;

    /// Remove every checkpoint of `session_id`.
    fn delete(&self, session_id: &str) -> Result<(), StorageError>;

    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StorageError>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::pipeline::state::RunInput;

    pub fn checkpoint(session_id: &str, step: Step) -> Checkpoint {
        let input = RunInput::new("two full-body days");
        Checkpoint {
            session_id: session_id.to_string(),
            step,
            conversation_hash: input.conversation_hash(),
            outputs: StepOutputs::new(input),
            timing: StepTiming::default(),
            identity: IdentitySnapshot::default(),
            custom_instructions: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Behaviour every store must share.
    pub fn exercise_store(store: &dyn CheckpointStore) {
        assert!(store.load_latest("a").unwrap().is_none());

        store.save(&checkpoint("a", Step::Summarize)).unwrap();
        store.save(&checkpoint("a", Step::EmitExercises)).unwrap();
        store.save(&checkpoint("b", Step::Plan)).unwrap();

        let latest = store.load_latest("a").unwrap().unwrap();
        assert_eq!(latest.step, Step::EmitExercises);

        let sessions = store.list_sessions().unwrap();
        let steps: Vec<(&str, Step)> = sessions
            .iter()
            .map(|s| (s.session_id.as_str(), s.step))
            .collect();
        assert_eq!(steps, vec![("a", Step::EmitExercises), ("b", Step::Plan)]);

        store.delete("a").unwrap();
        assert!(store.load_latest("a").unwrap().is_none());
        assert!(store.load_latest("b").unwrap().is_some());

        // one id is a prefix of the other
        store.save(&checkpoint("a:b", Step::Repair)).unwrap();
        store.save(&checkpoint("a", Step::Plan)).unwrap();
        let nested = store.load_latest("a:b").unwrap().unwrap();
        assert_eq!((nested.session_id.as_str(), nested.step), ("a:b", Step::Repair));
        let short = store.load_latest("a").unwrap().unwrap();
        assert_eq!((short.session_id.as_str(), short.step), ("a", Step::Plan));

        store.delete("a").unwrap();
        assert!(store.load_latest("a").unwrap().is_none());
        assert_eq!(store.load_latest("a:b").unwrap().unwrap().step, Step::Repair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_by_step() {
        assert_eq!(checkpoint_key("s", Step::Repair), b"s\0\x06".to_vec());
        assert!(checkpoint_key("s", Step::Plan) < checkpoint_key("s", Step::Assemble));
    }

    #[test]
    fn prefix_does_not_cover_longer_session_ids() {
        let prefix = session_prefix("a");
        assert!(!checkpoint_key("a:b", Step::Plan).starts_with(&prefix));
        assert!(!checkpoint_key("a1", Step::Plan).starts_with(&prefix));
        assert!(checkpoint_key("a", Step::Resolve).starts_with(&prefix));
    }
}
