//! sled trees backing the session log.
//!
//! Events live under `session \0 seq` with the sequence big-endian, so a
//! prefix scan already yields them in emission order.

use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

use crate::error::StorageError;
use crate::progress::event::ProgressEvent;
use crate::storage::{to_storage_data, to_storage_io};

const TREE_EVENTS: &str = "run_events";
const TREE_META: &str = "run_event_meta";

/// Per-session bookkeeping for sequence allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub next_seq: u64,
    pub updated_at_ms: u64,
}

#[derive(Clone)]
pub struct EventStore {
    db: Db,
    events: Tree,
    meta: Tree,
}

impl EventStore {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        Ok(Self {
            events: db.open_tree(TREE_EVENTS).map_err(to_storage_io)?,
            meta: db.open_tree(TREE_META).map_err(to_storage_io)?,
            db,
        })
    }

    pub fn meta(&self, session_id: &str) -> Result<Option<SessionMeta>, StorageError> {
        match self.meta.get(session_id.as_bytes()).map_err(to_storage_io)? {
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(to_storage_data),
            None => Ok(None),
        }
    }

    pub fn set_meta(&self, session_id: &str, meta: &SessionMeta) -> Result<(), StorageError> {
        let raw = serde_json::to_vec(meta).map_err(to_storage_data)?;
        self.meta
            .insert(session_id.as_bytes(), raw)
            .map_err(to_storage_io)?;
        Ok(())
    }

    pub fn append(&self, event: &ProgressEvent) -> Result<(), StorageError> {
        let raw = serde_json::to_vec(event).map_err(to_storage_data)?;
        self.events
            .insert(event_key(&event.session, event.seq), raw)
            .map_err(to_storage_io)?;
        Ok(())
    }

    /// Events of `session_id` in sequence order.
    pub fn events(&self, session_id: &str) -> Result<Vec<ProgressEvent>, StorageError> {
        self.events
            .scan_prefix(session_prefix(session_id))
            .values()
            .map(|raw| {
                let raw = raw.map_err(to_storage_io)?;
                serde_json::from_slice(&raw).map_err(to_storage_data)
            })
            .collect()
    }

    pub fn remove_session(&self, session_id: &str) -> Result<(), StorageError> {
        self.meta
            .remove(session_id.as_bytes())
            .map_err(to_storage_io)?;
        let keys = self
            .events
            .scan_prefix(session_prefix(session_id))
            .keys()
            .collect::<Result<Vec<_>, _>>()
            .map_err(to_storage_io)?;
        for key in keys {
            self.events.remove(key).map_err(to_storage_io)?;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }
}

fn session_prefix(session_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(session_id.len() + 1);
    prefix.extend_from_slice(session_id.as_bytes());
    prefix.push(0);
    prefix
}

fn event_key(session_id: &str, seq: u64) -> Vec<u8> {
    let mut key = session_prefix(session_id);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn keys_order_by_sequence() {
        assert!(event_key("run", 9) < event_key("run", 10));
        assert!(event_key("run", u64::MAX) < session_prefix("run-2"));
    }

    #[test]
    fn events_come_back_in_order_per_session() {
        let dir = TempDir::new().unwrap();
        let store = EventStore::new(sled::open(dir.path()).unwrap()).unwrap();

        store
            .append(&ProgressEvent::new("abc", 2, "step_completed", json!({"step": 0})))
            .unwrap();
        store
            .append(&ProgressEvent::new("abc", 1, "step_started", json!({"step": 0})))
            .unwrap();
        store
            .append(&ProgressEvent::new("abcd", 1, "step_started", json!({})))
            .unwrap();

        let seqs: Vec<u64> = store.events("abc").unwrap().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2]);

        store.remove_session("abc").unwrap();
        assert!(store.events("abc").unwrap().is_empty());
        assert_eq!(store.events("abcd").unwrap().len(), 1);
    }
}
