//! Sequenced, best-effort event emission for one pipeline session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::StorageError;
use crate::progress::event::ProgressEvent;
use crate::progress::store::{EventStore, SessionMeta};
use crate::storage::to_storage_data;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Appends events with strictly increasing sequence numbers per session.
pub struct SessionLog {
    store: EventStore,
    // Serializes read-modify-write of the per-session sequence.
    seq_lock: Mutex<()>,
}

impl SessionLog {
    pub fn new(db: sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            store: EventStore::new(db)?,
            seq_lock: Mutex::new(()),
        })
    }

    pub fn emit(&self, session_id: &str, event_type: &str, data: Value) -> Result<u64, StorageError> {
        let _guard = self.seq_lock.lock();
        let seq = self
            .store
            .meta(session_id)?
            .map(|m| m.next_seq)
            .unwrap_or(1);
        self.store
            .append(&ProgressEvent::new(session_id, seq, event_type, data))?;
        self.store.set_meta(
            session_id,
            &SessionMeta {
                next_seq: seq + 1,
                updated_at_ms: now_millis(),
            },
        )?;
        self.store.flush()?;
        Ok(seq)
    }

    /// Emit a typed payload.
    pub fn emit_data<T: Serialize>(
        &self,
        session_id: &str,
        event_type: &str,
        data: &T,
    ) -> Result<u64, StorageError> {
        let value = serde_json::to_value(data).map_err(to_storage_data)?;
        self.emit(session_id, event_type, value)
    }

    pub fn emit_best_effort<T: Serialize>(&self, session_id: &str, event_type: &str, data: &T) {
        if let Err(err) = self.emit_data(session_id, event_type, data) {
            warn!(
                session_id = %session_id,
                event_type = %event_type,
                error = %err,
                "failed to emit session event"
            );
        }
    }

    pub fn events(&self, session_id: &str) -> Result<Vec<ProgressEvent>, StorageError> {
        self.store.events(session_id)
    }

    pub fn clear(&self, session_id: &str) -> Result<(), StorageError> {
        let _guard = self.seq_lock.lock();
        self.store.remove_session(session_id)?;
        self.store.flush()
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn new_session_id() -> String {
    let ts = now_millis();
    let pid = std::process::id();
    let seq = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("sess-{ts}-{pid}-{seq}")
}
