//! Records in the run event log and their typed payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of a session's event log. `seq` starts at 1 and has no gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub session: String,
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

impl ProgressEvent {
    pub fn new(session: impl Into<String>, seq: u64, event_type: impl Into<String>, data: Value) -> Self {
        Self {
            session: session.into(),
            seq,
            event_type: event_type.into(),
            data,
        }
    }
}

/// Payload of `step_started` / `step_completed` / `step_failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEventData {
    pub step: u8,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionProgressData {
    pub label: String,
    pub item_id: String,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairAttemptData {
    pub attempt: usize,
    pub phase: String,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
