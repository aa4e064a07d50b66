//! Per-session durable event log.

pub mod event;
pub mod session;
pub mod store;

pub use event::{EmissionProgressData, ProgressEvent, RepairAttemptData, StepEventData};
pub use session::{new_session_id, now_millis, SessionLog};
pub use store::{EventStore, SessionMeta};
