//! Staged generation pipeline.
//!
//! Eight fixed steps turn a free-form request into a validated workout store:
//! summarize, plan, emit equipment, emit exercises, emit workouts, assemble,
//! repair and resolve. Each completed step is checkpointed so a run can be
//! resumed after any failure without redoing finished work.

pub mod emitters;
pub mod finalize;
pub mod orchestrator;
pub mod planning;
pub mod state;

pub use orchestrator::Pipeline;
pub use state::{RunInput, Step, StepOutputs, StepTiming};

use crate::emission::{AuditRecord, FailurePolicy};
use crate::error::PipelineError;
use crate::model::WorkoutStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tunables for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// In-flight emission limit; `None` uses the engine default.
    pub max_workers: Option<usize>,
    pub fail_fast: bool,
    pub contract_retry_budget: usize,
    pub plan_attempts: usize,
    pub heal_attempts: u32,
    pub repair_max_attempts: usize,
    pub accept_best_effort: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_workers: None,
            fail_fast: false,
            contract_retry_budget: 2,
            plan_attempts: 3,
            heal_attempts: 2,
            repair_max_attempts: 6,
            accept_best_effort: false,
        }
    }
}

impl PipelineOptions {
    pub fn failure_policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Continue
        }
    }
}

/// A finished run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub session_id: String,
    /// Final document with every placeholder resolved.
    pub store: Value,
    /// Schema errors left when repair settled for best effort.
    pub residual_errors: Option<usize>,
    pub timing: StepTiming,
    pub audits: Vec<AuditRecord>,
}

impl PipelineResult {
    pub fn typed_store(&self) -> Result<WorkoutStore, PipelineError> {
        serde_json::from_value(self.store.clone()).map_err(|e| {
            PipelineError::Schema(format!("Final store does not match the store model: {}", e))
        })
    }
}
