//! Per-run state carried between steps and persisted in checkpoints.

use crate::assembly::EmittedItems;
use crate::emission::AuditRecord;
use crate::model::{PlanIndex, ProvidedEquipment, StoreSettings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// The fixed step sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Summarize,
    Plan,
    EmitEquipment,
    EmitExercises,
    EmitWorkouts,
    Assemble,
    Repair,
    Resolve,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::Summarize,
        Step::Plan,
        Step::EmitEquipment,
        Step::EmitExercises,
        Step::EmitWorkouts,
        Step::Assemble,
        Step::Repair,
        Step::Resolve,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Step> {
        Step::ALL.get(index as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Step::Summarize => "summarize",
            Step::Plan => "plan",
            Step::EmitEquipment => "emit_equipment",
            Step::EmitExercises => "emit_exercises",
            Step::EmitWorkouts => "emit_workouts",
            Step::Assemble => "assemble",
            Step::Repair => "repair",
            Step::Resolve => "resolve",
        }
    }

    pub fn next(self) -> Option<Step> {
        Step::from_index(self.index() + 1)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index(), self.name())
    }
}

/// Everything the caller supplies for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    pub request: String,
    #[serde(default)]
    pub provided: ProvidedEquipment,
    #[serde(default)]
    pub settings: StoreSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

impl RunInput {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            ..Self::default()
        }
    }

    /// blake3 over everything that shapes the conversation with the generator.
    pub fn conversation_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.request.as_bytes());
        hasher.update(&[0]);
        if let Some(instructions) = &self.custom_instructions {
            hasher.update(instructions.as_bytes());
        }
        hasher.update(&[0]);
        if let Ok(provided) = serde_json::to_vec(&self.provided) {
            hasher.update(&provided);
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Accumulated outputs of completed steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutputs {
    pub input: RunInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanIndex>,
    #[serde(default)]
    pub items: EmittedItems,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audits: Vec<AuditRecord>,
    /// Assembled store, placeholder ids intact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembled: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repaired: Option<Value>,
    /// Remaining schema errors when repair settled for best effort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_errors: Option<usize>,
}

impl StepOutputs {
    pub fn new(input: RunInput) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }
}

/// Wall time per step name, summed across resumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTiming {
    pub durations_ms: BTreeMap<String, u64>,
}

impl StepTiming {
    pub fn record(&mut self, step: Step, duration_ms: u64) {
        *self.durations_ms.entry(step.name().to_string()).or_insert(0) += duration_ms;
    }

    pub fn total_ms(&self) -> u64 {
        self.durations_ms.values().sum()
    }
}
