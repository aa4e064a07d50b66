//! Scripted generator and fixtures shared by the integration tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use regimen::error::PipelineError;
use regimen::generator::{Generation, GenerationPurpose, GenerationRequest, Generator};
use regimen::schema::{SchemaValidator, ValidationError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Replies keyed by purpose and optionally item id.
///
/// An item-specific queue wins over the purpose-wide one. The last reply of
/// a queue repeats; `None` fails the call.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<HashMap<(GenerationPurpose, Option<String>), Vec<Option<String>>>>,
    calls: Mutex<Vec<(GenerationPurpose, Option<String>)>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, purpose: GenerationPurpose, content: &str) -> Self {
        self.queue(purpose, None, vec![Some(content)])
    }

    pub fn reply_for(self, purpose: GenerationPurpose, item_id: &str, content: &str) -> Self {
        self.queue(purpose, Some(item_id), vec![Some(content)])
    }

    pub fn fail(self, purpose: GenerationPurpose) -> Self {
        self.queue(purpose, None, vec![None])
    }

    pub fn queue(self, purpose: GenerationPurpose, item_id: Option<&str>, replies: Vec<Option<&str>>) -> Self {
        self.replies.lock().insert(
            (purpose, item_id.map(str::to_string)),
            replies.into_iter().map(|r| r.map(str::to_string)).collect(),
        );
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls_for(&self, purpose: GenerationPurpose) -> usize {
        self.calls.lock().iter().filter(|(p, _)| *p == purpose).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, PipelineError> {
        let key = (request.purpose, request.item_id.clone());
        self.calls.lock().push(key.clone());
        let mut replies = self.replies.lock();
        let queue = if replies.contains_key(&key) {
            replies.get_mut(&key)
        } else {
            replies.get_mut(&(request.purpose, None))
        }
        .ok_or_else(|| PipelineError::ProviderRequestFailed(format!("no script for {}", request.label())))?;
        let reply = if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue[0].clone()
        };
        match reply {
            Some(content) => Ok(Generation::complete(content)),
            None => Err(PipelineError::ProviderRequestFailed(format!(
                "{} unavailable",
                request.label()
            ))),
        }
    }
}

pub struct AcceptAll;

impl SchemaValidator for AcceptAll {
    fn validate(&self, _document: &Value) -> Vec<ValidationError> {
        Vec::new()
    }
}

pub const BRIEF: &str = "Two bodyweight days a week with a pull-up bar at home.";

pub const PLAN: &str = r#"{
    "equipments": [{"id": "EQUIPMENT_1", "kind": "GENERIC", "name": "Pull-up bar"}],
    "exercises": [
        {"id": "EXERCISE_1", "name": "Pull-up", "exerciseType": "BODY_WEIGHT",
         "equipmentId": "EQUIPMENT_1", "minReps": 5, "maxReps": 8,
         "numWorkSets": 3, "restBetweenSetsSeconds": 90},
        {"id": "EXERCISE_2", "name": "Push-up", "exerciseType": "BODY_WEIGHT",
         "minReps": 10, "maxReps": 15}
    ],
    "workouts": [
        {"id": "WORKOUT_1", "name": "Day A", "exerciseIds": ["EXERCISE_1", "EXERCISE_2"]},
        {"id": "WORKOUT_2", "name": "Day B", "exerciseIds": ["EXERCISE_2"]}
    ]
}"#;

pub const PULL_UP_BAR: &str = r#"{"type": "GENERIC", "id": "EQUIPMENT_1", "name": "Pull-up bar"}"#;

pub const PULL_UP: &str = r#"{"id": "EXERCISE_1", "name": "Pull-up", "exerciseType": "BODY_WEIGHT",
    "equipmentId": "EQUIPMENT_1", "minReps": 5, "maxReps": 8,
    "sets": [
        {"type": "BodyWeightSet", "id": "SET_1", "reps": 6},
        {"type": "RestSet", "id": "SET_2", "timeInSeconds": 90},
        {"type": "BodyWeightSet", "id": "SET_3", "reps": 6},
        {"type": "RestSet", "id": "SET_4", "timeInSeconds": 90},
        {"type": "BodyWeightSet", "id": "SET_5", "reps": 6}
    ]}"#;

/// Two work sets where three are planned.
pub const SHORT_PULL_UP: &str = r#"{"id": "EXERCISE_1", "name": "Pull-up", "exerciseType": "BODY_WEIGHT",
    "equipmentId": "EQUIPMENT_1", "minReps": 5, "maxReps": 8,
    "sets": [
        {"type": "BodyWeightSet", "id": "SET_1", "reps": 6},
        {"type": "RestSet", "id": "SET_2", "timeInSeconds": 90},
        {"type": "BodyWeightSet", "id": "SET_3", "reps": 6}
    ]}"#;

pub const PUSH_UP: &str = r#"{"id": "EXERCISE_2", "name": "Push-up", "exerciseType": "BODY_WEIGHT",
    "minReps": 10, "maxReps": 15,
    "sets": [{"type": "BodyWeightSet", "reps": 12}]}"#;

pub const DAY_A: &str = r#"{"id": "WORKOUT_1", "name": "Day A", "components": [
    {"type": "Exercise", "exerciseId": "EXERCISE_1"},
    {"type": "Rest", "timeInSeconds": 120},
    {"type": "Exercise", "exerciseId": "EXERCISE_2"}
]}"#;

pub const DAY_B: &str = r#"{"id": "WORKOUT_2", "name": "Day B", "components": [
    {"type": "Exercise", "exerciseId": "EXERCISE_2"}
]}"#;

/// A generator that completes every step of the two-workout plan.
pub fn happy_generator() -> ScriptedGenerator {
    ScriptedGenerator::new()
        .reply(GenerationPurpose::Summary, BRIEF)
        .reply(GenerationPurpose::Plan, PLAN)
        .reply(GenerationPurpose::Equipment, PULL_UP_BAR)
        .reply_for(GenerationPurpose::Exercise, "EXERCISE_1", PULL_UP)
        .reply_for(GenerationPurpose::Exercise, "EXERCISE_2", PUSH_UP)
        .reply_for(GenerationPurpose::Workout, "WORKOUT_1", DAY_A)
        .reply_for(GenerationPurpose::Workout, "WORKOUT_2", DAY_B)
}

/// Every string value in `document`, depth first.
pub fn strings(document: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect(document, &mut out);
    out
}

fn collect(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect(v, out)),
        _ => {}
    }
}
