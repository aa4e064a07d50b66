use regimen::checkpoint::{CheckpointStore, SledCheckpointStore};
use regimen::error::PipelineError;
use regimen::generator::GenerationPurpose;
use regimen::identity::Placeholder;
use regimen::pipeline::{Pipeline, PipelineOptions, RunInput, Step};
use regimen::progress::SessionLog;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

use crate::integration::support::{
    happy_generator, strings, AcceptAll, ScriptedGenerator, PULL_UP, SHORT_PULL_UP,
};

struct Harness {
    _dir: TempDir,
    checkpoints: Arc<SledCheckpointStore>,
    events: Arc<SessionLog>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = sled::open(dir.path().join("state")).unwrap();
        Self {
            checkpoints: Arc::new(SledCheckpointStore::from_db(db.clone()).unwrap()),
            events: Arc::new(SessionLog::new(db).unwrap()),
            _dir: dir,
        }
    }

    fn pipeline(&self, generator: Arc<ScriptedGenerator>) -> Pipeline {
        Pipeline::new(generator, Arc::new(AcceptAll), self.checkpoints.clone())
            .with_events(self.events.clone())
    }
}

fn component_ids(store: &Value) -> Vec<String> {
    store["workouts"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|w| w["workoutComponents"].as_array().unwrap().iter())
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn run_produces_a_fully_resolved_store() {
    let harness = Harness::new();
    let generator = happy_generator().shared();
    let result = harness
        .pipeline(generator.clone())
        .run(RunInput::new("pull-ups and push-ups, twice a week"), Some("e2e".to_string()))
        .await
        .unwrap();

    let store = &result.store;
    assert!(strings(store).iter().all(|s| !Placeholder::is_placeholder(s)));

    let equipment_id = store["equipments"][0]["id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(equipment_id).is_ok());
    let pull_up = &store["workouts"][0]["workoutComponents"][0];
    assert_eq!(pull_up["name"], "Pull-up");
    assert_eq!(pull_up["equipmentId"].as_str(), Some(equipment_id));
    assert_eq!(pull_up["sets"].as_array().unwrap().len(), 5);

    let ids = component_ids(store);
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
    assert_eq!(store["workouts"][1]["name"], "Day B");

    assert_eq!(generator.calls_for(GenerationPurpose::Exercise), 2);
    assert_eq!(generator.calls_for(GenerationPurpose::Workout), 2);
    assert_eq!(generator.calls_for(GenerationPurpose::Repair), 0);
    assert!(harness.checkpoints.load_latest("e2e").unwrap().is_none());
}

#[tokio::test]
async fn every_step_is_logged_in_order() {
    let harness = Harness::new();
    harness
        .pipeline(happy_generator().shared())
        .run(RunInput::new("request"), Some("logged".to_string()))
        .await
        .unwrap();

    let events = harness.events.events("logged").unwrap();
    assert!(events.windows(2).all(|w| w[1].seq == w[0].seq + 1));
    let completed: Vec<u64> = events
        .iter()
        .filter(|e| e.event_type == "step_completed")
        .map(|e| e.data["step"].as_u64().unwrap())
        .collect();
    assert_eq!(completed, (0..Step::ALL.len() as u64).collect::<Vec<_>>());
    assert!(events.iter().any(|e| e.event_type == "emission_progress"));
    assert!(!events.iter().any(|e| e.event_type == "step_failed"));
}

#[tokio::test]
async fn short_exercise_is_re_emitted_with_its_issue() {
    let harness = Harness::new();
    let generator = happy_generator()
        .queue(
            GenerationPurpose::Exercise,
            Some("EXERCISE_1"),
            vec![Some(SHORT_PULL_UP), Some(PULL_UP)],
        )
        .shared();
    let result = harness
        .pipeline(generator.clone())
        .run(RunInput::new("request"), None)
        .await
        .unwrap();

    // EXERCISE_2 passed its contract on the first round
    assert_eq!(generator.calls_for(GenerationPurpose::Exercise), 3);
    let sets = result.store["workouts"][0]["workoutComponents"][0]["sets"]
        .as_array()
        .unwrap();
    assert_eq!(sets.len(), 5);
}

#[tokio::test]
async fn fail_fast_stops_on_the_first_failed_item() {
    let harness = Harness::new();
    let generator = happy_generator()
        .queue(GenerationPurpose::Workout, Some("WORKOUT_2"), vec![None])
        .shared();
    let err = harness
        .pipeline(generator)
        .with_options(PipelineOptions {
            fail_fast: true,
            ..PipelineOptions::default()
        })
        .run(RunInput::new("request"), Some("ff".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmissionAborted { ref item_id, .. } if item_id == "WORKOUT_2"));

    let checkpoint = harness.checkpoints.load_latest("ff").unwrap().unwrap();
    assert_eq!(checkpoint.step, Step::EmitExercises);
    let failed: Vec<_> = harness
        .events
        .events("ff")
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == "step_failed")
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].data["name"], "emit_workouts");
}

#[tokio::test]
async fn invalid_plan_fails_before_any_emission() {
    let harness = Harness::new();
    let broken_plan = r#"{
        "equipments": [],
        "exercises": [{"id": "EXERCISE_1", "name": "Row", "exerciseType": "WEIGHT",
                       "equipmentId": "EQUIPMENT_7", "minReps": 12, "maxReps": 6}],
        "workouts": [{"id": "WORKOUT_1", "name": "Pull", "exerciseIds": ["EXERCISE_1"]}]
    }"#;
    let generator = happy_generator()
        .reply(GenerationPurpose::Plan, broken_plan)
        .shared();
    let err = harness
        .pipeline(generator.clone())
        .run(RunInput::new("request"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ContractViolation { ref step, .. } if step == "plan"));
    assert_eq!(generator.calls_for(GenerationPurpose::Equipment), 0);
    assert_eq!(generator.calls_for(GenerationPurpose::Exercise), 0);
}
