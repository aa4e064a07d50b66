use regimen::checkpoint::{CheckpointStore, MemoryCheckpointStore, SledCheckpointStore};
use regimen::error::PipelineError;
use regimen::generator::GenerationPurpose;
use regimen::identity::IdentityManager;
use regimen::pipeline::{Pipeline, RunInput, Step};
use std::sync::Arc;
use tempfile::TempDir;

use crate::integration::support::{happy_generator, AcceptAll, ScriptedGenerator};

fn pipeline(generator: Arc<ScriptedGenerator>, store: Arc<dyn CheckpointStore>) -> Pipeline {
    Pipeline::new(generator, Arc::new(AcceptAll), store)
}

fn sled_store() -> (TempDir, Arc<SledCheckpointStore>) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SledCheckpointStore::open(&dir.path().join("state")).unwrap());
    (dir, store)
}

/// Runs until WORKOUT_2 exhausts its contract rounds, leaving a step-4 checkpoint.
async fn fail_at_workouts(store: Arc<SledCheckpointStore>, session: &str) {
    let generator = happy_generator()
        .queue(GenerationPurpose::Workout, Some("WORKOUT_2"), vec![None])
        .shared();
    let err = pipeline(generator, store)
        .run(RunInput::new("pull-ups twice a week"), Some(session.to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ContractViolation { ref step, .. } if step == "emit_workouts"));
}

#[tokio::test]
async fn resume_keeps_durable_ids() {
    let (_dir, store) = sled_store();
    fail_at_workouts(store.clone(), "r1").await;

    let checkpoint = store.load_latest("r1").unwrap().unwrap();
    assert_eq!(checkpoint.step, Step::EmitExercises);
    assert_eq!(checkpoint.outputs.items.exercises.len(), 2);
    let identity = IdentityManager::from_snapshot(&checkpoint.identity).unwrap();

    let generator = happy_generator().shared();
    let result = pipeline(generator.clone(), store.clone())
        .resume("r1", None)
        .await
        .unwrap();

    assert_eq!(generator.calls_for(GenerationPurpose::Summary), 0);
    assert_eq!(generator.calls_for(GenerationPurpose::Plan), 0);
    assert_eq!(generator.calls_for(GenerationPurpose::Equipment), 0);
    assert_eq!(generator.calls_for(GenerationPurpose::Exercise), 0);
    assert_eq!(generator.calls_for(GenerationPurpose::Workout), 2);

    for (placeholder, durable) in &checkpoint.identity.entries {
        assert_eq!(identity.durable_id(placeholder).as_ref(), Some(durable));
    }
    assert_eq!(
        result.store["equipments"][0]["id"].as_str(),
        checkpoint.identity.entries.get("EQUIPMENT_1").map(String::as_str)
    );
    assert!(store.load_latest("r1").unwrap().is_none());
}

#[tokio::test]
async fn resuming_the_same_checkpoint_twice_gives_the_same_store() {
    let (_dir, store) = sled_store();
    fail_at_workouts(store.clone(), "r2").await;
    let checkpoint = store
        .load_latest("r2")
        .unwrap()
        .unwrap();

    let mut stores = Vec::new();
    for _ in 0..2 {
        let memory = Arc::new(MemoryCheckpointStore::new());
        memory.save(&checkpoint).unwrap();
        let result = pipeline(happy_generator().shared(), memory)
            .resume("r2", None)
            .await
            .unwrap();
        stores.push(result.store);
    }
    assert_eq!(stores[0], stores[1]);
}

#[tokio::test]
async fn changed_request_still_resumes() {
    let (_dir, store) = sled_store();
    fail_at_workouts(store.clone(), "r3").await;

    let different = RunInput::new("something else entirely");
    let result = pipeline(happy_generator().shared(), store)
        .resume("r3", Some(&different))
        .await
        .unwrap();
    assert_eq!(result.session_id, "r3");
}

#[tokio::test]
async fn sessions_list_failed_runs_only() {
    let (_dir, store) = sled_store();
    fail_at_workouts(store.clone(), "kept").await;

    pipeline(happy_generator().shared(), store.clone())
        .run(RunInput::new("fine"), Some("done".to_string()))
        .await
        .unwrap();

    let sessions = store.list_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, "kept");
    assert_eq!(sessions[0].step, Step::EmitExercises);
}
