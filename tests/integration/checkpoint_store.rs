use regimen::checkpoint::{Checkpoint, CheckpointStore, SledCheckpointStore};
use regimen::identity::IdentityManager;
use regimen::model::PlanIndex;
use regimen::pipeline::{RunInput, Step, StepOutputs, StepTiming};
use tempfile::TempDir;

use crate::integration::support::PLAN;

fn checkpoint(session_id: &str, step: Step, identity: &IdentityManager) -> Checkpoint {
    let mut input = RunInput::new("three sessions, dumbbells only");
    input.custom_instructions = Some("prefer supersets".to_string());
    let mut outputs = StepOutputs::new(input.clone());
    outputs.brief = Some("brief".to_string());
    outputs.plan = Some(serde_json::from_str::<PlanIndex>(PLAN).unwrap());
    let mut timing = StepTiming::default();
    timing.record(Step::Summarize, 40);
    timing.record(Step::Plan, 60);
    Checkpoint {
        session_id: session_id.to_string(),
        step,
        outputs,
        timing,
        identity: identity.snapshot(),
        custom_instructions: input.custom_instructions.clone(),
        conversation_hash: input.conversation_hash(),
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

fn open(dir: &TempDir) -> SledCheckpointStore {
    SledCheckpointStore::open(&dir.path().join("state")).unwrap()
}

#[test]
fn saved_state_round_trips_through_sled() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let identity = IdentityManager::new();
    identity.extract(&serde_json::from_str(PLAN).unwrap());

    let saved = checkpoint("roundtrip", Step::Plan, &identity);
    store.save(&saved).unwrap();
    let loaded = store.load_latest("roundtrip").unwrap().unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.timing.total_ms(), 100);

    let restored = IdentityManager::from_snapshot(&loaded.identity).unwrap();
    for placeholder in ["EQUIPMENT_1", "EXERCISE_2", "WORKOUT_1"] {
        assert_eq!(restored.durable_id(placeholder), identity.durable_id(placeholder));
    }
}

#[test]
fn later_steps_replace_earlier_ones() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let identity = IdentityManager::new();
    for step in [Step::Summarize, Step::Plan, Step::EmitEquipment] {
        store.save(&checkpoint("s", step, &identity)).unwrap();
    }
    assert_eq!(store.load_latest("s").unwrap().unwrap().step, Step::EmitEquipment);
    let sessions = store.list_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].step, Step::EmitEquipment);
}

#[test]
fn session_ids_sharing_a_prefix_stay_separate() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let identity = IdentityManager::new();
    store.save(&checkpoint("run-1", Step::Assemble, &identity)).unwrap();
    store.save(&checkpoint("run-10", Step::Summarize, &identity)).unwrap();

    assert_eq!(store.load_latest("run-1").unwrap().unwrap().step, Step::Assemble);
    store.delete("run-1").unwrap();
    assert!(store.load_latest("run-1").unwrap().is_none());
    assert_eq!(store.load_latest("run-10").unwrap().unwrap().step, Step::Summarize);
}

#[test]
fn session_id_that_prefixes_another_never_touches_it() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let identity = IdentityManager::new();

    store.save(&checkpoint("a:b", Step::Repair, &identity)).unwrap();
    store.save(&checkpoint("a", Step::Plan, &identity)).unwrap();
    let nested = store.load_latest("a:b").unwrap().unwrap();
    assert_eq!(nested.session_id, "a:b");
    assert_eq!(nested.step, Step::Repair);

    store.save(&checkpoint("a:b", Step::Repair, &identity)).unwrap();
    let short = store.load_latest("a").unwrap().unwrap();
    assert_eq!(short.session_id, "a");
    assert_eq!(short.step, Step::Plan);

    let listed: Vec<String> = store
        .list_sessions()
        .unwrap()
        .into_iter()
        .map(|s| s.session_id)
        .collect();
    assert_eq!(listed, vec!["a".to_string(), "a:b".to_string()]);

    store.delete("a").unwrap();
    assert!(store.load_latest("a").unwrap().is_none());
    assert_eq!(store.load_latest("a:b").unwrap().unwrap().step, Step::Repair);
}

#[test]
fn checkpoints_serialize_with_camel_case_keys() {
    let identity = IdentityManager::new();
    let value = serde_json::to_value(checkpoint("keys", Step::Repair, &identity)).unwrap();
    assert!(value.get("sessionId").is_some());
    assert!(value.get("conversationHash").is_some());
    assert_eq!(value["customInstructions"], "prefer supersets");
}
