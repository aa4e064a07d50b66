use regimen::generator::GenerationPurpose;
use regimen::progress::SessionLog;
use regimen::repair::{RepairLoop, RepairOptions, RepairOutcome};
use regimen::schema::JsonSchemaValidator;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

use crate::integration::support::ScriptedGenerator;

fn broken_store() -> Value {
    json!({
        "workouts": [],
        "equipments": [{"type": "GENERIC", "id": "EQUIPMENT_1"}],
        "accessoryEquipments": [],
        "birthDateYear": 1990,
        "progressionPercentageAmount": 0
    })
}

fn repair_loop(generator: Arc<ScriptedGenerator>, options: RepairOptions) -> RepairLoop {
    RepairLoop::new(
        generator,
        Arc::new(JsonSchemaValidator::bundled().unwrap()),
        options,
    )
}

#[tokio::test]
async fn errors_across_entities_get_one_document_patch() {
    let dir = TempDir::new().unwrap();
    let log = Arc::new(SessionLog::new(sled::open(dir.path()).unwrap()).unwrap());
    let patch = json!({"patch": [
        {"op": "add", "path": "/weightKg", "value": 72},
        {"op": "replace", "path": "/equipments/0",
         "value": {"type": "GENERIC", "id": "EQUIPMENT_1", "name": "Bench"}}
    ]})
    .to_string();
    let generator = ScriptedGenerator::new()
        .reply(GenerationPurpose::Repair, &patch)
        .shared();

    let outcome = repair_loop(generator.clone(), RepairOptions::default())
        .with_events(log.clone(), "repair")
        .run(broken_store())
        .await
        .unwrap();

    assert!(outcome.is_validated());
    assert_eq!(outcome.document()["weightKg"], 72);
    assert_eq!(outcome.document()["equipments"][0]["name"], "Bench");
    assert_eq!(generator.calls_for(GenerationPurpose::Repair), 1);
    assert_eq!(generator.calls_for(GenerationPurpose::ItemRepair), 0);

    let phases: Vec<String> = log
        .events("repair")
        .unwrap()
        .iter()
        .map(|e| e.data["phase"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(phases.first().map(String::as_str), Some("validating"));
    assert_eq!(phases.last().map(String::as_str), Some("done"));
    assert!(phases.iter().any(|p| p == "requesting_patch"));
}

#[tokio::test]
async fn out_of_scope_writes_never_land() {
    let greedy = json!({"patch": [
        {"op": "add", "path": "/weightKg", "value": 72},
        {"op": "replace", "path": "/birthDateYear", "value": 1970}
    ]})
    .to_string();
    let generator = ScriptedGenerator::new()
        .reply(GenerationPurpose::Repair, &greedy)
        .shared();

    let outcome = repair_loop(
        generator.clone(),
        RepairOptions {
            max_attempts: 2,
            accept_best_effort: true,
            custom_instructions: None,
        },
    )
    .run(broken_store())
    .await
    .unwrap();

    let RepairOutcome::BestEffort { document, error_count } = outcome else {
        panic!("expected a best-effort outcome");
    };
    assert!(error_count >= 1);
    assert_eq!(document["birthDateYear"], 1990);
    assert!(document.get("weightKg").is_none());
    assert_eq!(generator.calls_for(GenerationPurpose::Repair), 2);
}
