use regimen::cli::{Commands, RunContext};
use regimen::emission::CancelFlag;
use regimen::error::PipelineError;
use regimen::generator::GenerationPurpose;
use regimen::pipeline::RunInput;
use std::fs;
use tempfile::TempDir;

use crate::integration::support::happy_generator;

fn workspace_with_config(body: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("regimen.toml");
    fs::write(&config_path, body).unwrap();
    (dir, config_path)
}

#[tokio::test]
async fn failed_run_is_listed_as_resumable() {
    let (dir, config_path) = workspace_with_config(
        r#"
[pipeline]
contract_retry_budget = 0

[storage]
checkpoint_path = "runs/state"
"#,
    );
    let ctx = RunContext::new(dir.path().to_path_buf(), Some(config_path)).unwrap();
    assert_eq!(ctx.config().pipeline.contract_retry_budget, 0);

    let generator = happy_generator()
        .queue(GenerationPurpose::Workout, Some("WORKOUT_1"), vec![None])
        .shared();
    let err = ctx
        .pipeline(generator.clone(), CancelFlag::new())
        .unwrap()
        .run(RunInput::new("request"), Some("cli-1".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ContractViolation { attempts: 1, .. }));
    assert_eq!(generator.calls_for(GenerationPurpose::Workout), 2);
    assert!(dir.path().join("runs/state").exists());

    let listing = ctx
        .execute(
            &Commands::Sessions {
                format: "json".to_string(),
            },
            CancelFlag::new(),
        )
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&listing).unwrap();
    assert_eq!(value["sessions"][0]["session_id"], "cli-1");
    assert_eq!(value["sessions"][0]["step_name"], "emit_exercises");
}

#[tokio::test]
async fn resume_of_unknown_session_reports_missing_checkpoint() {
    let (dir, config_path) = workspace_with_config(
        r#"
[provider]
provider_type = "ollama"
model = "llama3"
"#,
    );
    let ctx = RunContext::new(dir.path().to_path_buf(), Some(config_path)).unwrap();
    let err = ctx
        .execute(
            &Commands::Resume {
                session: "nope".to_string(),
                out: dir.path().join("store.json"),
                input: None,
            },
            CancelFlag::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::CheckpointMissing(_)));
    assert!(!dir.path().join("store.json").exists());
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let (dir, config_path) = workspace_with_config(
        r#"
[pipeline]
max_workers = 0
"#,
    );
    let err = RunContext::new(dir.path().to_path_buf(), Some(config_path)).err().unwrap();
    assert!(matches!(err, PipelineError::ConfigError(_)));
}
