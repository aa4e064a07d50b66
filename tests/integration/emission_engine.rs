use regimen::emission::{Emission, EmissionEngine, FailurePolicy};
use regimen::error::PipelineError;
use regimen::progress::SessionLog;
use std::sync::Arc;
use tempfile::TempDir;

fn items(n: usize) -> Vec<(String, usize)> {
    (1..=n).map(|i| (format!("WORKOUT_{i}"), i)).collect()
}

async fn fifth_fails(id: String, n: usize) -> Result<Emission<usize>, PipelineError> {
    if n == 5 {
        Err(PipelineError::ProviderRequestFailed("upstream 500".to_string()))
    } else {
        Ok(Emission::emitted(id, n * 10))
    }
}

#[tokio::test]
async fn progress_events_cover_every_item() {
    let dir = TempDir::new().unwrap();
    let log = Arc::new(SessionLog::new(sled::open(dir.path()).unwrap()).unwrap());
    let engine = EmissionEngine::new("workouts").with_events(log.clone(), "emit");

    let report = engine.run(items(10), fifth_fails).await.unwrap();
    assert_eq!(report.results.len(), 9);
    assert_eq!(report.results["WORKOUT_3"], 30);

    let events = log.events("emit").unwrap();
    assert_eq!(events.len(), 10);
    assert!(events.iter().all(|e| e.event_type == "emission_progress"));
    let last = &events[9].data;
    assert_eq!(last["completed"], 10);
    assert_eq!(last["failed"], 1);
    assert_eq!(last["total"], 10);
    let failed: Vec<_> = events
        .iter()
        .filter(|e| e.data.get("error").map_or(false, |v| !v.is_null()))
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].data["item_id"], "WORKOUT_5");
}

#[tokio::test]
async fn fail_fast_lets_in_flight_items_finish() {
    let engine = EmissionEngine::new("workouts").with_policy(FailurePolicy::FailFast);
    let err = engine.run(items(10), fifth_fails).await.unwrap_err();
    match err {
        PipelineError::EmissionAborted {
            item_id,
            completed,
            message,
        } => {
            assert_eq!(item_id, "WORKOUT_5");
            assert_eq!(completed, 9);
            assert!(message.contains("upstream 500"));
        }
        other => panic!("unexpected error: {other}"),
    }
    let snapshot = engine.progress().snapshot();
    assert_eq!(snapshot.completed, 10);
    assert_eq!(snapshot.failed, 1);
}
