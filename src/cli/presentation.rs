//! CLI presentation: text and json formatters.

use crate::checkpoint::SessionSummary;
use crate::emission::AuditStatus;
use crate::pipeline::PipelineResult;
use serde_json::json;
use std::path::Path;

pub fn format_run_summary(result: &PipelineResult, out: &Path) -> String {
    let workouts = result.store["workouts"].as_array().map_or(0, Vec::len);
    let equipments = result.store["equipments"].as_array().map_or(0, Vec::len);
    let failed = result
        .audits
        .iter()
        .filter(|a| a.status == AuditStatus::Failed)
        .count();

    let mut output = format!(
        "Session {} complete: {} workout(s), {} equipment item(s) written to {}\n",
        result.session_id,
        workouts,
        equipments,
        out.display()
    );
    if let Some(errors) = result.residual_errors {
        output.push_str(&format!(
            "Warning: store accepted with {} unresolved schema error(s)\n",
            errors
        ));
    }
    if failed > 0 {
        output.push_str(&format!("{} item emission(s) failed along the way\n", failed));
    }
    output.push_str("\nStep timings:\n");
    for (step, ms) in &result.timing.durations_ms {
        output.push_str(&format!("  {:<16} {:>8} ms\n", step, ms));
    }
    output.push_str(&format!("  {:<16} {:>8} ms", "total", result.timing.total_ms()));
    output
}

pub fn format_sessions_text(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "No resumable sessions.".to_string();
    }
    let mut output = String::from("Resumable sessions:\n");
    for session in sessions {
        output.push_str(&format!(
            "  {:<36} after step {:<22} {}\n",
            session.session_id,
            session.step.to_string(),
            session.created_at
        ));
    }
    output.push_str(&format!("\nTotal: {} session(s)", sessions.len()));
    output
}

pub fn format_sessions_json(sessions: &[SessionSummary]) -> String {
    let list: Vec<_> = sessions
        .iter()
        .map(|s| {
            json!({
                "session_id": s.session_id,
                "step": s.step.index(),
                "step_name": s.step.name(),
                "created_at": s.created_at,
            })
        })
        .collect();
    serde_json::to_string_pretty(&json!({ "sessions": list }))
        .unwrap_or_else(|_| "{}".to_string())
}
