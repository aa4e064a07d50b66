//! CLI output: error mapping from domain errors to the process surface.

use crate::error::PipelineError;

/// Exit status reported for a cancelled run.
pub const EXIT_CANCELLED: i32 = 130;

/// Message printed for a failed command.
pub fn map_error(e: &PipelineError) -> String {
    match e {
        PipelineError::Cancelled { .. } => {
            format!("{}. Run `regimen resume` to continue.", e)
        }
        PipelineError::ProviderNotConfigured(_) => {
            format!("{}. Add a [provider] section to config/config.toml.", e)
        }
        _ => e.to_string(),
    }
}

pub fn exit_code(e: &PipelineError) -> i32 {
    if e.is_cancelled() {
        EXIT_CANCELLED
    } else {
        1
    }
}
