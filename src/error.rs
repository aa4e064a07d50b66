//! Error types for the regimen generation pipeline.

use std::fmt;
use thiserror::Error;

/// Storage-related errors (checkpoints, session log)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised while applying a JSON patch to a document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    #[error("Invalid JSON pointer '{0}'")]
    InvalidPointer(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Array index out of bounds at {path}: {index}")]
    IndexOutOfBounds { path: String, index: usize },

    #[error("Cannot traverse into scalar value at {0}")]
    NotAContainer(String),

    #[error("Cannot move {from} into its own child {path}")]
    MoveIntoChild { from: String, path: String },

    #[error("Test operation failed at {0}")]
    TestFailed(String),
}

/// Which side of application a scope check ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeCheck {
    /// Operation targets, checked before application.
    Operations,
    /// Structural diff, checked after application.
    ChangedPaths,
}

/// A patch touched locations outside the scope its motivating errors allow.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeViolation {
    pub check: ScopeCheck,
    pub paths: Vec<String>,
}

impl fmt::Display for ScopeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.check {
            ScopeCheck::Operations => "operation targets",
            ScopeCheck::ChangedPaths => "changed paths",
        };
        write!(
            f,
            "Patch {} outside allowed scope: {}",
            stage,
            self.paths.join(", ")
        )
    }
}

impl std::error::Error for ScopeViolation {}

/// Pipeline-level errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider connection failed: {0}")]
    ProviderConnection(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Output truncated at every token budget up to {max_output_tokens}: {detail}")]
    OutputTruncated { max_output_tokens: u32, detail: String },

    #[error("Malformed generator output for {item}: {detail}")]
    MalformedOutput { item: String, detail: String },

    #[error("Contract violations remain in {step} after {attempts} attempt(s): {summary}")]
    ContractViolation {
        step: String,
        attempts: usize,
        summary: String,
    },

    #[error("Emission aborted: item {item_id} failed ({completed} completed): {message}")]
    EmissionAborted {
        item_id: String,
        message: String,
        completed: usize,
    },

    #[error("Repair exhausted after {attempts} attempt(s), best error count {best_error_count}: {last_error}")]
    RepairExhausted {
        attempts: usize,
        best_error_count: usize,
        last_error: String,
    },

    #[error(transparent)]
    Scope(#[from] ScopeViolation),

    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Resolution parity check failed: {0}")]
    ParityMismatch(String),

    #[error("No checkpoint found for session {0}")]
    CheckpointMissing(String),

    #[error("Run state is missing the output step {0} depends on")]
    MissingStepOutput(String),

    #[error("Pipeline cancelled during step {step} ({name})")]
    Cancelled { step: u8, name: String },

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    /// Only dropped connections are cushioned by backoff; everything else surfaces.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::ProviderConnection(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_errors_are_transient() {
        assert!(PipelineError::ProviderConnection("reset".to_string()).is_transient());
        assert!(!PipelineError::ProviderRateLimit("slow down".to_string()).is_transient());
        assert!(!PipelineError::ProviderRequestFailed("500".to_string()).is_transient());
    }

    #[test]
    fn scope_violation_lists_every_path() {
        let err = ScopeViolation {
            check: ScopeCheck::ChangedPaths,
            paths: vec!["/a".to_string(), "/b/0".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("changed paths"));
        assert!(text.contains("/a, /b/0"));
    }
}
