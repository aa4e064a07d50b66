//! Configuration System
//!
//! Layered configuration for the generator provider, pipeline tunables,
//! checkpoint storage and logging. Layers, lowest to highest precedence:
//! built-in defaults, the global user file, workspace files, then
//! `REGIMEN__SECTION__KEY` environment variables.

use crate::error::PipelineError;
use crate::generator::ladder::DEFAULT_TOKEN_LADDER;
use crate::generator::RetryPolicy;
use crate::logging::LoggingConfig;
use crate::pipeline::PipelineOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use crate::provider::{ProviderConfig, ProviderType};

mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod global_file;
    pub mod workspace_file;
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegimenConfig {
    /// Generator backend; required for `generate` and `resume`.
    #[serde(default)]
    pub provider: Option<ProviderConfig>,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// In-flight emission limit; unset uses `min(32, items + 4)`.
    #[serde(default)]
    pub max_workers: Option<usize>,

    #[serde(default)]
    pub fail_fast: bool,

    #[serde(default = "default_contract_retry_budget")]
    pub contract_retry_budget: usize,

    #[serde(default = "default_repair_max_attempts")]
    pub repair_max_attempts: usize,

    #[serde(default)]
    pub accept_best_effort: bool,

    #[serde(default = "default_heal_attempts")]
    pub heal_attempts: u32,

    #[serde(default = "default_plan_attempts")]
    pub plan_attempts: usize,

    /// Output-token budgets tried in order when a reply is cut off.
    #[serde(default = "default_token_ladder")]
    pub token_ladder: Vec<u32>,

    #[serde(default = "default_transport_max_attempts")]
    pub transport_max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Store schema override; the bundled schema is used when unset.
    #[serde(default)]
    pub schema_path: Option<PathBuf>,
}

fn default_contract_retry_budget() -> usize {
    2
}

fn default_repair_max_attempts() -> usize {
    6
}

fn default_heal_attempts() -> u32 {
    2
}

fn default_plan_attempts() -> usize {
    3
}

fn default_token_ladder() -> Vec<u32> {
    DEFAULT_TOKEN_LADDER.to_vec()
}

fn default_transport_max_attempts() -> u32 {
    4
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    8000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            fail_fast: false,
            contract_retry_budget: default_contract_retry_budget(),
            repair_max_attempts: default_repair_max_attempts(),
            accept_best_effort: false,
            heal_attempts: default_heal_attempts(),
            plan_attempts: default_plan_attempts(),
            token_ladder: default_token_ladder(),
            transport_max_attempts: default_transport_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            schema_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn options(&self) -> PipelineOptions {
        PipelineOptions {
            max_workers: self.max_workers,
            fail_fast: self.fail_fast,
            contract_retry_budget: self.contract_retry_budget,
            plan_attempts: self.plan_attempts,
            heal_attempts: self.heal_attempts,
            repair_max_attempts: self.repair_max_attempts,
            accept_best_effort: self.accept_best_effort,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.transport_max_attempts,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.max_workers == Some(0) {
            problems.push("max_workers must be at least 1".to_string());
        }
        if self.repair_max_attempts == 0 {
            problems.push("repair_max_attempts must be at least 1".to_string());
        }
        if self.plan_attempts == 0 {
            problems.push("plan_attempts must be at least 1".to_string());
        }
        if self.transport_max_attempts == 0 {
            problems.push("transport_max_attempts must be at least 1".to_string());
        }
        if self.token_ladder.is_empty() {
            problems.push("token_ladder cannot be empty".to_string());
        } else if self.token_ladder.contains(&0) {
            problems.push("token_ladder entries must be positive".to_string());
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            problems.push(format!(
                "backoff_base_ms ({}) exceeds backoff_max_ms ({})",
                self.backoff_base_ms, self.backoff_max_ms
            ));
        }
        if let Some(path) = &self.schema_path {
            // relative paths are resolved against the workspace later
            if path.is_absolute() && !path.is_file() {
                problems.push(format!("schema_path {} is not a file", path.display()));
            }
        }
        problems
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled directory holding checkpoints and session events. Relative
    /// paths are taken from the workspace root.
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from(".regimen/state")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

impl StorageConfig {
    pub fn resolve(&self, workspace_root: &Path) -> PathBuf {
        if self.checkpoint_path.is_absolute() {
            self.checkpoint_path.clone()
        } else {
            workspace_root.join(&self.checkpoint_path)
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Provider(String),
    Pipeline(String),
    Storage(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Pipeline(msg) => write!(f, "Pipeline: {}", msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RegimenConfig {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(provider) = &self.provider {
            if let Err(e) = provider.validate() {
                errors.push(ValidationError::Provider(e));
            }
        }
        errors.extend(self.pipeline.validate().into_iter().map(ValidationError::Pipeline));
        if self.storage.checkpoint_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "checkpoint_path cannot be empty".to_string(),
            ));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// `validate` folded into one error for callers that only report.
    pub fn ensure_valid(&self) -> Result<(), PipelineError> {
        self.validate().map_err(|errors| {
            let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            PipelineError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                lines.join("\n")
            ))
        })
    }

    pub fn require_provider(&self) -> Result<&ProviderConfig, PipelineError> {
        self.provider.as_ref().ok_or_else(|| {
            PipelineError::ProviderNotConfigured(
                "no [provider] section in configuration".to_string(),
            )
        })
    }
}

/// Builds a [`RegimenConfig`] from every layer.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, global file, workspace files, environment.
    pub fn load(workspace_root: &Path) -> Result<RegimenConfig, PipelineError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        Self::finish(builder)
    }

    /// Defaults, one explicit file, environment. The file must exist.
    pub fn load_from_file(path: &Path) -> Result<RegimenConfig, PipelineError> {
        if !path.is_file() {
            return Err(PipelineError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path.to_path_buf()).required(true));
        Self::finish(builder)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        sources::global_file::global_config_path()
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<RegimenConfig, PipelineError> {
        let config = builder
            .add_source(
                config::Environment::with_prefix("REGIMEN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("pipeline.token_ladder"),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
