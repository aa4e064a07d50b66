//! CLI route: single route table and run context. Dispatches to the
//! pipeline, the checkpoint store and presentation.

use crate::checkpoint::{CheckpointStore, SledCheckpointStore};
use crate::cli::parse::Commands;
use crate::cli::presentation::{format_run_summary, format_sessions_json, format_sessions_text};
use crate::config::{ConfigLoader, RegimenConfig};
use crate::emission::CancelFlag;
use crate::error::{PipelineError, StorageError};
use crate::generator::{Generator, LadderGenerator};
use crate::model::ProvidedEquipment;
use crate::pipeline::{Pipeline, RunInput};
use crate::progress::SessionLog;
use crate::provider::ProviderFactory;
use crate::schema::{JsonSchemaValidator, SchemaValidator};
use crate::storage::open_db;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Runtime context for CLI execution: workspace, loaded config and the
/// sled-backed checkpoint store and session log.
pub struct RunContext {
    workspace_root: PathBuf,
    config: RegimenConfig,
    checkpoints: Arc<SledCheckpointStore>,
    events: Arc<SessionLog>,
}

impl RunContext {
    /// Load configuration (explicit file or layered) and open storage.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, PipelineError> {
        let config = match config_path {
            Some(path) => ConfigLoader::load_from_file(&path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::with_config(workspace_root, config)
    }

    pub fn with_config(workspace_root: PathBuf, config: RegimenConfig) -> Result<Self, PipelineError> {
        config.ensure_valid()?;
        let state_path = config.storage.resolve(&workspace_root);
        let db = open_db(&state_path)?;
        info!(state_path = %state_path.display(), "opened run state");
        Ok(Self {
            checkpoints: Arc::new(SledCheckpointStore::from_db(db.clone())?),
            events: Arc::new(SessionLog::new(db)?),
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &RegimenConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn events(&self) -> Arc<SessionLog> {
        Arc::clone(&self.events)
    }

    pub async fn execute(&self, command: &Commands, cancel: CancelFlag) -> Result<String, PipelineError> {
        match command {
            Commands::Generate {
                input,
                provided_equipment,
                instructions,
                session,
                out,
            } => {
                let input = load_run_input(input, provided_equipment.as_deref(), instructions.as_deref())?;
                let pipeline = self.pipeline(self.generator()?, cancel)?;
                let result = pipeline.run(input, session.clone()).await?;
                write_store(out, &result.store)?;
                Ok(format_run_summary(&result, out))
            }
            Commands::Resume {
                session,
                out,
                input,
            } => {
                let current = match input {
                    Some(path) => Some(load_run_input(path, None, None)?),
                    None => None,
                };
                let pipeline = self.pipeline(self.generator()?, cancel)?;
                let result = pipeline.resume(session, current.as_ref()).await?;
                write_store(out, &result.store)?;
                Ok(format_run_summary(&result, out))
            }
            Commands::Sessions { format } => {
                let sessions = self.checkpoints.list_sessions()?;
                match format.as_str() {
                    "json" => Ok(format_sessions_json(&sessions)),
                    "text" => Ok(format_sessions_text(&sessions)),
                    other => Err(PipelineError::InvalidInput(format!(
                        "Unknown format '{}' (expected text or json)",
                        other
                    ))),
                }
            }
        }
    }

    /// Pipeline over `generator` with this context's storage, schema and tunables.
    pub fn pipeline(&self, generator: Arc<dyn Generator>, cancel: CancelFlag) -> Result<Pipeline, PipelineError> {
        let validator: Arc<dyn SchemaValidator> = match &self.config.pipeline.schema_path {
            Some(path) => Arc::new(JsonSchemaValidator::from_path(&self.resolve(path))?),
            None => Arc::new(JsonSchemaValidator::bundled()?),
        };
        Ok(Pipeline::new(generator, validator, self.checkpoints.clone())
            .with_options(self.config.pipeline.options())
            .with_events(self.events())
            .with_cancel(cancel))
    }

    fn generator(&self) -> Result<Arc<dyn Generator>, PipelineError> {
        let provider = self.config.require_provider()?;
        let client = ProviderFactory::create_client(&provider.to_model_provider()?)?;
        info!(
            provider = %client.provider_name(),
            model = %client.model_name(),
            "using generator provider"
        );
        Ok(Arc::new(
            LadderGenerator::new(Arc::from(client))
                .with_ladder(self.config.pipeline.token_ladder.clone())
                .with_retry(self.config.pipeline.retry_policy())
                .with_default_options(provider.default_options.clone()),
        ))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}

/// Read a request file. JSON objects carrying `request` are taken as a full
/// [`RunInput`]; anything else is the request text itself.
pub fn load_run_input(
    path: &Path,
    provided_equipment: Option<&Path>,
    instructions: Option<&str>,
) -> Result<RunInput, PipelineError> {
    let raw = read_file(path)?;
    let mut input = match serde_json::from_str::<Value>(&raw) {
        Ok(value) if value.get("request").is_some() => serde_json::from_value(value).map_err(|e| {
            PipelineError::InvalidInput(format!("{}: {}", path.display(), e))
        })?,
        _ => RunInput::new(raw.trim()),
    };
    if input.request.trim().is_empty() {
        return Err(PipelineError::InvalidInput(format!(
            "{} contains no request",
            path.display()
        )));
    }
    if let Some(provided_path) = provided_equipment {
        let provided: ProvidedEquipment = serde_json::from_str(&read_file(provided_path)?)
            .map_err(|e| PipelineError::InvalidInput(format!("{}: {}", provided_path.display(), e)))?;
        input.provided = provided;
    }
    if let Some(text) = instructions {
        input.custom_instructions = Some(text.to_string());
    }
    Ok(input)
}

fn read_file(path: &Path) -> Result<String, PipelineError> {
    std::fs::read_to_string(path)
        .map_err(|e| PipelineError::InvalidInput(format!("Failed to read {}: {}", path.display(), e)))
}

fn write_store(out: &Path, store: &Value) -> Result<(), PipelineError> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(StorageError::from)?;
        }
    }
    let body = serde_json::to_string_pretty(store)
        .map_err(|e| PipelineError::Schema(format!("Failed to serialize store: {}", e)))?;
    std::fs::write(out, body).map_err(StorageError::from)?;
    info!(out = %out.display(), "store written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn plain_text_and_json_inputs() {
        let temp = TempDir::new().unwrap();
        let text = temp.path().join("request.txt");
        std::fs::write(&text, "  Three full-body days.\n").unwrap();
        let input = load_run_input(&text, None, Some("metric units")).unwrap();
        assert_eq!(input.request, "Three full-body days.");
        assert_eq!(input.custom_instructions.as_deref(), Some("metric units"));

        let json = temp.path().join("request.json");
        std::fs::write(
            &json,
            r#"{"request": "Upper/lower split", "settings": {"weightKg": 82.5, "birthDateYear": 1988, "progressionPercentageAmount": 2.5}}"#,
        )
        .unwrap();
        let input = load_run_input(&json, None, None).unwrap();
        assert_eq!(input.request, "Upper/lower split");
        assert_eq!(input.settings.weight_kg, 82.5);
    }

    #[test]
    fn empty_request_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.txt");
        std::fs::write(&path, "   ").unwrap();
        assert!(matches!(
            load_run_input(&path, None, None),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn sessions_lists_nothing_on_fresh_workspace() {
        let temp = TempDir::new().unwrap();
        let ctx = RunContext::with_config(temp.path().to_path_buf(), RegimenConfig::default()).unwrap();
        let output = ctx
            .execute(
                &Commands::Sessions {
                    format: "text".to_string(),
                },
                CancelFlag::new(),
            )
            .await
            .unwrap();
        assert_eq!(output, "No resumable sessions.");
    }

    #[tokio::test]
    async fn generate_without_provider_is_reported() {
        let temp = TempDir::new().unwrap();
        let request = temp.path().join("request.txt");
        std::fs::write(&request, "anything").unwrap();
        let ctx = RunContext::with_config(temp.path().to_path_buf(), RegimenConfig::default()).unwrap();
        let err = ctx
            .execute(
                &Commands::Generate {
                    input: request,
                    provided_equipment: None,
                    instructions: None,
                    session: None,
                    out: temp.path().join("store.json"),
                },
                CancelFlag::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ProviderNotConfigured(_)));
    }
}
