//! Schema repair loop.
//!
//! Validates the assembled document and, while errors remain, applies
//! mechanical normalization followed by generator-authored patches that are
//! confined to the locations the errors point at. Every phase change is
//! logged, and the best document seen is kept in case attempts run out.

pub mod normalize;
pub mod targeted;

pub use normalize::{normalize, strip_nulls};
pub use targeted::enclosing_entity;

use crate::error::PipelineError;
use crate::generator::{parse_json_output, GenerationPurpose, GenerationRequest, Generator};
use crate::patch::{self, allowed_scope, validate_changed_paths, validate_patch_scope, PatchOp, PatchScope};
use crate::progress::{RepairAttemptData, SessionLog};
use crate::prompts;
use crate::schema::{SchemaValidator, ValidationError};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairPhase {
    Validating,
    Normalizing,
    Diagnosing,
    RequestingPatch,
    Applying,
    Done,
}

impl RepairPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairPhase::Validating => "validating",
            RepairPhase::Normalizing => "normalizing",
            RepairPhase::Diagnosing => "diagnosing",
            RepairPhase::RequestingPatch => "requesting_patch",
            RepairPhase::Applying => "applying",
            RepairPhase::Done => "done",
        }
    }
}

impl fmt::Display for RepairPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    Validated(Value),
    /// Attempts ran out; the caller opted into the lowest-error document.
    BestEffort { document: Value, error_count: usize },
}

impl RepairOutcome {
    pub fn document(&self) -> &Value {
        match self {
            RepairOutcome::Validated(document) | RepairOutcome::BestEffort { document, .. } => {
                document
            }
        }
    }

    pub fn into_document(self) -> Value {
        match self {
            RepairOutcome::Validated(document) | RepairOutcome::BestEffort { document, .. } => {
                document
            }
        }
    }

    pub fn is_validated(&self) -> bool {
        matches!(self, RepairOutcome::Validated(_))
    }
}

#[derive(Debug, Clone)]
pub struct RepairOptions {
    pub max_attempts: usize,
    pub accept_best_effort: bool,
    pub custom_instructions: Option<String>,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            accept_best_effort: false,
            custom_instructions: None,
        }
    }
}

pub struct RepairLoop {
    generator: Arc<dyn Generator>,
    validator: Arc<dyn SchemaValidator>,
    options: RepairOptions,
    events: Option<(Arc<SessionLog>, String)>,
}

struct Best {
    document: Value,
    error_count: usize,
}

impl RepairLoop {
    pub fn new(
        generator: Arc<dyn Generator>,
        validator: Arc<dyn SchemaValidator>,
        options: RepairOptions,
    ) -> Self {
        Self {
            generator,
            validator,
            options,
            events: None,
        }
    }

    pub fn with_events(mut self, log: Arc<SessionLog>, session_id: impl Into<String>) -> Self {
        self.events = Some((log, session_id.into()));
        self
    }

    fn instructions(&self) -> Option<&str> {
        self.options.custom_instructions.as_deref()
    }

    fn enter(&self, attempt: usize, phase: RepairPhase, error_count: usize, detail: Option<String>) {
        debug!(attempt, phase = %phase, error_count, "repair phase");
        if let Some((log, session_id)) = &self.events {
            log.emit_best_effort(
                session_id,
                "repair_attempt",
                &RepairAttemptData {
                    attempt,
                    phase: phase.as_str().to_string(),
                    error_count,
                    detail,
                },
            );
        }
    }

    pub async fn run(&self, document: Value) -> Result<RepairOutcome, PipelineError> {
        let mut doc = document;
        self.enter(0, RepairPhase::Validating, 0, None);
        let mut errors = self.validator.validate(&doc);
        if errors.is_empty() {
            self.enter(0, RepairPhase::Done, 0, None);
            return Ok(RepairOutcome::Validated(doc));
        }
        info!(error_count = errors.len(), "document failed schema validation, starting repair");

        let mut best = Best {
            document: doc.clone(),
            error_count: errors.len(),
        };
        let max_attempts = self.options.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.enter(attempt, RepairPhase::Normalizing, errors.len(), None);
            let edits = normalize(&mut doc);
            if edits > 0 {
                errors = self.validator.validate(&doc);
                debug!(attempt, edits, error_count = errors.len(), "normalization applied");
                if errors.is_empty() {
                    self.enter(attempt, RepairPhase::Done, 0, None);
                    return Ok(RepairOutcome::Validated(doc));
                }
            }

            self.enter(attempt, RepairPhase::Diagnosing, errors.len(), None);
            if errors.len() < best.error_count {
                best = Best {
                    document: doc.clone(),
                    error_count: errors.len(),
                };
            }

            self.enter(attempt, RepairPhase::RequestingPatch, errors.len(), None);
            match self.patch_once(&doc, &errors).await {
                Ok(patched) => {
                    doc = patched;
                    strip_nulls(&mut doc);
                }
                Err(err) if counts_as_failed_attempt(&err) => {
                    warn!(attempt, error = %err, "repair attempt rejected, document unchanged");
                    self.enter(attempt, RepairPhase::Applying, errors.len(), Some(err.to_string()));
                }
                Err(err) => return Err(err),
            }

            self.enter(attempt, RepairPhase::Validating, errors.len(), None);
            errors = self.validator.validate(&doc);
            if errors.is_empty() {
                info!(attempt, "document validated after repair");
                self.enter(attempt, RepairPhase::Done, 0, None);
                return Ok(RepairOutcome::Validated(doc));
            }
            if errors.len() < best.error_count {
                best = Best {
                    document: doc.clone(),
                    error_count: errors.len(),
                };
            }
        }

        let last_error = errors
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();
        warn!(
            attempts = max_attempts,
            best_error_count = best.error_count,
            last_error = %last_error,
            "repair attempts exhausted"
        );
        if self.options.accept_best_effort {
            Ok(RepairOutcome::BestEffort {
                document: best.document,
                error_count: best.error_count,
            })
        } else {
            Err(PipelineError::RepairExhausted {
                attempts: max_attempts,
                best_error_count: best.error_count,
                last_error,
            })
        }
    }

    /// One patch round: targeted when every error sits inside one entity.
    async fn patch_once(
        &self,
        doc: &Value,
        errors: &[ValidationError],
    ) -> Result<Value, PipelineError> {
        if let Some(entity_path) = single_entity(doc, errors) {
            debug!(entity = %entity_path, "using targeted repair");
            return self.repair_entity(doc, &entity_path, errors).await;
        }
        self.repair_document(doc, errors).await
    }

    /// Repair the entity around `error`, falling back to a document patch
    /// when the error path cannot be located.
    pub async fn repair_item(
        &self,
        document: &Value,
        error: &ValidationError,
    ) -> Result<Value, PipelineError> {
        let errors = std::slice::from_ref(error);
        match enclosing_entity(document, &error.path) {
            Some(entity_path) => self.repair_entity(document, &entity_path, errors).await,
            None => {
                debug!(path = %error.path, "no enclosing entity, falling back to document patch");
                self.repair_document(document, errors).await
            }
        }
    }

    async fn repair_document(
        &self,
        doc: &Value,
        errors: &[ValidationError],
    ) -> Result<Value, PipelineError> {
        let scope = allowed_scope(errors);
        let request = GenerationRequest::json(
            GenerationPurpose::Repair,
            prompts::repair_patch(doc, errors, &scope, self.instructions()),
            &["patch"],
        );
        let label = request.label();
        let reply = self.generator.generate(request).await?;
        let parsed = parse_json_output(&label, &reply.content)?;
        let ops = patch::parse_ops(&parsed).map_err(|e| PipelineError::MalformedOutput {
            item: label,
            detail: format!("reply is not a patch: {e}"),
        })?;
        apply_scoped(doc, &ops, &scope)
    }

    async fn repair_entity(
        &self,
        doc: &Value,
        entity_path: &str,
        errors: &[ValidationError],
    ) -> Result<Value, PipelineError> {
        let entity = patch::apply::get(doc, entity_path)?;
        let entity_id = entity
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(entity_path)
            .to_string();
        let request = GenerationRequest::json(
            GenerationPurpose::ItemRepair,
            prompts::item_repair(entity, errors, self.instructions()),
            &[],
        )
        .for_item(entity_id.clone());
        let label = request.label();
        let reply = self.generator.generate(request).await?;
        let replacement = targeted::prepare_replacement(
            &label,
            parse_json_output(&label, &reply.content)?,
            &entity_id,
        )?;

        let scope = PatchScope {
            exact: Default::default(),
            descendant_roots: [entity_path.to_string()].into_iter().collect(),
        };
        let ops = [PatchOp::Replace {
            path: entity_path.to_string(),
            value: replacement,
        }];
        apply_scoped(doc, &ops, &scope)
    }
}

/// Pre-check, apply, then post-check a patch against `scope`.
pub fn apply_scoped(doc: &Value, ops: &[PatchOp], scope: &PatchScope) -> Result<Value, PipelineError> {
    validate_patch_scope(ops, scope)?;
    let patched = patch::apply(doc, ops)?;
    validate_changed_paths(&patch::diff(doc, &patched), scope)?;
    Ok(patched)
}

fn single_entity(doc: &Value, errors: &[ValidationError]) -> Option<String> {
    let mut found: Option<String> = None;
    for error in errors {
        let path = enclosing_entity(doc, &error.path)?;
        match &found {
            Some(existing) if *existing != path => return None,
            Some(_) => {}
            None => found = Some(path),
        }
    }
    found
}

fn counts_as_failed_attempt(err: &PipelineError) -> bool {
    matches!(
        err,
        PipelineError::Scope(_)
            | PipelineError::Patch(_)
            | PipelineError::MalformedOutput { .. }
            | PipelineError::OutputTruncated { .. }
    )
}
