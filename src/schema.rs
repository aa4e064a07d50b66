//! Document validation against the workout-store JSON Schema.
//!
//! The schema itself is supplied externally (or falls back to the bundled
//! default); this module only turns validator output into pointer-addressed
//! [`ValidationError`]s the repair loop can scope patches from.

use crate::error::PipelineError;
use jsonschema::error::{TypeKind, ValidationErrorKind as RawKind};
use jsonschema::primitive_type::PrimitiveType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

const DEFAULT_SCHEMA: &str = include_str!("../schemas/workout_store.schema.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationErrorKind {
    Required { property: String },
    Type { on_array: bool },
    Enum,
    MinItems,
    MaxItems,
    AdditionalProperties { properties: Vec<String> },
    Range,
    Other,
}

/// One schema failure, addressed by JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub path: String,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

pub trait SchemaValidator: Send + Sync {
    /// Every violation in `document`; empty when valid.
    fn validate(&self, document: &Value) -> Vec<ValidationError>;
}

pub struct JsonSchemaValidator {
    validator: jsonschema::Validator,
}

impl JsonSchemaValidator {
    pub fn new(schema: &Value) -> Result<Self, PipelineError> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| PipelineError::Schema(format!("Invalid schema: {}", e)))?;
        Ok(Self { validator })
    }

    /// Validator for the bundled workout-store schema.
    pub fn bundled() -> Result<Self, PipelineError> {
        let schema: Value = serde_json::from_str(DEFAULT_SCHEMA)
            .map_err(|e| PipelineError::Schema(format!("Bundled schema is not JSON: {}", e)))?;
        Self::new(&schema)
    }

    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Schema(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let schema: Value = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Schema(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Self::new(&schema)
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, document: &Value) -> Vec<ValidationError> {
        self.validator
            .iter_errors(document)
            .map(|e| {
                let message = e.to_string();
                let kind = classify(&e.kind);
                ValidationError {
                    path: e.instance_path.to_string(),
                    kind,
                    message,
                }
            })
            .collect()
    }
}

/// Whether the schema expected an array at the failing location.
fn expects_array(kind: &TypeKind) -> bool {
    match kind {
        TypeKind::Single(expected) => *expected == PrimitiveType::Array,
        TypeKind::Multiple(expected) => expected.into_iter().any(|t| t == PrimitiveType::Array),
    }
}

fn classify(kind: &RawKind) -> ValidationErrorKind {
    match kind {
        RawKind::Required { property } => ValidationErrorKind::Required {
            property: property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string()),
        },
        RawKind::Type { kind } => ValidationErrorKind::Type {
            on_array: expects_array(kind),
        },
        RawKind::Enum { .. } | RawKind::Constant { .. } => ValidationErrorKind::Enum,
        RawKind::MinItems { .. } => ValidationErrorKind::MinItems,
        RawKind::MaxItems { .. } => ValidationErrorKind::MaxItems,
        RawKind::AdditionalProperties { unexpected } => {
            ValidationErrorKind::AdditionalProperties {
                properties: unexpected.clone(),
            }
        }
        RawKind::Minimum { .. }
        | RawKind::Maximum { .. }
        | RawKind::ExclusiveMinimum { .. }
        | RawKind::ExclusiveMaximum { .. } => ValidationErrorKind::Range,
        _ => ValidationErrorKind::Other,
    }
}
