//! Generation requests and the generator seam.
//!
//! Every stage asks a [`Generator`] for content. The production implementation
//! is [`LadderGenerator`], which sits on a provider client and handles
//! transport retries and truncation escalation; tests substitute scripted
//! generators.

pub mod ladder;
pub mod probe;
pub mod retry;

pub use ladder::LadderGenerator;
pub use probe::{is_complete, parse_json_output};
pub use retry::RetryPolicy;

use crate::error::PipelineError;
use crate::provider::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a request is for; routes scripted generators and labels logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPurpose {
    Summary,
    Plan,
    Equipment,
    Accessory,
    Exercise,
    Workout,
    Repair,
    ItemRepair,
}

impl GenerationPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationPurpose::Summary => "summary",
            GenerationPurpose::Plan => "plan",
            GenerationPurpose::Equipment => "equipment",
            GenerationPurpose::Accessory => "accessory",
            GenerationPurpose::Exercise => "exercise",
            GenerationPurpose::Workout => "workout",
            GenerationPurpose::Repair => "repair",
            GenerationPurpose::ItemRepair => "item_repair",
        }
    }
}

impl fmt::Display for GenerationPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub purpose: GenerationPurpose,
    pub item_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    /// Starting output budget; the ladder only ever goes up from here.
    pub max_output_tokens: Option<u32>,
    pub json: bool,
    /// Top-level keys a complete JSON reply must carry.
    pub expected_keys: Vec<String>,
}

impl GenerationRequest {
    pub fn new(purpose: GenerationPurpose, messages: Vec<ChatMessage>) -> Self {
        Self {
            purpose,
            item_id: None,
            messages,
            max_output_tokens: None,
            json: false,
            expected_keys: Vec::new(),
        }
    }

    /// JSON request whose reply must contain `keys`.
    pub fn json(purpose: GenerationPurpose, messages: Vec<ChatMessage>, keys: &[&str]) -> Self {
        Self {
            json: true,
            expected_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::new(purpose, messages)
        }
    }

    pub fn for_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    /// Label for logs and errors: the item id when present, else the purpose.
    pub fn label(&self) -> String {
        match &self.item_id {
            Some(id) => format!("{}:{}", self.purpose, id),
            None => self.purpose.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Complete,
    Truncated,
    Other(String),
}

impl FinishReason {
    pub fn from_provider(raw: Option<&str>) -> Self {
        match raw {
            None | Some("stop") | Some("end_turn") | Some("stop_sequence") => FinishReason::Complete,
            Some("length") | Some("max_tokens") | Some("truncated") => FinishReason::Truncated,
            Some(other) => FinishReason::Other(other.to_string()),
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, FinishReason::Truncated)
    }
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub content: String,
    pub finish_reason: FinishReason,
}

impl Generation {
    pub fn complete(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: FinishReason::Complete,
        }
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reasons_from_providers() {
        assert_eq!(FinishReason::from_provider(Some("stop")), FinishReason::Complete);
        assert_eq!(FinishReason::from_provider(None), FinishReason::Complete);
        assert!(FinishReason::from_provider(Some("length")).is_truncated());
        assert!(FinishReason::from_provider(Some("max_tokens")).is_truncated());
        assert_eq!(
            FinishReason::from_provider(Some("content_filter")),
            FinishReason::Other("content_filter".to_string())
        );
    }

    #[test]
    fn request_label_prefers_item() {
        let request = GenerationRequest::new(GenerationPurpose::Exercise, Vec::new())
            .for_item("EXERCISE_2");
        assert_eq!(request.label(), "exercise:EXERCISE_2");
        assert_eq!(
            GenerationRequest::new(GenerationPurpose::Plan, Vec::new()).label(),
            "plan"
        );
    }
}
