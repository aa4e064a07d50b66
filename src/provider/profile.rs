//! Provider configuration profile and its conversion to a live endpoint.

use crate::error::PipelineError;
use crate::provider::{CompletionOptions, ModelProvider};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "local")]
    LocalCustom,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Ollama => "ollama",
            ProviderType::LocalCustom => "local",
        }
    }

    /// Environment variable consulted when no key is configured.
    fn api_key_env(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("OPENAI_API_KEY"),
            ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderType::Ollama | ProviderType::LocalCustom => None,
        }
    }
}

/// `[provider]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub provider_name: Option<String>,
    pub provider_type: ProviderType,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub default_options: CompletionOptions,
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!("Invalid endpoint URL: {}", endpoint));
            }
        }
        if self.provider_type == ProviderType::LocalCustom && self.endpoint.is_none() {
            return Err("Local providers require an endpoint".to_string());
        }
        if let Some(temp) = self.default_options.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(format!("Temperature must be between 0.0 and 2.0, got {}", temp));
            }
        }
        Ok(())
    }

    fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.provider_type
                .api_key_env()
                .and_then(|var| std::env::var(var).ok())
        })
    }

    pub fn to_model_provider(&self) -> Result<ModelProvider, PipelineError> {
        let name = self
            .provider_name
            .clone()
            .unwrap_or_else(|| self.provider_type.as_str().to_string());
        let require_key = || {
            self.resolve_api_key().ok_or_else(|| {
                PipelineError::ProviderNotConfigured(format!("No API key for provider {}", name))
            })
        };
        Ok(match self.provider_type {
            ProviderType::OpenAI => ModelProvider::OpenAI {
                model: self.model.clone(),
                api_key: require_key()?,
                base_url: self.endpoint.clone(),
            },
            ProviderType::Anthropic => ModelProvider::Anthropic {
                model: self.model.clone(),
                api_key: require_key()?,
                base_url: self.endpoint.clone(),
            },
            ProviderType::Ollama => ModelProvider::Ollama {
                model: self.model.clone(),
                base_url: self.endpoint.clone(),
            },
            ProviderType::LocalCustom => ModelProvider::LocalCustom {
                model: self.model.clone(),
                endpoint: self.endpoint.clone().ok_or_else(|| {
                    PipelineError::ProviderNotConfigured(format!(
                        "Provider {} has no endpoint",
                        name
                    ))
                })?,
                api_key: self.resolve_api_key(),
            },
        })
    }
}
