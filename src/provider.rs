//! Chat-completion clients.
//!
//! The generator only sees [`ModelProviderClient`]. Hosted and local endpoints
//! are reached through one of two wire dialects: OpenAI-style
//! `/chat/completions` or Anthropic-style `/messages`.

use crate::error::PipelineError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub mod profile;

pub use profile::{ProviderConfig, ProviderType};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// A provider profile resolved to concrete connection details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelProvider {
    OpenAI {
        model: String,
        api_key: String,
        base_url: Option<String>,
    },
    Anthropic {
        model: String,
        api_key: String,
        base_url: Option<String>,
    },
    /// Served through Ollama's OpenAI-compatible `/v1` surface.
    Ollama {
        model: String,
        base_url: Option<String>,
    },
    /// Any OpenAI-compatible server; `endpoint` already includes the version prefix.
    LocalCustom {
        model: String,
        endpoint: String,
        api_key: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    fn wire_name(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }
}

/// Sampling and output settings for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    /// Output token cap. The generator's budget ladder raises this on truncation.
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
    /// Request a JSON object body where the dialect supports it.
    #[serde(default)]
    pub json_response: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: Some(1.0),
            max_tokens: None,
            top_p: None,
            stop: None,
            json_response: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    /// Raw stop reason as reported by the endpoint (`stop`, `length`, `max_tokens`, ...).
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait ModelProviderClient: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, PipelineError>;

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}

fn http_client() -> Result<Client, PipelineError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| PipelineError::ProviderError(format!("cannot build HTTP client: {}", e)))
}

/// Transport failures. Timeouts and refused connections are the transient kind.
fn transport_error(error: reqwest::Error) -> PipelineError {
    match error.status() {
        Some(status) => status_error(status.as_u16(), &error.to_string()),
        None if error.is_timeout() || error.is_connect() => {
            PipelineError::ProviderConnection(error.to_string())
        }
        None => PipelineError::ProviderError(error.to_string()),
    }
}

fn status_error(status: u16, body: &str) -> PipelineError {
    match status {
        401 | 403 => PipelineError::ProviderAuthFailed(format!("HTTP {}: {}", status, body)),
        404 => PipelineError::ProviderModelNotFound(format!("HTTP {}: {}", status, body)),
        429 => PipelineError::ProviderRateLimit(format!("HTTP {}: {}", status, body)),
        _ => PipelineError::ProviderRequestFailed(format!("HTTP {}: {}", status, body)),
    }
}

/// Send a JSON body and decode a JSON reply, mapping non-2xx into typed errors.
async fn send_json<T: for<'de> Deserialize<'de>>(
    request: RequestBuilder,
    body: &Value,
) -> Result<T, PipelineError> {
    let response = request.json(body).send().await.map_err(transport_error)?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(status_error(status.as_u16(), &text));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| PipelineError::ProviderError(format!("unreadable completion body: {}", e)))
}

fn wire_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| json!({ "role": m.role.wire_name(), "content": m.content }))
        .collect()
}

/// Body for an OpenAI-style `/chat/completions` call.
fn chat_completions_body(model: &str, messages: &[ChatMessage], options: &CompletionOptions) -> Value {
    let mut body = json!({
        "model": model,
        "messages": wire_messages(messages),
        "stream": false,
    });
    if let Some(temperature) = options.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = options.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(top_p) = options.top_p {
        body["top_p"] = json!(top_p);
    }
    if let Some(stop) = &options.stop {
        body["stop"] = json!(stop);
    }
    if options.json_response {
        body["response_format"] = json!({ "type": "json_object" });
    }
    body
}

#[derive(Deserialize)]
struct ChatCompletionReply {
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// OpenAI-compatible client. Also serves Ollama and custom local servers.
pub struct OpenAIClient {
    http: Client,
    provider: &'static str,
    model: String,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAIClient {
    fn build(
        provider: &'static str,
        model: String,
        api_key: Option<String>,
        base_url: String,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            http: http_client()?,
            provider,
            model,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Result<Self, PipelineError> {
        let base = base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_string());
        Self::build("openai", model, Some(api_key), base)
    }

    pub fn ollama(model: String, base_url: Option<String>) -> Result<Self, PipelineError> {
        let host = base_url.unwrap_or_else(|| OLLAMA_BASE_URL.to_string());
        Self::build("ollama", model, None, format!("{}/v1", host.trim_end_matches('/')))
    }

    pub fn local(model: String, endpoint: String, api_key: Option<String>) -> Result<Self, PipelineError> {
        Self::build("local", model, api_key, endpoint)
    }
}

#[async_trait]
impl ModelProviderClient for OpenAIClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, PipelineError> {
        let body = chat_completions_body(&self.model, &messages, &options);
        let mut request = self.http.post(format!("{}/chat/completions", self.base_url));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let reply: ChatCompletionReply = send_json(request, &body).await?;

        let choice = reply
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::ProviderError("completion had no choices".to_string()))?;
        let usage = reply
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();
        let model = if reply.model.is_empty() {
            self.model.clone()
        } else {
            reply.model
        };

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model,
            usage,
            finish_reason: choice.finish_reason,
        })
    }

    fn provider_name(&self) -> &str {
        self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Body for an Anthropic-style `/messages` call. System turns are folded into
/// the top-level `system` field.
fn messages_body(model: &str, messages: &[ChatMessage], options: &CompletionOptions) -> Value {
    let (system, turns): (Vec<&ChatMessage>, Vec<&ChatMessage>) = messages
        .iter()
        .partition(|m| m.role == MessageRole::System);
    let turns: Vec<ChatMessage> = turns.into_iter().cloned().collect();

    let mut body = json!({
        "model": model,
        "max_tokens": options.max_tokens.unwrap_or(AnthropicClient::DEFAULT_MAX_TOKENS),
        "messages": wire_messages(&turns),
    });
    if !system.is_empty() {
        let joined: Vec<&str> = system.iter().map(|m| m.content.as_str()).collect();
        body["system"] = json!(joined.join("\n\n"));
    }
    if let Some(temperature) = options.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(stop) = &options.stop {
        body["stop_sequences"] = json!(stop);
    }
    body
}

#[derive(Deserialize)]
struct MessagesReply {
    content: Vec<MessagesBlock>,
    model: String,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Deserialize)]
struct MessagesBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

pub struct AnthropicClient {
    http: Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    const DEFAULT_MAX_TOKENS: u32 = 4096;

    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Result<Self, PipelineError> {
        let base = base_url.unwrap_or_else(|| ANTHROPIC_BASE_URL.to_string());
        Ok(Self {
            http: http_client()?,
            model,
            api_key,
            base_url: base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ModelProviderClient for AnthropicClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, PipelineError> {
        let body = messages_body(&self.model, &messages, &options);
        let request = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let reply: MessagesReply = send_json(request, &body).await?;

        let content: String = reply.content.iter().map(|block| block.text.as_str()).collect();
        let usage = reply
            .usage
            .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens))
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            model: reply.model,
            usage,
            finish_reason: reply.stop_reason,
        })
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_client(
        provider: &ModelProvider,
    ) -> Result<Box<dyn ModelProviderClient>, PipelineError> {
        let client: Box<dyn ModelProviderClient> = match provider.clone() {
            ModelProvider::OpenAI {
                model,
                api_key,
                base_url,
            } => Box::new(OpenAIClient::new(model, api_key, base_url)?),
            ModelProvider::Anthropic {
                model,
                api_key,
                base_url,
            } => Box::new(AnthropicClient::new(model, api_key, base_url)?),
            ModelProvider::Ollama { model, base_url } => {
                Box::new(OpenAIClient::ollama(model, base_url)?)
            }
            ModelProvider::LocalCustom {
                model,
                endpoint,
                api_key,
            } => Box::new(OpenAIClient::local(model, endpoint, api_key)?),
        };
        Ok(client)
    }
}

/// Scripted client for unit tests.
#[cfg(test)]
pub struct MockProvider {
    responses: Vec<(String, Option<String>)>,
    current: std::sync::Arc<parking_lot::Mutex<usize>>,
    seen_max_tokens: std::sync::Arc<parking_lot::Mutex<Vec<Option<u32>>>>,
}

#[cfg(test)]
impl MockProvider {
    /// Scripted `(content, finish_reason)` replies, returned in order.
    pub fn new(responses: Vec<(&str, Option<&str>)>) -> Self {
        Self {
            responses: responses
                .into_iter()
                .map(|(c, r)| (c.to_string(), r.map(str::to_string)))
                .collect(),
            current: Default::default(),
            seen_max_tokens: Default::default(),
        }
    }

    pub fn seen_max_tokens(&self) -> Vec<Option<u32>> {
        self.seen_max_tokens.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ModelProviderClient for MockProvider {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, PipelineError> {
        self.seen_max_tokens.lock().push(options.max_tokens);
        let mut idx = self.current.lock();
        let (content, finish_reason) = self
            .responses
            .get(*idx)
            .cloned()
            .unwrap_or_else(|| ("{}".to_string(), Some("stop".to_string())));
        *idx += 1;

        Ok(CompletionResponse {
            content,
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            },
            finish_reason,
        })
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
