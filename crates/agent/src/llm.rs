use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use recipebot_core::config::{LlmConfig, LlmProvider};
use recipebot_core::{Message, Role};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 4096;

/// One completion call: the full ordered history plus the model to use.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[async_trait]
impl LlmClient for Arc<dyn LlmClient> {
    fn provider(&self) -> &'static str {
        (**self).provider()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        (**self).complete(request).await
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm client misconfigured: {0}")]
    Configuration(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Builds the HTTP client matching `config.provider`.
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let api_key = config
        .require_api_key()
        .map_err(|error| LlmError::Configuration(error.to_string()))?
        .map(str::to_string);

    let settings = HttpSettings {
        base_url: config.base_url().trim_end_matches('/').to_string(),
        api_key,
        timeout_secs: config.timeout_secs,
    };

    match config.provider {
        LlmProvider::OpenAi | LlmProvider::Ollama => {
            Ok(Arc::new(ChatCompletionsClient::new(config.provider, settings)?))
        }
        LlmProvider::Anthropic => Ok(Arc::new(AnthropicClient::new(settings)?)),
    }
}

#[derive(Clone, Debug)]
struct HttpSettings {
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmError::Http(e.to_string()))
}

fn map_send_error(error: reqwest::Error, timeout_secs: u64) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout(timeout_secs)
    } else {
        LlmError::Http(error.to_string())
    }
}

async fn read_success_body(
    response: reqwest::Response,
    timeout_secs: u64,
) -> Result<String, LlmError> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(LlmError::Response(format!("HTTP {}: {}", status, text)));
    }

    response.text().await.map_err(|e| map_send_error(e, timeout_secs))
}

/// OpenAI-compatible `/chat/completions` client (OpenAI and Ollama).
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    provider: LlmProvider,
    settings: HttpSettings,
}

impl ChatCompletionsClient {
    fn new(provider: LlmProvider, settings: HttpSettings) -> Result<Self, LlmError> {
        let client = build_http_client(settings.timeout_secs)?;
        Ok(Self { client, provider, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

fn chat_request_body(request: &CompletionRequest) -> ChatRequest<'_> {
    ChatRequest {
        model: &request.model,
        messages: request
            .messages
            .iter()
            .map(|message| ChatMessage { role: message.role.as_str(), content: &message.content })
            .collect(),
        temperature: request.temperature,
    }
}

fn parse_chat_response(text: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(text).map_err(|e| LlmError::Serialization(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Response("Missing choices".to_string()))?
        .message
        .content
        .ok_or_else(|| LlmError::Response("Missing message content".to_string()))
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    fn provider(&self) -> &'static str {
        self.provider.as_str()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.settings.api_key {
            let value = format!("Bearer {}", key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).map_err(|e| LlmError::Http(e.to_string()))?,
            );
        }

        debug!(
            provider = self.provider.as_str(),
            model = %request.model,
            messages = request.messages.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .headers(headers)
            .json(&chat_request_body(request))
            .send()
            .await
            .map_err(|e| map_send_error(e, self.settings.timeout_secs))?;

        let text = read_success_body(response, self.settings.timeout_secs).await?;
        parse_chat_response(&text)
    }
}

/// Anthropic Messages API client. System messages travel in the top-level
/// `system` field rather than the message list.
pub struct AnthropicClient {
    client: reqwest::Client,
    settings: HttpSettings,
}

impl AnthropicClient {
    fn new(settings: HttpSettings) -> Result<Self, LlmError> {
        let client = build_http_client(settings.timeout_secs)?;
        Ok(Self { client, settings })
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn anthropic_request_body(request: &CompletionRequest) -> AnthropicRequest<'_> {
    let system_parts = request
        .messages
        .iter()
        .filter(|message| message.role == Role::System)
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>();

    AnthropicRequest {
        model: &request.model,
        max_tokens: ANTHROPIC_MAX_TOKENS,
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        messages: request
            .messages
            .iter()
            .filter(|message| message.role != Role::System)
            .map(|message| ChatMessage { role: message.role.as_str(), content: &message.content })
            .collect(),
        temperature: request.temperature,
    }
}

fn parse_anthropic_response(text: &str) -> Result<String, LlmError> {
    let parsed: AnthropicResponse =
        serde_json::from_str(text).map_err(|e| LlmError::Serialization(e.to_string()))?;

    let texts = parsed
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>();

    if texts.is_empty() {
        return Err(LlmError::Response("Missing text content".to_string()));
    }
    Ok(texts.join(""))
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> &'static str {
        LlmProvider::Anthropic.as_str()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        if let Some(key) = &self.settings.api_key {
            headers.insert(
                "x-api-key",
                HeaderValue::from_str(key).map_err(|e| LlmError::Http(e.to_string()))?,
            );
        }

        let response = self
            .client
            .post(format!("{}/messages", self.settings.base_url))
            .headers(headers)
            .json(&anthropic_request_body(request))
            .send()
            .await
            .map_err(|e| map_send_error(e, self.settings.timeout_secs))?;

        let text = read_success_body(response, self.settings.timeout_secs).await?;
        parse_anthropic_response(&text)
    }
}
