//! Chat-completion client for OpenAI-compatible endpoints (DeepSeek by default).
//!
//! The client only moves text: it sends one user message and returns the
//! assistant's reply. Transport and protocol failures come back as typed
//! `LlmError` variants so callers can decide what to retry without looking at
//! error strings.

use crate::http::{HttpClient, HttpError, HttpRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Timeout used by the connectivity probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("could not connect: {0}")]
    Connection(String),
    #[error("API key rejected (status {0})")]
    Unauthorized(u16),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl LlmError {
    /// Whether another attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Timeout(_) | LlmError::Connection(_) | LlmError::Transport(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Variant name, used in user-facing error records
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::MissingApiKey => "MissingApiKey",
            LlmError::Timeout(_) => "Timeout",
            LlmError::Connection(_) => "Connection",
            LlmError::Unauthorized(_) => "Unauthorized",
            LlmError::Api { .. } => "Api",
            LlmError::MalformedResponse(_) => "MalformedResponse",
            LlmError::Transport(_) => "Transport",
        }
    }
}

impl From<HttpError> for LlmError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Timeout(msg) => LlmError::Timeout(msg),
            HttpError::Connect(msg) => LlmError::Connection(msg),
            HttpError::Other(msg) => LlmError::Transport(msg),
        }
    }
}

/// One single-message completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    /// Ask the endpoint for a JSON object response
    pub json_output: bool,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: 0.1,
            json_output: false,
            max_tokens: None,
            timeout,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send the request and return the assistant's text
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;

    /// Cheap round trip used to diagnose connection failures
    async fn probe(&self, model: &str) -> Result<(), LlmError>;
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireReply,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    content: Option<String>,
}

/// `ChatClient` for any endpoint speaking the OpenAI chat-completions protocol
pub struct OpenAiCompatClient {
    http: Arc<dyn HttpClient>,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(http: Arc<dyn HttpClient>, endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            api_key,
        }
    }

    fn wire_body(request: &ChatRequest) -> Result<serde_json::Value, LlmError> {
        let wire = WireRequest {
            model: &request.model,
            messages: vec![WireMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_output.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };
        serde_json::to_value(&wire).map_err(|e| LlmError::Transport(e.to_string()))
    }
}

#[async_trait]
impl ChatClient for OpenAiCompatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let body = Self::wire_body(request)?;
        debug!(model = %request.model, prompt_chars = request.prompt.chars().count(), "chat request");

        let http_request = HttpRequest::post_json(&self.endpoint, body, request.timeout)
            .bearer(api_key)
            .header("Content-Type", "application/json");
        let response = self.http.execute(http_request).await?;

        match response.status {
            401 | 403 => return Err(LlmError::Unauthorized(response.status)),
            status if !response.is_success() => {
                return Err(LlmError::Api {
                    status,
                    message: response.body.chars().take(200).collect(),
                })
            }
            _ => {}
        }

        let parsed: WireResponse = serde_json::from_str(&response.body)
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::MalformedResponse("no content in response".to_string()))
    }

    async fn probe(&self, model: &str) -> Result<(), LlmError> {
        let request = ChatRequest::new(model, "Hello", PROBE_TIMEOUT).max_tokens(5);
        self.complete(&request).await.map(|_| ())
    }
}
