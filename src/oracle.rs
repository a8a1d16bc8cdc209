//! LLM oracle abstraction and implementations.
//!
//! The oracle is a chat-completion endpoint consumed as a request/response
//! function: one user message in, one text reply out. It is used twice:
//!
//! - by the retrieval engine, as a relevance judge returning node ids
//!   ([`ResponseFormat::Json`]),
//! - by the palace narration, as a free-text generator
//!   ([`ResponseFormat::Text`]).
//!
//! Implementations:
//! - **[`DisabledOracle`]** — always fails; used when no provider is configured
//!   or its API key is missing.
//! - **[`OpenAiOracle`]** — any OpenAI-compatible `POST /chat/completions`
//!   backend (DeepSeek by default).
//!
//! No retries happen here. A failed call is reported once and the retrieval
//! engine turns it into its empty-result fallback.

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::OracleConfig;

/// Errors from a single oracle call.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle is disabled")]
    Disabled,

    #[error("{0} environment variable not set")]
    MissingApiKey(String),

    #[error("oracle request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("oracle returned no content")]
    EmptyResponse,
}

/// Shape of reply requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// A JSON object (`response_format: json_object`) when the backend
    /// supports it.
    Json,
    Text,
}

/// A single-message completion request.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub prompt: String,
    pub format: ResponseFormat,
}

impl OracleRequest {
    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            format: ResponseFormat::Json,
        }
    }

    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            format: ResponseFormat::Text,
        }
    }
}

/// A chat-completion backend.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// concurrent search.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Send `request` and return the reply text.
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

// ============ Disabled Oracle ============

/// An oracle that refuses every request.
pub struct DisabledOracle;

#[async_trait]
impl Oracle for DisabledOracle {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _request: &OracleRequest) -> Result<String, OracleError> {
        Err(OracleError::Disabled)
    }
}

// ============ OpenAI-compatible Oracle ============

/// Oracle backed by an OpenAI-compatible chat-completion API.
///
/// Sends `POST {base_url}/chat/completions` with bearer auth. The HTTP
/// client carries the configured timeout as a backstop; the retrieval engine
/// applies its own deadline on top.
pub struct OpenAiOracle {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    json_mode: bool,
}

impl OpenAiOracle {
    /// Create an oracle reading the API key from `config.api_key_env`.
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OracleError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: &OracleConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            json_mode: config.json_mode,
        })
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatRequest>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormatRequest {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

#[async_trait]
impl Oracle for OpenAiOracle {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let response_format = (request.format == ResponseFormat::Json && self.json_mode)
            .then_some(ResponseFormatRequest {
                format_type: "json_object",
            });

        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            response_format,
            stream: false,
        };

        debug!(
            model = %self.model,
            prompt_chars = request.prompt.chars().count(),
            "sending oracle request"
        );

        let response = self
            .client
            .post(self.chat_completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(OracleError::EmptyResponse)
    }
}

/// Instantiate the oracle named by `config.provider`.
///
/// An `openai` provider without its API key degrades to [`DisabledOracle`]
/// with a warning, so retrieval returns empty results instead of failing.
pub fn create_oracle(config: &OracleConfig) -> anyhow::Result<Arc<dyn Oracle>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledOracle)),
        "openai" => match OpenAiOracle::new(config) {
            Ok(oracle) => Ok(Arc::new(oracle)),
            Err(OracleError::MissingApiKey(var)) => {
                warn!(
                    env = %var,
                    "oracle API key missing; retrieval will return empty context"
                );
                Ok(Arc::new(DisabledOracle))
            }
            Err(e) => Err(e.into()),
        },
        other => bail!("Unknown oracle provider: {}", other),
    }
}
