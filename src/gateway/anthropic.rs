//! Anthropic adapter for the messages API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use super::error::ProviderError;
use super::http::{build_client, check_input_size, header_value, read_reply, status_error, timeout_from_env};
use super::pricing::chat_cost;
use super::types::*;
use super::ChatProvider;

const PROVIDER: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// The messages API requires `max_tokens`; used when the request leaves it unset.
pub const DEFAULT_MAX_TOKENS: u32 = 100;

/// Anthropic API adapter for the messages endpoint.
#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl AnthropicAdapter {
    /// Create from API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_config(api_key, DEFAULT_BASE_URL, Duration::from_secs(120))
    }

    /// Create from environment variables.
    ///
    /// Returns `Ok(None)` when `ANTHROPIC_API_KEY` is not set.
    pub fn from_env() -> Result<Option<Self>, ProviderError> {
        let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") else {
            return Ok(None);
        };

        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let timeout = timeout_from_env("ANTHROPIC_TIMEOUT_SECONDS", Duration::from_secs(120));

        Self::with_config(api_key, base_url, timeout).map(Some)
    }

    /// Create with custom configuration. `base_url` excludes the `/v1` suffix.
    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", header_value(&api_key, "API key")?);
        headers.insert("anthropic-version", header_value(API_VERSION, "API version")?);

        let client = build_client(headers, timeout)?;
        Ok(Self { client, base_url })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Serialize)]
struct MessagesApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesApiResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
}

// =============================================================================
// CHAT PROVIDER IMPL
// =============================================================================

#[async_trait]
impl ChatProvider for AnthropicAdapter {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        check_input_size(req.input_chars())?;

        // System turns travel in a top-level field, not in `messages`.
        let system: Vec<&str> = req
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let messages: Vec<ApiMessage> = req
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ApiMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect();

        if messages.is_empty() {
            return Err(ProviderError::invalid_request(
                "Anthropic requests need at least one user message",
            ));
        }

        let start = Instant::now();

        let api_req = MessagesApiRequest {
            model: req.model.model_id(),
            max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: req.temperature,
            system: if system.is_empty() {
                None
            } else {
                Some(system.join("\n\n"))
            },
            messages,
        };

        let response = self
            .client
            .post(self.messages_url())
            .json(&api_req)
            .send()
            .await?;

        let reply = read_reply(PROVIDER, "request-id", response).await?;

        if !reply.status.is_success() {
            let (message, code) = match serde_json::from_str::<ErrorEnvelope>(&reply.body) {
                Ok(ErrorEnvelope { error: Some(error) }) => (error.message, error.error_type),
                _ => (None, None),
            };
            return Err(status_error(PROVIDER, reply, message, code));
        }

        let parsed: MessagesApiResponse = serde_json::from_str(&reply.body).map_err(|e| {
            ProviderError::provider(PROVIDER, format!("Invalid JSON: {e}"), false)
        })?;

        let content: String = parsed
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = parsed.usage.ok_or_else(|| {
            ProviderError::provider(PROVIDER, "Missing usage in response", false)
        })?;

        let input_tokens = usage.input_tokens.unwrap_or(0);
        let output_tokens = usage.output_tokens.unwrap_or(0);

        Ok(ChatResponse {
            content,
            input_tokens,
            output_tokens,
            cost_nanodollars: chat_cost(req.model.model_id(), input_tokens, output_tokens),
            latency: start.elapsed(),
            finish_reason: FinishReason::from(parsed.stop_reason),
        })
    }
}
