//! Provider gateway for OpenAI and Anthropic chat calls.
//!
//! The gateway owns everything about talking to a remote model: routing by
//! provider, pacing calls under the rate limit, optional retry with backoff,
//! and usage recording. Experiment drivers only see [`ChatGateway`].

pub mod anthropic;
pub mod error;
pub(crate) mod http;
pub mod openai;
pub mod pacing;
pub mod pricing;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use anthropic::AnthropicAdapter;
use openai::OpenAiAdapter;
use pacing::IntervalGate;
use usage::ProviderCallRecord;

pub use error::{ErrorContext, ProviderError};
pub use pricing::*;
pub use types::*;
pub use usage::{NoopUsageSink, TracingUsageSink, UsageSink};

/// Anything that can answer a chat request. Implemented by [`ProviderGateway`]
/// and by test doubles.
#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Whether requests for this model can be routed at all.
    fn supports(&self, _model: &ChatModel) -> bool {
        true
    }
}

/// A single provider backend.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Extra attempts after a retryable failure. Zero means fail on first error.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Minimum spacing between the starts of consecutive provider calls.
    pub min_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_base_delay: Duration::from_secs(1),
            min_interval: Duration::from_secs(1),
        }
    }
}

pub struct ProviderGateway<U: UsageSink> {
    openai: Option<OpenAiAdapter>,
    anthropic: Option<AnthropicAdapter>,
    usage_sink: Arc<U>,
    config: GatewayConfig,
    gate: IntervalGate,
}

#[async_trait::async_trait]
impl<U: UsageSink> ChatGateway for ProviderGateway<U> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }

    fn supports(&self, model: &ChatModel) -> bool {
        ProviderGateway::supports(self, model)
    }
}

impl<U: UsageSink> ProviderGateway<U> {
    /// Build from environment. Providers without an API key stay unconfigured.
    pub fn from_env(usage_sink: Arc<U>, config: GatewayConfig) -> Result<Self, ProviderError> {
        let openai = OpenAiAdapter::from_env()?;
        let anthropic = AnthropicAdapter::from_env()?;
        if openai.is_none() && anthropic.is_none() {
            return Err(ProviderError::config(
                "neither OPENAI_API_KEY nor ANTHROPIC_API_KEY is set",
            ));
        }
        Ok(Self::with_config(openai, anthropic, usage_sink, config))
    }

    pub fn with_config(
        openai: Option<OpenAiAdapter>,
        anthropic: Option<AnthropicAdapter>,
        usage_sink: Arc<U>,
        config: GatewayConfig,
    ) -> Self {
        let gate = IntervalGate::new(config.min_interval);
        Self {
            openai,
            anthropic,
            usage_sink,
            config,
            gate,
        }
    }

    /// Whether a backend for this model's provider is configured.
    pub fn supports(&self, model: &ChatModel) -> bool {
        self.provider_for(model).is_ok()
    }

    fn provider_for(&self, model: &ChatModel) -> Result<&dyn ChatProvider, ProviderError> {
        let provider: Option<&dyn ChatProvider> = match model {
            ChatModel::OpenAi(_) => self.openai.as_ref().map(|p| p as &dyn ChatProvider),
            ChatModel::Anthropic(_) => self.anthropic.as_ref().map(|p| p as &dyn ChatProvider),
        };
        provider.ok_or_else(|| {
            ProviderError::config(format!(
                "{} provider not configured (model {})",
                model.provider(),
                model.model_id()
            ))
        })
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let provider = self.provider_for(&req.model)?;
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..=self.config.max_retries {
            self.gate.acquire().await;

            match provider.chat(&req).await {
                Ok(resp) => {
                    self.record_usage(&req, &resp, attempt, None).await;
                    return Ok(resp);
                }
                Err(err) => {
                    self.record_usage(&req, &ChatResponse::empty(), attempt, Some(err.code()))
                        .await;

                    if !err.is_retryable() || attempt == self.config.max_retries {
                        return Err(err);
                    }

                    let delay = backoff_delay(self.config.retry_base_delay, attempt)
                        .max(err.retry_after().unwrap_or_default());
                    tracing::debug!(
                        error = %err,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retrying provider call"
                    );
                    last_error = Some(err);
                    sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::provider(req.model.provider(), "unknown error", false)
        }))
    }

    async fn record_usage(
        &self,
        req: &ChatRequest,
        resp: &ChatResponse,
        attempt: u32,
        error_code: Option<&str>,
    ) {
        let endpoint = match req.model {
            ChatModel::OpenAi(_) => "chat/completions",
            ChatModel::Anthropic(_) => "messages",
        };
        let record = ProviderCallRecord::new(
            req.model.provider(),
            endpoint,
            req.model.model_id(),
            req.attribution.caller,
        )
        .tokens(resp.input_tokens as i32, resp.output_tokens as i32)
        .cost(resp.cost_nanodollars)
        .run(req.attribution.run_id)
        .latency(resp.latency.as_millis() as i32)
        .attempt(attempt + 1);

        let record = match error_code {
            Some(code) => record.error(code),
            None => record,
        };

        self.usage_sink.record(record).await;
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u64.pow(attempt.min(5));
    base * multiplier as u32
}
