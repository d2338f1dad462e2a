//! HTTP plumbing shared by the provider adapters.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;

use super::error::{ErrorContext, ProviderError};

/// Maximum allowed response body length (1MB).
pub const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Maximum allowed input characters (~125k tokens).
pub const MAX_INPUT_CHARS: usize = 500_000;

/// Wait assumed for a 429 without a usable `retry-after` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Build a JSON client with provider auth headers baked in.
pub(crate) fn build_client(
    mut headers: HeaderMap,
    timeout: Duration,
) -> Result<reqwest::Client, ProviderError> {
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .gzip(true)
        .build()
        .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))
}

pub(crate) fn header_value(value: &str, what: &str) -> Result<HeaderValue, ProviderError> {
    HeaderValue::from_str(value).map_err(|_| ProviderError::config(format!("Invalid {what} format")))
}

/// Read a timeout in whole seconds from the environment.
pub(crate) fn timeout_from_env(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// A fully buffered provider response.
pub(crate) struct RawReply {
    pub status: StatusCode,
    pub body: String,
    pub context: ErrorContext,
    pub retry_after: Duration,
}

/// Reject oversized prompts before they leave the process.
pub(crate) fn check_input_size(total_chars: usize) -> Result<(), ProviderError> {
    if total_chars > MAX_INPUT_CHARS {
        return Err(ProviderError::invalid_request(format!(
            "Input too large: {total_chars} chars (max {MAX_INPUT_CHARS})"
        )));
    }
    Ok(())
}

/// Stream the body into memory, enforcing the size limit.
pub(crate) async fn read_reply(
    provider: &'static str,
    request_id_header: &str,
    mut response: reqwest::Response,
) -> Result<RawReply, ProviderError> {
    let status = response.status();
    let request_id = response
        .headers()
        .get(request_id_header)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER);

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let new_len = bytes.len() + chunk.len();
        if new_len > MAX_RESPONSE_LEN {
            return Err(ProviderError::provider(
                provider,
                format!("Response too large: {new_len} bytes"),
                false,
            ));
        }
        bytes.extend_from_slice(&chunk);
    }

    let context = ErrorContext::new().with_status(status.as_u16());
    let context = match request_id {
        Some(id) => context.with_request_id(id),
        None => context,
    };

    Ok(RawReply {
        status,
        body: String::from_utf8_lossy(&bytes).to_string(),
        context,
        retry_after,
    })
}

/// Map a non-success status to a provider error.
///
/// 429 is a rate limit; 5xx (including Anthropic's 529 "overloaded") is
/// retryable; everything else is permanent.
pub(crate) fn status_error(
    provider: &'static str,
    reply: RawReply,
    message: Option<String>,
    code: Option<String>,
) -> ProviderError {
    let status = reply.status;
    let context = match code {
        Some(code) => reply.context.with_code(code),
        None => reply.context,
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::rate_limited(provider, reply.retry_after, context);
    }

    let message = message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    ProviderError::provider_with_context(provider, message, status.is_server_error(), context)
}
