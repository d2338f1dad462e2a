use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use choice_harness::gateway::openai::OpenAiAdapter;
use choice_harness::gateway::{
    Attribution, ChatModel, ChatProvider, ChatRequest, FinishReason, GatewayConfig, Message,
    NoopUsageSink, ProviderError, ProviderGateway,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn gpt_request() -> ChatRequest {
    ChatRequest::new(
        ChatModel::openai("gpt-3.5-turbo"),
        vec![Message::user("Which service stores objects?\na) S3\nb) EC2\nAnswer:")],
        Attribution::new("test"),
    )
}

fn adapter(server: &MockServer) -> OpenAiAdapter {
    OpenAiAdapter::with_config("sk-test", server.uri(), Duration::from_secs(5)).unwrap()
}

fn quick_config(max_retries: u32) -> GatewayConfig {
    GatewayConfig {
        max_retries,
        retry_base_delay: Duration::from_millis(0),
        min_interval: Duration::ZERO,
    }
}

#[tokio::test]
async fn openai_parses_success_content_and_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "temperature": 0.0,
            "messages": [{ "role": "user" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": "  a) S3\n" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 20 }
        })))
        .mount(&server)
        .await;

    let resp = adapter(&server).chat(&gpt_request()).await.unwrap();
    assert_eq!(resp.content, "  a) S3\n");
    assert_eq!(resp.finish_reason, FinishReason::Stop);
    assert_eq!(resp.input_tokens, 10);
    assert_eq!(resp.output_tokens, 20);
    assert_eq!(
        resp.cost_nanodollars,
        choice_harness::gateway::chat_cost("gpt-3.5-turbo", 10, 20)
    );
}

#[tokio::test]
async fn openai_omits_max_tokens_unless_set() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "b" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
        })))
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    adapter.chat(&gpt_request()).await.unwrap();
    adapter
        .chat(&gpt_request().temperature(0.7).max_tokens(50))
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    let first: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let second: serde_json::Value = serde_json::from_slice(&received[1].body).unwrap();
    assert!(first.get("max_tokens").is_none());
    assert_eq!(second["max_tokens"], 50);
    assert!((second["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
}

#[tokio::test]
async fn openai_null_content_is_a_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": null },
                "finish_reason": "content_filter"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 0 }
        })))
        .mount(&server)
        .await;

    let err = adapter(&server).chat(&gpt_request()).await.unwrap_err();
    assert!(!err.is_retryable());
    assert!(matches!(err, ProviderError::Provider { .. }));
    assert!(err.to_string().contains("No content"));
}

#[tokio::test]
async fn openai_classifies_http_429_as_rate_limit_and_keeps_context() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-request-id", "abc123")
                .insert_header("retry-after", "7")
                .set_body_json(json!({
                    "error": { "message": "rate limited", "code": "rate_limit_exceeded" }
                })),
        )
        .mount(&server)
        .await;

    let err = adapter(&server).chat(&gpt_request()).await.unwrap_err();
    assert!(err.is_retryable());
    match err {
        ProviderError::RateLimited {
            provider,
            retry_after,
            context,
        } => {
            assert_eq!(provider, "openai");
            assert_eq!(retry_after, Duration::from_secs(7));
            let ctx = context.expect("expected error context");
            assert_eq!(ctx.http_status, Some(429));
            assert_eq!(ctx.provider_code.as_deref(), Some("rate_limit_exceeded"));
            assert_eq!(ctx.request_id.as_deref(), Some("abc123"));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn openai_auth_failure_is_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "code": "invalid_api_key" }
        })))
        .mount(&server)
        .await;

    let err = adapter(&server).chat(&gpt_request()).await.unwrap_err();
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("Incorrect API key"));
}

#[derive(Clone)]
struct FlipResponder {
    calls: Arc<AtomicUsize>,
    first: ResponseTemplate,
    second: ResponseTemplate,
}

impl Respond for FlipResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            self.first.clone()
        } else {
            self.second.clone()
        }
    }
}

fn transient_then_ok() -> FlipResponder {
    FlipResponder {
        calls: Arc::new(AtomicUsize::new(0)),
        first: ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "transient error", "code": "internal" }
        })),
        second: ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "ok" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
        })),
    }
}

#[tokio::test]
async fn provider_gateway_retries_on_retryable_errors_and_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(transient_then_ok())
        .mount(&server)
        .await;

    let gateway = ProviderGateway::with_config(
        Some(adapter(&server)),
        None,
        Arc::new(NoopUsageSink),
        quick_config(1),
    );

    let resp = gateway.chat(gpt_request()).await.unwrap();
    assert_eq!(resp.content, "ok");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
}

#[tokio::test]
async fn provider_gateway_does_not_retry_by_default() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(transient_then_ok())
        .mount(&server)
        .await;

    let gateway = ProviderGateway::with_config(
        Some(adapter(&server)),
        None,
        Arc::new(NoopUsageSink),
        quick_config(GatewayConfig::default().max_retries),
    );

    let err = gateway.chat(gpt_request()).await.unwrap_err();
    assert!(err.is_retryable());

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
}
