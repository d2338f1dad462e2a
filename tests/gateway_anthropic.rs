use std::sync::Arc;
use std::time::Duration;

use choice_harness::gateway::anthropic::AnthropicAdapter;
use choice_harness::gateway::{
    Attribution, ChatModel, ChatProvider, ChatRequest, FinishReason, GatewayConfig, Message,
    NoopUsageSink, ProviderError, ProviderGateway,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SONNET: &str = "claude-3-5-sonnet-20241022";

fn claude_request(messages: Vec<Message>) -> ChatRequest {
    ChatRequest::new(ChatModel::anthropic(SONNET), messages, Attribution::new("test"))
}

fn adapter(server: &MockServer) -> AnthropicAdapter {
    AnthropicAdapter::with_config("ak-test", server.uri(), Duration::from_secs(5)).unwrap()
}

fn ok_body(text: &str) -> serde_json::Value {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": text }],
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 12, "output_tokens": 3 }
    })
}

#[tokio::test]
async fn anthropic_parses_text_blocks_and_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ak-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("The correct answer is b")))
        .mount(&server)
        .await;

    let resp = adapter(&server)
        .chat(&claude_request(vec![Message::user("Q?\na) S3\nb) EC2\nAnswer:")]))
        .await
        .unwrap();
    assert_eq!(resp.content, "The correct answer is b");
    assert_eq!(resp.finish_reason, FinishReason::Stop);
    assert_eq!(resp.input_tokens, 12);
    assert_eq!(resp.output_tokens, 3);
    assert_eq!(
        resp.cost_nanodollars,
        choice_harness::gateway::chat_cost(SONNET, 12, 3)
    );
}

#[tokio::test]
async fn anthropic_lifts_system_turns_and_defaults_max_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("a")))
        .mount(&server)
        .await;

    let req = claude_request(vec![
        Message::system("You are a trainer."),
        Message::user("Q?"),
    ]);
    adapter(&server).chat(&req).await.unwrap();

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["model"], SONNET);
    assert_eq!(body["max_tokens"], 100);
    assert_eq!(body["system"], "You are a trainer.");
    assert_eq!(body["messages"], json!([{ "role": "user", "content": "Q?" }]));
}

#[tokio::test]
async fn anthropic_rejects_requests_without_user_turns() {
    let server = MockServer::start().await;

    let err = adapter(&server)
        .chat(&claude_request(vec![Message::system("only a system turn")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest { .. }));

    let received = server.received_requests().await.unwrap();
    assert!(received.is_empty());
}

#[tokio::test]
async fn anthropic_overloaded_is_retryable_with_error_type() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(529)
                .insert_header("request-id", "req_42")
                .set_body_json(json!({
                    "type": "error",
                    "error": { "type": "overloaded_error", "message": "Overloaded" }
                })),
        )
        .mount(&server)
        .await;

    let err = adapter(&server)
        .chat(&claude_request(vec![Message::user("Q?")]))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.request_id(), Some("req_42"));
    let ctx = err.context().expect("expected error context");
    assert_eq!(ctx.http_status, Some(529));
    assert_eq!(ctx.provider_code.as_deref(), Some("overloaded_error"));
    assert!(err.to_string().contains("Overloaded"));
}

#[tokio::test]
async fn anthropic_429_without_retry_after_waits_a_minute() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "type": "error",
            "error": { "type": "rate_limit_error", "message": "slow down" }
        })))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .chat(&claude_request(vec![Message::user("Q?")]))
        .await
        .unwrap_err();
    assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));
}

#[tokio::test]
async fn gateway_routes_anthropic_models_to_anthropic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("d")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = ProviderGateway::with_config(
        None,
        Some(adapter(&server)),
        Arc::new(NoopUsageSink),
        GatewayConfig {
            min_interval: Duration::ZERO,
            ..GatewayConfig::default()
        },
    );

    assert!(gateway.supports(&ChatModel::anthropic(SONNET)));
    assert!(!gateway.supports(&ChatModel::openai("gpt-3.5-turbo")));

    let resp = gateway
        .chat(claude_request(vec![Message::user("Q?")]))
        .await
        .unwrap();
    assert_eq!(resp.content, "d");

    let err = gateway
        .chat(ChatRequest::new(
            ChatModel::openai("gpt-3.5-turbo"),
            vec![Message::user("Q?")],
            Attribution::new("test"),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Config(_)));
}
