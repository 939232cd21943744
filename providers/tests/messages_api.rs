//! Client tests against a mock Messages API.

use std::sync::Mutex;

use tern_providers::retry::RetryConfig;
use tern_providers::{AnthropicClient, MessagesRequest, ProviderError};
use tern_types::{BlockStart, Message, StreamHandler, Usage};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TextCollector {
    text: Mutex<String>,
    errors: Mutex<Vec<String>>,
}

impl StreamHandler for TextCollector {
    fn on_message_start(&self, _usage: Usage, _model: Option<&str>) {}
    fn on_content_block_start(&self, _index: usize, _block: &BlockStart) {}
    fn on_text_delta(&self, _index: usize, text: &str) {
        self.text.lock().unwrap().push_str(text);
    }
    fn on_thinking_delta(&self, _index: usize, _thinking: &str) {}
    fn on_signature_delta(&self, _index: usize, _signature: &str) {}
    fn on_input_json_delta(&self, _index: usize, _partial_json: &str) {}
    fn on_content_block_stop(&self, _index: usize) {}
    fn on_message_delta(&self, _stop_reason: Option<&str>, _usage: Option<Usage>) {}
    fn on_message_stop(&self) {}
    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

fn request() -> MessagesRequest {
    MessagesRequest {
        model: "claude-haiku-4-5".into(),
        system: Some("be brief".into()),
        messages: vec![Message::user("hi")],
        max_tokens: 128,
        tools: Vec::new(),
    }
}

fn client(server: &MockServer) -> AnthropicClient {
    AnthropicClient::new("test-key")
        .unwrap()
        .with_url(format!("{}/v1/messages", server.uri()))
        .with_retry(RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        })
}

const SSE_BODY: &str = "event: message_start\n\
data: {\"type\":\"message_start\",\"message\":{\"model\":\"claude-haiku-4-5\",\"usage\":{\"input_tokens\":3}}}\n\n\
event: content_block_start\n\
data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n\
data: {\"type\":\"ping\"}\n\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" there\"}}\n\n\
data: {\"type\":\"content_block_stop\",\"index\":0}\n\n\
data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":2}}\n\n\
data: {\"type\":\"message_stop\"}\n\n";

#[tokio::test]
async fn streams_text_to_handler() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(SSE_BODY),
        )
        .mount(&server)
        .await;

    let collector = TextCollector::default();
    let outcome = client(&server).stream(&request(), &collector).await.unwrap();

    assert_eq!(*collector.text.lock().unwrap(), "Hello there");
    assert_eq!(outcome.message.text(), "Hello there");
    assert_eq!(outcome.stop_reason.as_deref(), Some("end_turn"));
    assert_eq!(outcome.usage.input_tokens, 3);
    assert_eq!(outcome.usage.output_tokens, 2);
    assert!(!outcome.wants_tools());
}

#[tokio::test]
async fn truncated_stream_is_an_error() {
    let server = MockServer::start().await;
    let cut = SSE_BODY.split("data: {\"type\":\"message_stop\"}").next().unwrap();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(cut))
        .mount(&server)
        .await;

    let collector = TextCollector::default();
    let err = client(&server).stream(&request(), &collector).await.unwrap_err();

    assert!(matches!(err, ProviderError::Stream(_)));
    assert_eq!(collector.errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn http_error_surfaces_api_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        ))
        .mount(&server)
        .await;

    let collector = TextCollector::default();
    let err = client(&server).stream(&request(), &collector).await.unwrap_err();

    match err {
        ProviderError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid x-api-key");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn complete_returns_first_text_block() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "run the tests"}
            ]
        })))
        .mount(&server)
        .await;

    let text = client(&server).complete(&request()).await.unwrap();
    assert_eq!(text, "run the tests");
}
