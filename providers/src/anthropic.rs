use std::collections::BTreeMap;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::json;
use tern_types::{BlockStart, ContentBlock, Message, Role, StreamHandler, Usage};

use crate::retry::{RetryConfig, send_with_retry};
use crate::sse::{drain_next_event, extract_data};
use crate::sse_types::{self as typed, Event};
use crate::{
    ANTHROPIC_VERSION, MESSAGES_API_URL, ProviderError, STREAM_IDLE_TIMEOUT_SECS,
    client_builder, read_capped_error_body,
};

const MAX_SSE_BUFFER_BYTES: usize = 4 * 1024 * 1024;
const MAX_SSE_PARSE_ERRORS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct MessagesRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub tools: Vec<ToolDefinition>,
}

/// Result of one streamed assistant message.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub message: Message,
    pub stop_reason: Option<String>,
    pub usage: Usage,
    pub model: Option<String>,
}

impl StreamOutcome {
    #[must_use]
    pub fn wants_tools(&self) -> bool {
        self.stop_reason.as_deref() == Some("tool_use") || !self.message.tool_uses().is_empty()
    }
}

#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    url: String,
    retry: RetryConfig,
    idle_timeout: Duration,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let http = client_builder().build().map_err(ProviderError::Client)?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            url: MESSAGES_API_URL.to_string(),
            retry: RetryConfig::default(),
            idle_timeout: Duration::from_secs(STREAM_IDLE_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    fn body(request: &MessagesRequest, stream: bool) -> serde_json::Value {
        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": request.messages,
            "stream": stream,
        });
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            body["system"] = json!(system);
        }
        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
        }
        body
    }

    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response, ProviderError> {
        let response = send_with_retry(
            || {
                self.http
                    .post(&self.url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .header("content-type", "application/json")
                    .json(body)
            },
            &self.retry,
        )
        .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ProviderError::Api {
                status: status.as_u16(),
                message: read_capped_error_body(response).await,
            })
        }
    }

    /// Streams one assistant message, reporting each event to `handler`.
    pub async fn stream(
        &self,
        request: &MessagesRequest,
        handler: &dyn StreamHandler,
    ) -> Result<StreamOutcome, ProviderError> {
        let body = Self::body(request, true);
        let response = match self.send(&body).await {
            Ok(response) => response,
            Err(err) => {
                handler.on_error(&err.to_string());
                return Err(err);
            }
        };

        let mut assembler = TurnAssembler::default();
        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut parse_errors = 0usize;

        loop {
            let Ok(next) = tokio::time::timeout(self.idle_timeout, stream.next()).await else {
                let err = ProviderError::IdleTimeout(self.idle_timeout);
                handler.on_error(&err.to_string());
                return Err(err);
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| stream_error(handler, format!("stream read failed: {e}")))?;
            buffer.extend_from_slice(&chunk);

            if buffer.len() > MAX_SSE_BUFFER_BYTES {
                return Err(stream_error(handler, "SSE buffer exceeded 4 MiB".to_string()));
            }

            while let Some(raw) = drain_next_event(&mut buffer) {
                let Ok(raw) = std::str::from_utf8(&raw) else {
                    return Err(stream_error(handler, "invalid UTF-8 in stream".to_string()));
                };
                let Some(data) = extract_data(raw) else {
                    continue;
                };
                let event = match serde_json::from_str::<Event>(&data) {
                    Ok(event) => {
                        parse_errors = 0;
                        event
                    }
                    Err(e) => {
                        parse_errors += 1;
                        tracing::warn!(%e, payload_bytes = data.len(), "invalid SSE payload");
                        if parse_errors >= MAX_SSE_PARSE_ERRORS {
                            return Err(stream_error(handler, format!("invalid stream payload: {e}")));
                        }
                        continue;
                    }
                };
                if assembler.apply(event, handler)? {
                    return Ok(assembler.finish());
                }
            }
        }

        Err(stream_error(
            handler,
            "connection closed before stream completed".to_string(),
        ))
    }

    /// Sends a non-streaming request and returns the first text block.
    pub async fn complete(&self, request: &MessagesRequest) -> Result<String, ProviderError> {
        let body = Self::body(request, false);
        let response = self.send(&body).await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Stream(format!("invalid response body: {e}")))?;
        json.get("content")
            .and_then(serde_json::Value::as_array)
            .and_then(|blocks| {
                blocks.iter().find_map(|block| {
                    (block.get("type").and_then(serde_json::Value::as_str) == Some("text"))
                        .then(|| block.get("text").and_then(serde_json::Value::as_str))
                        .flatten()
                })
            })
            .map(str::to_string)
            .ok_or(ProviderError::EmptyResponse)
    }
}

fn stream_error(handler: &dyn StreamHandler, message: String) -> ProviderError {
    handler.on_error(&message);
    ProviderError::Stream(message)
}

#[derive(Debug)]
enum PartialBlock {
    Text(String),
    Thinking { thinking: String, signature: String },
    ToolUse { id: String, name: String, json: String },
}

/// Builds the assistant message while forwarding events to the handler.
#[derive(Debug, Default)]
struct TurnAssembler {
    blocks: BTreeMap<usize, PartialBlock>,
    stop_reason: Option<String>,
    usage: Usage,
    model: Option<String>,
}

impl TurnAssembler {
    /// Returns `Ok(true)` once `message_stop` arrives.
    fn apply(&mut self, event: Event, handler: &dyn StreamHandler) -> Result<bool, ProviderError> {
        match event {
            Event::MessageStart { message } => {
                let usage = message.usage.unwrap_or_default();
                self.usage.input_tokens += usage.input_tokens;
                self.usage.cache_read_input_tokens += usage.cache_read_input_tokens;
                self.usage.cache_creation_input_tokens += usage.cache_creation_input_tokens;
                self.model.clone_from(&message.model);
                handler.on_message_start(usage, message.model.as_deref());
            }
            Event::ContentBlockStart {
                index,
                content_block,
            } => {
                let (partial, start) = match content_block {
                    typed::ContentBlock::Text { text } => (PartialBlock::Text(text), BlockStart::Text),
                    typed::ContentBlock::Thinking { thinking } => (
                        PartialBlock::Thinking {
                            thinking,
                            signature: String::new(),
                        },
                        BlockStart::Thinking,
                    ),
                    typed::ContentBlock::ToolUse { id, name } => {
                        if id.is_empty() || name.is_empty() {
                            return Err(stream_error(handler, "tool call missing id or name".to_string()));
                        }
                        (
                            PartialBlock::ToolUse {
                                id: id.clone(),
                                name: name.clone(),
                                json: String::new(),
                            },
                            BlockStart::ToolUse { id, name },
                        )
                    }
                    typed::ContentBlock::Unknown => return Ok(false),
                };
                self.blocks.insert(index, partial);
                handler.on_content_block_start(index, &start);
            }
            Event::ContentBlockDelta { index, delta } => {
                let block = self.blocks.get_mut(&index);
                match (delta, block) {
                    (typed::Delta::TextDelta { text }, Some(PartialBlock::Text(buf))) => {
                        buf.push_str(&text);
                        handler.on_text_delta(index, &text);
                    }
                    (
                        typed::Delta::ThinkingDelta { thinking },
                        Some(PartialBlock::Thinking { thinking: buf, .. }),
                    ) => {
                        buf.push_str(&thinking);
                        handler.on_thinking_delta(index, &thinking);
                    }
                    (
                        typed::Delta::SignatureDelta { signature },
                        Some(PartialBlock::Thinking { signature: sig, .. }),
                    ) => {
                        sig.push_str(&signature);
                        handler.on_signature_delta(index, &signature);
                    }
                    (
                        typed::Delta::InputJsonDelta { partial_json },
                        Some(PartialBlock::ToolUse { json, .. }),
                    ) => {
                        json.push_str(&partial_json);
                        handler.on_input_json_delta(index, &partial_json);
                    }
                    (delta, _) => {
                        tracing::debug!(index, ?delta, "delta without matching block");
                    }
                }
            }
            Event::ContentBlockStop { index } => {
                if self.blocks.contains_key(&index) {
                    handler.on_content_block_stop(index);
                }
            }
            Event::MessageDelta { delta, usage } => {
                let stop_reason = delta.and_then(|d| d.stop_reason);
                if let Some(usage) = usage {
                    self.usage.output_tokens += usage.output_tokens;
                }
                handler.on_message_delta(stop_reason.as_deref(), usage);
                if stop_reason.is_some() {
                    self.stop_reason = stop_reason;
                }
            }
            Event::MessageStop => {
                handler.on_message_stop();
                return Ok(true);
            }
            Event::Error { error } => {
                let message = if error.message.is_empty() {
                    format!("stream error: {}", error.error_type)
                } else {
                    error.message
                };
                return Err(stream_error(handler, message));
            }
            Event::Ping | Event::Unknown => {}
        }
        Ok(false)
    }

    fn finish(self) -> StreamOutcome {
        let content = self
            .blocks
            .into_values()
            .filter_map(|block| match block {
                PartialBlock::Text(text) if text.is_empty() => None,
                PartialBlock::Text(text) => Some(ContentBlock::Text { text }),
                PartialBlock::Thinking {
                    thinking,
                    signature,
                } => Some(ContentBlock::Thinking {
                    thinking,
                    signature,
                }),
                PartialBlock::ToolUse { id, name, json } => {
                    let input = if json.trim().is_empty() {
                        json!({})
                    } else {
                        serde_json::from_str(&json).unwrap_or_else(|e| {
                            tracing::warn!(tool = %name, "unparseable tool input: {e}");
                            json!({})
                        })
                    };
                    Some(ContentBlock::ToolUse { id, name, input })
                }
            })
            .collect();
        StreamOutcome {
            message: Message {
                role: Role::Assistant,
                content,
            },
            stop_reason: self.stop_reason,
            usage: self.usage,
            model: self.model,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use tern_types::{BlockStart, ContentBlock, Message, StreamHandler, Usage};

    use super::{AnthropicClient, Event, MessagesRequest, TurnAssembler};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, s: String) {
            self.events.lock().unwrap().push(s);
        }
    }

    impl StreamHandler for Recorder {
        fn on_message_start(&self, usage: Usage, model: Option<&str>) {
            self.push(format!("start {} {:?}", usage.input_tokens, model));
        }
        fn on_content_block_start(&self, index: usize, block: &BlockStart) {
            self.push(format!("block {index} {block:?}"));
        }
        fn on_text_delta(&self, index: usize, text: &str) {
            self.push(format!("text {index} {text}"));
        }
        fn on_thinking_delta(&self, _index: usize, _thinking: &str) {}
        fn on_signature_delta(&self, _index: usize, _signature: &str) {}
        fn on_input_json_delta(&self, index: usize, partial_json: &str) {
            self.push(format!("json {index} {partial_json}"));
        }
        fn on_content_block_stop(&self, index: usize) {
            self.push(format!("stop {index}"));
        }
        fn on_message_delta(&self, stop_reason: Option<&str>, _usage: Option<Usage>) {
            self.push(format!("delta {stop_reason:?}"));
        }
        fn on_message_stop(&self) {
            self.push("message_stop".into());
        }
        fn on_error(&self, message: &str) {
            self.push(format!("error {message}"));
        }
    }

    fn ev(s: &str) -> Event {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn assembles_text_and_tool_blocks_in_index_order() {
        let rec = Recorder::default();
        let mut asm = TurnAssembler::default();
        let events = [
            r#"{"type":"message_start","message":{"model":"claude-haiku-4-5","usage":{"input_tokens":5}}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Listing"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"t1","name":"Bash"}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"command\":"}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"\"ls\"}"}}"#,
            r#"{"type":"content_block_stop","index":1}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":9}}"#,
        ];
        for e in events {
            assert!(!asm.apply(ev(e), &rec).unwrap());
        }
        assert!(asm.apply(ev(r#"{"type":"message_stop"}"#), &rec).unwrap());

        let outcome = asm.finish();
        assert!(outcome.wants_tools());
        assert_eq!(outcome.usage.output_tokens, 9);
        assert_eq!(outcome.model.as_deref(), Some("claude-haiku-4-5"));
        assert_eq!(outcome.message.content.len(), 2);
        assert!(matches!(
            &outcome.message.content[1],
            ContentBlock::ToolUse { input, .. } if input == &json!({"command": "ls"})
        ));
        let events = rec.events.lock().unwrap();
        assert_eq!(events.first().unwrap(), "start 5 Some(\"claude-haiku-4-5\")");
        assert_eq!(events.last().unwrap(), "message_stop");
    }

    #[test]
    fn error_event_reports_and_fails() {
        let rec = Recorder::default();
        let mut asm = TurnAssembler::default();
        let err = asm
            .apply(
                ev(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#),
                &rec,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "Overloaded");
        assert_eq!(rec.events.lock().unwrap().as_slice(), ["error Overloaded"]);
    }

    #[test]
    fn body_omits_empty_system_and_tools() {
        let request = MessagesRequest {
            model: "claude-haiku-4-5".into(),
            system: None,
            messages: vec![Message::user("hi")],
            max_tokens: 64,
            tools: Vec::new(),
        };
        let body = AnthropicClient::body(&request, false);
        assert!(body.get("system").is_none());
        assert!(body.get("tools").is_none());
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["content"][0]["text"], "hi");
    }
}
