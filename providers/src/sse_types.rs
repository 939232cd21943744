//! Typed SSE payloads of the Messages API.
//!
//! Unknown event, block, and delta types deserialize to `Unknown` so new
//! server-side additions do not break the stream.

use serde::Deserialize;
use tern_types::Usage;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    MessageStart {
        message: MessageInfo,
    },
    MessageDelta {
        #[serde(default)]
        delta: Option<MessageDeltaInfo>,
        #[serde(default)]
        usage: Option<Usage>,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: Delta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageStop,
    Ping,
    Error {
        error: ErrorInfo,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct MessageInfo {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct MessageDeltaInfo {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorInfo {
    #[serde(default, rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::{ContentBlock, Delta, Event};

    #[test]
    fn parses_message_start_with_usage_and_model() {
        let event: Event = serde_json::from_str(
            r#"{"type":"message_start","message":{"id":"m","model":"claude-sonnet-4-5-20250929","usage":{"input_tokens":12,"cache_read_input_tokens":100}}}"#,
        )
        .unwrap();
        let Event::MessageStart { message } = event else {
            panic!("expected message_start");
        };
        assert_eq!(message.model.as_deref(), Some("claude-sonnet-4-5-20250929"));
        let usage = message.usage.unwrap();
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.cache_read_input_tokens, 100);
        assert_eq!(usage.cache_creation_input_tokens, 0);
    }

    #[test]
    fn parses_tool_use_start_and_json_delta() {
        let start: Event = serde_json::from_str(
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"Bash","input":{}}}"#,
        )
        .unwrap();
        assert!(matches!(
            start,
            Event::ContentBlockStart { index: 1, content_block: ContentBlock::ToolUse { .. } }
        ));
        let delta: Event = serde_json::from_str(
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"command\":"}}"#,
        )
        .unwrap();
        assert!(matches!(
            delta,
            Event::ContentBlockDelta { delta: Delta::InputJsonDelta { .. }, .. }
        ));
    }

    #[test]
    fn unknown_types_are_tolerated() {
        let event: Event = serde_json::from_str(r#"{"type":"brand_new","x":1}"#).unwrap();
        assert!(matches!(event, Event::Unknown));
        let block: ContentBlock =
            serde_json::from_str(r#"{"type":"server_tool_use","id":"x"}"#).unwrap();
        assert!(matches!(block, ContentBlock::Unknown));
    }
}
