//! Stream handler that forwards worker events into the loop's mailbox.
//!
//! Tool-use blocks stream their input as JSON fragments. The sink assembles
//! them per block index so the loop receives one `ContentBlockStop` carrying
//! the tool name and complete input.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tern_types::{BlockStart, StreamHandler, Usage};

use crate::effect::Mailbox;
use crate::msg::{Msg, StreamBlock};

#[derive(Debug, Default)]
struct ToolBuffer {
    name: String,
    json: String,
}

#[derive(Debug)]
pub struct StreamSink {
    mailbox: Mailbox,
    tools: Mutex<HashMap<usize, ToolBuffer>>,
}

impl StreamSink {
    #[must_use]
    pub fn new(mailbox: Mailbox) -> Self {
        Self {
            mailbox,
            tools: Mutex::new(HashMap::new()),
        }
    }

    fn post(&self, msg: Msg) {
        if !self.mailbox.post(msg) {
            tracing::debug!("event loop closed; dropping stream event");
        }
    }

    fn with_tools<R>(&self, f: impl FnOnce(&mut HashMap<usize, ToolBuffer>) -> R) -> R {
        let mut tools = self.tools.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut tools)
    }
}

impl StreamHandler for StreamSink {
    fn on_message_start(&self, usage: Usage, model: Option<&str>) {
        self.post(Msg::MessageStart {
            usage,
            model: model.map(str::to_string),
        });
    }

    fn on_content_block_start(&self, index: usize, block: &BlockStart) {
        let block = match block {
            BlockStart::Text => StreamBlock::Text,
            BlockStart::Thinking => StreamBlock::Thinking,
            BlockStart::ToolUse { name, .. } => {
                self.with_tools(|tools| {
                    tools.insert(
                        index,
                        ToolBuffer {
                            name: name.clone(),
                            json: String::new(),
                        },
                    );
                });
                StreamBlock::ToolUse { name: name.clone() }
            }
        };
        self.post(Msg::ContentBlockStart { index, block });
    }

    fn on_text_delta(&self, index: usize, text: &str) {
        self.post(Msg::TextDelta {
            index,
            text: text.to_string(),
        });
    }

    fn on_thinking_delta(&self, _index: usize, _thinking: &str) {}

    fn on_signature_delta(&self, _index: usize, _signature: &str) {}

    fn on_input_json_delta(&self, index: usize, partial_json: &str) {
        self.with_tools(|tools| {
            if let Some(buffer) = tools.get_mut(&index) {
                buffer.json.push_str(partial_json);
            }
        });
        self.post(Msg::InputJsonDelta {
            index,
            json: partial_json.to_string(),
        });
    }

    fn on_content_block_stop(&self, index: usize) {
        let finished = self.with_tools(|tools| tools.remove(&index));
        let (name, input) = match finished {
            Some(buffer) => (Some(buffer.name), Some(buffer.json)),
            None => (None, None),
        };
        self.post(Msg::ContentBlockStop { index, name, input });
    }

    fn on_message_delta(&self, stop_reason: Option<&str>, usage: Option<Usage>) {
        self.post(Msg::MessageDelta {
            stop_reason: stop_reason.map(str::to_string),
            usage,
        });
    }

    fn on_message_stop(&self) {
        self.post(Msg::MessageStop);
    }

    fn on_error(&self, message: &str) {
        self.post(Msg::StreamError(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use tern_types::{BlockStart, StreamHandler};

    use super::StreamSink;
    use crate::effect::Mailbox;
    use crate::msg::{Msg, StreamBlock};

    #[test]
    fn assembles_tool_input_across_deltas() {
        let (mailbox, mut rx) = Mailbox::channel();
        let sink = StreamSink::new(mailbox);
        sink.on_content_block_start(
            1,
            &BlockStart::ToolUse {
                id: "toolu_1".into(),
                name: "Bash".into(),
            },
        );
        sink.on_input_json_delta(1, r#"{"comm"#);
        sink.on_input_json_delta(1, r#"and":"ls"}"#);
        sink.on_content_block_stop(1);

        let mut stop = None;
        while let Ok(msg) = rx.try_recv() {
            if let Msg::ContentBlockStop { name, input, .. } = msg {
                stop = Some((name, input));
            }
        }
        let (name, input) = stop.unwrap();
        assert_eq!(name.as_deref(), Some("Bash"));
        assert_eq!(input.as_deref(), Some(r#"{"command":"ls"}"#));
    }

    #[test]
    fn text_block_stop_has_no_name() {
        let (mailbox, mut rx) = Mailbox::channel();
        let sink = StreamSink::new(mailbox);
        sink.on_content_block_start(0, &BlockStart::Text);
        sink.on_text_delta(0, "hi");
        sink.on_content_block_stop(0);

        assert!(matches!(
            rx.try_recv().unwrap(),
            Msg::ContentBlockStart {
                index: 0,
                block: StreamBlock::Text
            }
        ));
        assert!(matches!(rx.try_recv().unwrap(), Msg::TextDelta { .. }));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Msg::ContentBlockStop {
                name: None,
                input: None,
                ..
            }
        ));
    }

    #[test]
    fn closed_mailbox_is_not_an_error() {
        let (mailbox, rx) = Mailbox::channel();
        drop(rx);
        let sink = StreamSink::new(mailbox);
        sink.on_message_stop();
        sink.on_error("boom");
    }
}
