//! The callback surface a streaming turn reports through.

use crate::usage::Usage;

/// Kind of content block announced by `content_block_start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockStart {
    Text,
    Thinking,
    ToolUse { id: String, name: String },
}

/// Receives provider stream events in wire order.
///
/// Implementations are called from worker tasks and must never block.
pub trait StreamHandler: Send + Sync {
    fn on_message_start(&self, usage: Usage, model: Option<&str>);
    fn on_content_block_start(&self, index: usize, block: &BlockStart);
    fn on_text_delta(&self, index: usize, text: &str);
    fn on_thinking_delta(&self, index: usize, thinking: &str);
    fn on_signature_delta(&self, index: usize, signature: &str);
    fn on_input_json_delta(&self, index: usize, partial_json: &str);
    fn on_content_block_stop(&self, index: usize);
    fn on_message_delta(&self, stop_reason: Option<&str>, usage: Option<Usage>);
    fn on_message_stop(&self);
    fn on_error(&self, message: &str);
}
