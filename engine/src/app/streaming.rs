//! Stream events from the worker and the end of a turn.

use std::mem;
use std::time::Duration;

use tern_types::{Usage, context_window_for};

use super::{Mode, ModeState, Model, TurnKind};
use crate::agent::AgentError;
use crate::effect::Effect;
use crate::msg::StreamBlock;
use crate::scrollback::ScrollbackEntry;
use crate::summary::{edit_preview, parse_tool_input, summarize_tool, verbose_summary};

/// Turns shorter than this do not get a duration line.
const MIN_REPORTED_TURN: Duration = Duration::from_secs(1);
/// Context usage, in percent of the window, that triggers auto-compaction.
const AUTO_COMPACT_PERCENT: f64 = 80.0;

impl Model {
    pub(super) fn on_message_start(&mut self, usage: &Usage, model: Option<String>) -> Vec<Effect> {
        if let Some(model) = model {
            self.resolved_model_id = Some(model);
        }
        let model_id = self.effective_model_id().to_string();
        self.tokens.add_message_start(usage, &model_id);
        Vec::new()
    }

    pub(super) fn on_block_start(&mut self, block: StreamBlock) -> Vec<Effect> {
        match block {
            StreamBlock::ToolUse { name } => {
                self.active_tool = Some(name);
                self.spinner.start().into_iter().collect()
            }
            StreamBlock::Text | StreamBlock::Thinking => Vec::new(),
        }
    }

    pub(super) fn on_block_stop(&mut self, name: Option<String>, input: Option<String>) -> Vec<Effect> {
        let Some(name) = name else {
            return self.flush_text();
        };
        let input = parse_tool_input(input.as_deref().unwrap_or_default());
        let summary = if self.settings.verbose {
            verbose_summary(&name, &input)
        } else {
            summarize_tool(&name, &input)
        };
        let entry = ScrollbackEntry::ToolCall {
            summary,
            diff: edit_preview(&name, &input),
            name,
        };
        self.active_tool = None;
        vec![Effect::Print(entry)]
    }

    pub(super) fn on_message_delta(&mut self, usage: Option<Usage>) -> Vec<Effect> {
        let output = usage.map_or(0, |u| u.output_tokens);
        let model_id = self.effective_model_id().to_string();
        self.tokens.add_message_delta(output, &model_id);
        Vec::new()
    }

    pub(super) fn on_stream_error(&mut self, err: String) -> Vec<Effect> {
        tracing::warn!(%err, "stream error");
        self.last_stream_error = Some(err.clone());
        vec![Effect::error(err)]
    }

    /// Prints buffered assistant text as one scrollback entry.
    pub(super) fn flush_text(&mut self) -> Vec<Effect> {
        let text = mem::take(&mut self.streaming_text);
        if text.trim().is_empty() {
            return Vec::new();
        }
        vec![Effect::Print(ScrollbackEntry::Assistant(text))]
    }

    pub(super) fn on_loop_done(&mut self, result: Result<(), AgentError>) -> Vec<Effect> {
        let mut effects = self.flush_text();

        // Prompts still open for this turn fall back to deny/empty answers.
        if matches!(self.mode, ModeState::Permission(_) | ModeState::AskUser(_)) {
            self.mode = ModeState::Streaming;
        }
        self.deferred.clear();

        let kind = mem::replace(&mut self.turn_kind, TurnKind::Prompt);
        let cancelled = self.cancel.is_cancelled();
        let succeeded = result.is_ok();
        match result {
            Ok(()) => {
                if kind == TurnKind::Compact {
                    self.tokens.last_context = 0;
                    effects.push(Effect::info("Conversation compacted"));
                }
            }
            Err(err) if cancelled || err.is_cancelled() => effects.push(Effect::dim("Interrupted")),
            Err(AgentError::NothingToCompact) => {
                effects.push(Effect::info("Nothing to compact yet"));
            }
            Err(err) => {
                let text = err.to_string();
                tracing::warn!(error = %text, "turn failed");
                if self.last_stream_error.as_deref() != Some(text.as_str()) {
                    effects.push(Effect::error(text));
                }
            }
        }
        self.last_stream_error = None;
        self.active_tool = None;
        self.set_suggestion(None);

        if let Some(started) = self.turn_started.take() {
            let elapsed = started.elapsed();
            self.api_time += elapsed;
            if self.settings.show_turn_duration && elapsed >= MIN_REPORTED_TURN {
                effects.push(Effect::dim(format!("Worked for {}s", elapsed.as_secs())));
            }
        }
        effects.extend(self.refresh_status_line());

        if succeeded && kind == TurnKind::Prompt && self.queue.is_empty() && self.context_nearly_full() {
            tracing::info!(context = self.tokens.last_context, "auto-compacting");
            effects.push(Effect::dim("Context nearly full, compacting"));
            effects.extend(self.start_compact());
            return effects;
        }

        if self.queue.is_empty() {
            effects.extend(self.enter_input());
            if succeeded {
                effects.extend(self.request_suggestion());
            }
            return effects;
        }
        effects.extend(self.submit_queued());
        match self.mode() {
            Mode::Streaming => {}
            Mode::Input => effects.extend(self.enter_input()),
            _ if !self.diff_loading => self.spinner.stop(),
            _ => {}
        }
        effects
    }

    fn context_nearly_full(&self) -> bool {
        self.settings.auto_compact
            && self
                .tokens
                .context_exceeds(context_window_for(self.effective_model_id()), AUTO_COMPACT_PERCENT)
    }
}
