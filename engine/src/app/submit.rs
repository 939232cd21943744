//! Submission: exit words, slash dispatch with auto-correction, and turns.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use tern_types::Session;

use super::{Model, ModeState, TurnKind};
use crate::effect::Effect;
use crate::msg::Msg;
use crate::scrollback::ScrollbackEntry;
use crate::session::turn_complete_callback;

/// Bare words that quit without a slash.
pub const EXIT_WORDS: &[&str] = &["exit", "quit", ":q", ":q!", ":wq", ":wq!"];

impl Model {
    /// Single entry point for submitted text.
    pub(crate) fn handle_submit(&mut self, text: &str) -> Vec<Effect> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        let mut effects = vec![Effect::Print(ScrollbackEntry::UserEcho(text.to_string()))];

        if EXIT_WORDS.contains(&text) {
            self.quitting = true;
            effects.push(Effect::Quit);
            return effects;
        }

        if let Some(rest) = text.strip_prefix('/') {
            let (name, args) = match rest.split_once(char::is_whitespace) {
                Some((name, args)) => (name, args.trim()),
                None => (rest, ""),
            };
            effects.extend(self.run_command(name, args));
            return effects;
        }

        effects.extend(self.send_prompt(text.to_string()));
        effects
    }

    fn run_command(&mut self, name: &str, args: &str) -> Vec<Effect> {
        let registry = Arc::clone(&self.registry);
        let mut effects = Vec::new();

        let command = match registry.lookup(name) {
            Some(command) => command,
            None => {
                let corrected = if name.is_empty() {
                    None
                } else {
                    registry.fuzzy_best(name)
                };
                match corrected.as_deref().and_then(|best| registry.lookup(best)) {
                    Some(command) => {
                        effects.push(Effect::Print(ScrollbackEntry::Corrected {
                            typed: name.to_string(),
                            corrected: command.name.clone(),
                        }));
                        command
                    }
                    None => {
                        effects.push(Effect::info(format!(
                            "Unknown command: /{name} (type /help for available commands)"
                        )));
                        return effects;
                    }
                }
            }
        };

        tracing::debug!(command = %command.name, "running slash command");
        let execute = Arc::clone(&command.execute);
        effects.extend(execute(self, args));
        effects
    }

    /// Starts a turn that sends `text` to the worker.
    pub fn send_prompt(&mut self, text: String) -> Vec<Effect> {
        self.submit_count += 1;
        let cancel = self.begin_turn(TurnKind::Prompt);
        let agent = Arc::clone(&self.deps.agent);
        let mut effects = vec![Effect::task(async move {
            let result = agent.send_message(cancel, text).await;
            Some(Msg::LoopDone { result })
        })];
        effects.extend(self.spinner.start());
        effects
    }

    /// Starts a turn that compacts the worker's history.
    pub(crate) fn start_compact(&mut self) -> Vec<Effect> {
        let cancel = self.begin_turn(TurnKind::Compact);
        let agent = Arc::clone(&self.deps.agent);
        let mut effects = vec![Effect::task(async move {
            let result = agent.compact(cancel).await;
            Some(Msg::LoopDone { result })
        })];
        effects.extend(self.spinner.start());
        effects
    }

    fn begin_turn(&mut self, kind: TurnKind) -> CancellationToken {
        self.mode = ModeState::Streaming;
        self.input.blur();
        self.completions.clear();
        self.set_suggestion(None);
        self.turn_kind = kind;
        self.turn_started = Some(Instant::now());
        self.last_stream_error = None;
        self.cancel = CancellationToken::new();
        self.cancel.clone()
    }

    /// Resets the conversation under a fresh session id, keeping the model.
    pub(crate) fn clear_conversation(&mut self) -> Vec<Effect> {
        self.tokens.reset();
        self.todos.clear();
        self.queue.clear();
        self.completions.clear();
        self.streaming_text.clear();
        self.active_tool = None;
        self.set_suggestion(None);

        let id = self.deps.sessions.generate_id();
        let model = self.session.with(|s| s.model.clone());
        self.session
            .replace(Session::new(id, model, self.cwd.clone(), Utc::now()));
        tracing::info!(session = %self.session.id(), "conversation cleared");

        let agent = Arc::clone(&self.deps.agent);
        let callback = turn_complete_callback(
            self.session.clone(),
            Arc::clone(&self.deps.sessions),
            self.deps.mailbox.clone(),
        );
        vec![
            Effect::call(move || {
                agent.clear();
                agent.set_on_turn_complete(callback);
            }),
            Effect::info("Conversation cleared"),
        ]
    }
}
