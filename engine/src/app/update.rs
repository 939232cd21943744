//! Top-level message dispatch and the two non-modal key handlers.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use tern_types::{DiffData, Session, TodoItem, truncate_with_ellipsis};

use super::{CTRL_C_WINDOW, Completions, DEFAULT_PLACEHOLDER, Mode, ModeState, Model};
use crate::commands::MAX_COMPLETIONS;
use crate::effect::Effect;
use crate::msg::Msg;
use crate::scrollback::ScrollbackEntry;
use crate::status_line::{StatusLineContext, StatusLineInput, render_status_line};
use crate::suggestion::generate_suggestion;
use crate::ui::{DiffViewer, HelpScreen, ResumePicker};

pub(crate) fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

impl Model {
    /// Applies one message and returns the effects the runtime must run.
    pub fn update(&mut self, msg: Msg) -> Vec<Effect> {
        match msg {
            Msg::Init => self.on_init(),
            Msg::WindowSize { width, height } => {
                self.resize(width, height);
                Vec::new()
            }
            Msg::Key(key) => {
                if key.kind == KeyEventKind::Release {
                    return Vec::new();
                }
                self.handle_key(key)
            }
            Msg::Paste(text) => self.handle_paste(&text),
            Msg::SubmitInput(text) => self.handle_submit(&text),

            Msg::MessageStart { usage, model } => self.on_message_start(&usage, model),
            Msg::ContentBlockStart { block, .. } => self.on_block_start(block),
            Msg::TextDelta { text, .. } => {
                self.streaming_text.push_str(&text);
                Vec::new()
            }
            Msg::InputJsonDelta { .. } | Msg::MessageStop => Vec::new(),
            Msg::ContentBlockStop { name, input, .. } => self.on_block_stop(name, input),
            Msg::MessageDelta { usage, .. } => self.on_message_delta(usage),
            Msg::StreamError(err) => self.on_stream_error(err),
            Msg::LoopDone { result } => self.on_loop_done(result),

            Msg::PermissionRequest(request) => self.on_permission_request(request),
            Msg::AskUserRequest(request) => self.on_ask_user_request(request),
            Msg::TodoUpdate(todos) => self.on_todo_update(todos),
            Msg::DiffLoaded(data) => self.on_diff_loaded(data),
            Msg::MemoryEditDone { path, error } => match error {
                Some(err) => vec![Effect::error(format!("Failed to open editor: {err}"))],
                None => vec![Effect::info(format!("Memory file saved: {}", path.display()))],
            },
            Msg::StatusLineUpdate(text) => {
                self.status_line = text;
                Vec::new()
            }
            Msg::PromptSuggestionResult(suggestion) => {
                self.suggestion_generating = false;
                if self.mode() == Mode::Input && self.input.is_empty() {
                    self.set_suggestion(suggestion);
                }
                Vec::new()
            }
            Msg::SessionsLoaded(result) => self.on_sessions_loaded(result),
            Msg::ContinueLoaded(result) => self.on_continue_loaded(result),
            Msg::StoreWarning(warning) => vec![Effect::warning(warning)],

            Msg::CtrlCReset => {
                self.ctrl_c_pending = false;
                Vec::new()
            }
            Msg::SpinnerTick(generation) => self.spinner.on_tick(generation).into_iter().collect(),
            Msg::Blink(generation) => self.input.on_blink(generation).into_iter().collect(),
        }
    }

    fn on_init(&mut self) -> Vec<Effect> {
        let mut effects = vec![self.input.focus()];
        effects.extend(self.refresh_status_line());
        if self.continue_session {
            self.continue_session = false;
            effects.push(self.load_most_recent());
        } else if let Some(prompt) = self.initial_prompt.take() {
            effects.extend(self.handle_submit(&prompt));
        }
        effects
    }

    fn resize(&mut self, width: i32, height: i32) {
        if width <= 0 || height <= 0 {
            return;
        }
        self.width = u16::try_from(width).unwrap_or(u16::MAX);
        self.height = u16::try_from(height).unwrap_or(u16::MAX);
        self.input.set_width(self.width);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match self.mode() {
            Mode::Input => self.input_key(key),
            Mode::Streaming => self.streaming_key(key),
            _ => self.modal_key(key),
        }
    }

    fn handle_paste(&mut self, text: &str) -> Vec<Effect> {
        match &mut self.mode {
            ModeState::Input | ModeState::Streaming => {
                self.completions.clear();
                if self.suggestion.is_some() {
                    self.set_suggestion(None);
                }
                self.input.insert_str(text);
            }
            ModeState::AskUser(prompt) => prompt.paste(text),
            _ => {}
        }
        Vec::new()
    }

    fn input_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if is_ctrl_c(&key) {
            return self.input_ctrl_c();
        }

        if !self.completions.is_empty() {
            match key.code {
                KeyCode::Tab => return self.tab_complete(),
                KeyCode::BackTab => {
                    self.completions.prev();
                    return Vec::new();
                }
                KeyCode::Enter => {
                    if let Some(name) = self.completions.selected() {
                        let text = format!("/{name}");
                        self.input.set_text(text);
                    }
                    self.completions.clear();
                    return Vec::new();
                }
                KeyCode::Esc => {
                    self.completions.clear();
                    return Vec::new();
                }
                _ => self.completions.clear(),
            }
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Tab => self.tab_complete(),
            KeyCode::Char('?') if self.input.is_empty() => self.open_help(),
            KeyCode::Enter if plain => {
                let text = self.input.take_text();
                if text.trim().is_empty() {
                    return match self.suggestion.take() {
                        Some(suggestion) => {
                            self.input.set_placeholder(DEFAULT_PLACEHOLDER);
                            self.handle_submit(&suggestion)
                        }
                        None => Vec::new(),
                    };
                }
                self.handle_submit(&text)
            }
            KeyCode::Esc if self.input.enter_normal() => Vec::new(),
            KeyCode::Esc => {
                if self.suggestion.is_some() {
                    self.set_suggestion(None);
                } else {
                    self.input.clear();
                }
                Vec::new()
            }
            _ => {
                if matches!(key.code, KeyCode::Char(_)) && self.suggestion.is_some() {
                    self.set_suggestion(None);
                }
                self.input.handle_key(key);
                Vec::new()
            }
        }
    }

    fn input_ctrl_c(&mut self) -> Vec<Effect> {
        if self.ctrl_c_pending {
            self.quitting = true;
            return vec![Effect::Quit];
        }
        self.ctrl_c_pending = true;
        self.input.clear();
        self.completions.clear();
        self.set_suggestion(None);
        vec![Effect::schedule(CTRL_C_WINDOW, Msg::CtrlCReset)]
    }

    /// Tab: complete a `/name`, or accept the suggestion into an empty editor.
    fn tab_complete(&mut self) -> Vec<Effect> {
        let text = self.input.text().to_string();
        let Some(typed) = text.strip_prefix('/') else {
            if text.is_empty() {
                if let Some(suggestion) = self.suggestion.take() {
                    self.input.set_placeholder(DEFAULT_PLACEHOLDER);
                    self.input.set_text(suggestion);
                }
            }
            return Vec::new();
        };
        if typed.contains(char::is_whitespace) {
            return Vec::new();
        }
        if !self.completions.is_empty() && typed == self.completions.base {
            self.completions.next();
            return Vec::new();
        }
        let mut items = self.registry.fuzzy_complete(typed);
        items.truncate(MAX_COMPLETIONS);
        self.completions = Completions {
            items,
            index: 0,
            base: typed.to_string(),
        };
        Vec::new()
    }

    fn streaming_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if is_ctrl_c(&key) {
            return self.cancel_turn();
        }
        match key.code {
            KeyCode::Enter
                if !key
                    .modifiers
                    .intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) =>
            {
                let text = self.input.take_text();
                let text = text.trim();
                if text.is_empty() {
                    return Vec::new();
                }
                self.queue.enqueue(text);
                tracing::debug!(queued = self.queue.len(), "message queued");
                vec![Effect::Print(ScrollbackEntry::Queued(text.to_string()))]
            }
            KeyCode::Esc => {
                if !self.input.is_empty() {
                    self.input.clear();
                    return Vec::new();
                }
                match self.queue.remove_last() {
                    Some(removed) => vec![Effect::dim(format!(
                        "Removed queued message: {}",
                        truncate_with_ellipsis(&removed, 40)
                    ))],
                    None => Vec::new(),
                }
            }
            _ => {
                self.input.handle_key(key);
                Vec::new()
            }
        }
    }

    /// Cancels the running turn and drops everything waiting on it.
    pub(crate) fn cancel_turn(&mut self) -> Vec<Effect> {
        self.queue.clear();
        self.deferred.clear();
        self.cancel.cancel();
        tracing::debug!("turn cancelled by user");
        Vec::new()
    }

    pub(crate) fn open_help(&mut self) -> Vec<Effect> {
        self.input.blur();
        self.mode = ModeState::Help(HelpScreen::default());
        Vec::new()
    }

    fn on_todo_update(&mut self, todos: Vec<TodoItem>) -> Vec<Effect> {
        self.todos = todos;
        if self.todos.is_empty() {
            return Vec::new();
        }
        vec![Effect::Print(ScrollbackEntry::Todos(self.todos.clone()))]
    }

    fn on_diff_loaded(&mut self, data: DiffData) -> Vec<Effect> {
        self.diff_loading = false;
        if self.mode() != Mode::Input {
            tracing::debug!("diff arrived outside input mode; discarded");
            return Vec::new();
        }
        self.spinner.stop();
        self.input.blur();
        self.mode = ModeState::Diff(DiffViewer::new(data));
        Vec::new()
    }

    fn on_sessions_loaded(&mut self, result: Result<Vec<Session>, String>) -> Vec<Effect> {
        match result {
            Err(err) => vec![Effect::warning(err)],
            Ok(sessions) if sessions.is_empty() => vec![Effect::info("No saved sessions to resume")],
            Ok(sessions) => {
                if self.mode() != Mode::Input {
                    return Vec::new();
                }
                self.input.blur();
                self.mode = ModeState::Resume(ResumePicker::new(sessions));
                Vec::new()
            }
        }
    }

    fn on_continue_loaded(&mut self, result: Result<Option<Session>, String>) -> Vec<Effect> {
        let mut effects = match result {
            Err(err) => vec![Effect::warning(err)],
            Ok(None) => vec![Effect::info("No previous session to continue")],
            Ok(Some(session)) => self.adopt_session(session),
        };
        if let Some(prompt) = self.initial_prompt.take() {
            effects.extend(self.handle_submit(&prompt));
        }
        effects
    }

    /// Reads the most recent session off the loop; the result arrives as
    /// [`Msg::ContinueLoaded`].
    pub(crate) fn load_most_recent(&self) -> Effect {
        let store = Arc::clone(&self.deps.sessions);
        Effect::task(async move {
            let result = tokio::task::spawn_blocking(move || store.most_recent())
                .await
                .map_err(|err| err.to_string())
                .and_then(|r| r.map_err(|err| err.to_string()));
            Some(Msg::ContinueLoaded(result))
        })
    }

    pub(crate) fn load_sessions(&self) -> Effect {
        let store = Arc::clone(&self.deps.sessions);
        Effect::task(async move {
            let result = tokio::task::spawn_blocking(move || store.list())
                .await
                .map_err(|err| err.to_string())
                .and_then(|r| r.map_err(|err| err.to_string()));
            Some(Msg::SessionsLoaded(result))
        })
    }

    /// Replaces the current session with `session` and hands its history to
    /// the worker.
    pub(crate) fn adopt_session(&mut self, session: Session) -> Vec<Effect> {
        let messages = session.messages.clone();
        let count = messages.len();
        let id = session.id.clone();
        self.session.replace(session);
        self.tokens.reset();
        self.todos.clear();
        self.set_suggestion(None);
        tracing::info!(session = %id, count, "session adopted");
        let agent = Arc::clone(&self.deps.agent);
        vec![
            Effect::call(move || agent.set_messages(messages)),
            Effect::info(format!(
                "Resumed session {} ({count} messages)",
                truncate_with_ellipsis(&id, 8)
            )),
        ]
    }

    /// Runs the configured status-line command, if any.
    pub(crate) fn refresh_status_line(&self) -> Option<Effect> {
        let config = self
            .settings
            .status_line
            .as_ref()
            .filter(|config| config.is_command())?;
        let command = config.command.clone();
        let session_id = self.session.id();
        let input = StatusLineInput::build(&StatusLineContext {
            cwd: &self.cwd,
            session_id: &session_id,
            model_id: self.effective_model_id(),
            version: &self.version,
            tokens: &self.tokens,
            total_duration: self.started_at.elapsed(),
            api_duration: self.api_time,
        });
        Some(Effect::task(async move {
            render_status_line(&command, &input)
                .await
                .map(Msg::StatusLineUpdate)
        }))
    }

    /// Asks for a next-prompt suggestion when a client is configured.
    pub(crate) fn request_suggestion(&mut self) -> Option<Effect> {
        if !self.settings.prompt_suggestions || self.suggestion_generating {
            return None;
        }
        let client = self.deps.completion.clone()?;
        let agent = Arc::clone(&self.deps.agent);
        let model = self.model_name.clone();
        self.suggestion_generating = true;
        Some(Effect::task(async move {
            let messages = agent.messages();
            let suggestion = generate_suggestion(client.as_ref(), &model, messages).await;
            Some(Msg::PromptSuggestionResult(suggestion))
        }))
    }
}
