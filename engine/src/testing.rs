//! Fakes and an effect-executing harness for driving [`Model`] in tests.
//!
//! The [`Harness`] plays the runtime: it applies every effect a message
//! produces, spawns tasks on the current tokio runtime, and feeds their
//! results (and anything the fake worker posts) back into `update`.

#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tern_config::ConfigError;
use tern_types::{
    Answers, BlockStart, DEFAULT_MODEL, DiffData, Message, PermissionContext, PermissionMode,
    PermissionVerdict, Question, Session, SettingValue, Settings, Skill, StreamHandler, Usage,
};

use crate::agent::{
    Agent, AgentError, AgentFuture, AskUserHandler, CompletionClient, CompletionFuture,
    NoMcpServers, PermissionHandler, TurnCompleteFn,
};
use crate::app::{Deps, Mode, Model, ModelOptions};
use crate::diff_loader::{DiffFuture, DiffLoader};
use crate::effect::{Effect, Mailbox};
use crate::msg::Msg;
use crate::scrollback::ScrollbackEntry;
use crate::session::{SessionStore, SharedSession, StoreError};
use crate::settings_store::SettingsStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One scripted worker turn.
#[derive(Debug, Clone)]
pub enum FakeTurn {
    /// Streams `text` as a single text block.
    Reply(String),
    /// Asks permission for a tool, then replies.
    Tool {
        name: String,
        input: Value,
        reply: String,
    },
    /// Asks the user questions, then replies.
    Ask {
        questions: Vec<Question>,
        reply: String,
    },
    /// Reports a stream error and fails the turn with the same text.
    Fail(String),
    /// Never finishes until cancelled.
    Hang,
}

#[derive(Default)]
struct FakeState {
    model: String,
    fast_mode: bool,
    permission_mode: PermissionMode,
    history: Vec<Message>,
    script: VecDeque<FakeTurn>,
    sent: Vec<String>,
    compacts: usize,
    clears: usize,
    prompt_tokens: Option<u64>,
    verdicts: Vec<PermissionVerdict>,
    answers: Vec<Answers>,
    handler: Option<Arc<dyn StreamHandler>>,
    permission: Option<Arc<dyn PermissionHandler>>,
    ask_user: Option<Arc<dyn AskUserHandler>>,
    on_turn_complete: Option<TurnCompleteFn>,
}

/// A worker that follows a script instead of calling an API. Unscripted turns
/// reply `"ok"`.
#[derive(Default)]
pub struct FakeAgent {
    state: Mutex<FakeState>,
}

impl FakeAgent {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        lock(&self.state)
    }

    pub fn script(&self, turn: FakeTurn) {
        self.state().script.push_back(turn);
    }

    /// Input tokens reported by each reply after this call; 10 by default.
    pub fn report_prompt_tokens(&self, tokens: u64) {
        self.state().prompt_tokens = Some(tokens);
    }

    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    #[must_use]
    pub fn compacts(&self) -> usize {
        self.state().compacts
    }

    #[must_use]
    pub fn clears(&self) -> usize {
        self.state().clears
    }

    #[must_use]
    pub fn verdicts(&self) -> Vec<PermissionVerdict> {
        self.state().verdicts.clone()
    }

    #[must_use]
    pub fn answers(&self) -> Vec<Answers> {
        self.state().answers.clone()
    }

    #[must_use]
    pub fn current_permission_mode(&self) -> PermissionMode {
        self.state().permission_mode
    }

    async fn run_turn(&self, cancel: &CancellationToken, text: String) -> Result<(), AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let (turn, handler, permission, ask_user) = {
            let mut state = self.state();
            state.sent.push(text.clone());
            let turn = state
                .script
                .pop_front()
                .unwrap_or_else(|| FakeTurn::Reply("ok".to_string()));
            (
                turn,
                state.handler.clone(),
                state.permission.clone(),
                state.ask_user.clone(),
            )
        };

        let reply = match turn {
            FakeTurn::Reply(reply) => reply,
            FakeTurn::Tool { name, input, reply } => {
                if let Some(handler) = &handler {
                    stream_tool(handler.as_ref(), &name, &input);
                }
                if let Some(permission) = permission {
                    let verdict = permission.request_permission(cancel, &name, &input).await?;
                    self.state().verdicts.push(verdict);
                }
                reply
            }
            FakeTurn::Ask { questions, reply } => {
                if let Some(ask_user) = ask_user {
                    let answers = ask_user.ask(cancel, questions).await?;
                    self.state().answers.push(answers);
                }
                reply
            }
            FakeTurn::Fail(message) => {
                if let Some(handler) = &handler {
                    handler.on_error(&message);
                }
                return Err(AgentError::Tool(message));
            }
            FakeTurn::Hang => {
                cancel.cancelled().await;
                return Err(AgentError::Cancelled);
            }
        };

        if let Some(handler) = &handler {
            let prompt_tokens = self.state().prompt_tokens.unwrap_or(10);
            stream_text(handler.as_ref(), &reply, prompt_tokens);
        }
        let (history, callback) = {
            let mut state = self.state();
            state.history.push(Message::user(text));
            state.history.push(Message::assistant_text(reply));
            (state.history.clone(), state.on_turn_complete.clone())
        };
        if let Some(callback) = callback {
            callback(&history);
        }
        Ok(())
    }
}

fn stream_text(handler: &dyn StreamHandler, text: &str, prompt_tokens: u64) {
    let usage = Usage {
        input_tokens: prompt_tokens,
        ..Usage::default()
    };
    handler.on_message_start(usage, Some(DEFAULT_MODEL));
    handler.on_content_block_start(0, &BlockStart::Text);
    handler.on_text_delta(0, text);
    handler.on_content_block_stop(0);
    let out = Usage {
        output_tokens: 5,
        ..Usage::default()
    };
    handler.on_message_delta(Some("end_turn"), Some(out));
    handler.on_message_stop();
}

fn stream_tool(handler: &dyn StreamHandler, name: &str, input: &Value) {
    handler.on_content_block_start(
        1,
        &BlockStart::ToolUse {
            id: "toolu_fake".to_string(),
            name: name.to_string(),
        },
    );
    handler.on_input_json_delta(1, &input.to_string());
    handler.on_content_block_stop(1);
}

impl Agent for FakeAgent {
    fn send_message(&self, cancel: CancellationToken, text: String) -> AgentFuture<'_> {
        Box::pin(async move { self.run_turn(&cancel, text).await })
    }

    fn compact(&self, cancel: CancellationToken) -> AgentFuture<'_> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            let mut state = self.state();
            state.compacts += 1;
            if state.history.len() < 2 {
                return Err(AgentError::NothingToCompact);
            }
            state.history = vec![
                Message::user("Summary of the conversation so far"),
                Message::assistant_text("Understood."),
            ];
            Ok(())
        })
    }

    fn clear(&self) {
        let mut state = self.state();
        state.clears += 1;
        state.history.clear();
    }

    fn set_model(&self, model: &str) {
        self.state().model = model.to_string();
    }

    fn model(&self) -> String {
        self.state().model.clone()
    }

    fn set_fast_mode(&self, enabled: bool) {
        self.state().fast_mode = enabled;
    }

    fn fast_mode(&self) -> bool {
        self.state().fast_mode
    }

    fn set_permission_mode(&self, mode: PermissionMode) {
        self.state().permission_mode = mode;
    }

    fn set_on_turn_complete(&self, callback: TurnCompleteFn) {
        self.state().on_turn_complete = Some(callback);
    }

    fn set_handler(&self, handler: Arc<dyn StreamHandler>) {
        self.state().handler = Some(handler);
    }

    fn set_permission_handler(&self, handler: Arc<dyn PermissionHandler>) {
        self.state().permission = Some(handler);
    }

    fn set_ask_user_handler(&self, handler: Arc<dyn AskUserHandler>) {
        self.state().ask_user = Some(handler);
    }

    fn messages(&self) -> Vec<Message> {
        self.state().history.clone()
    }

    fn set_messages(&self, messages: Vec<Message>) {
        self.state().history = messages;
    }

    fn history_len(&self) -> usize {
        self.state().history.len()
    }

    fn permission_context(&self) -> PermissionContext {
        PermissionContext {
            mode: self.state().permission_mode,
            always_allowed: Vec::new(),
        }
    }
}

/// Sessions held in memory, newest first on `list`.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<Session>>,
    next_id: AtomicUsize,
}

impl MemorySessionStore {
    #[must_use]
    pub fn with_sessions(sessions: Vec<Session>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            next_id: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        lock(&self.sessions).iter().find(|s| s.id == id).cloned()
    }
}

impl SessionStore for MemorySessionStore {
    fn list(&self) -> Result<Vec<Session>, StoreError> {
        let mut sessions = lock(&self.sessions).clone();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        let mut sessions = lock(&self.sessions);
        sessions.retain(|s| s.id != session.id);
        sessions.push(session.clone());
        Ok(())
    }

    fn generate_id(&self) -> String {
        format!("session-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Records every persisted key.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    writes: Mutex<Vec<(String, SettingValue)>>,
}

impl MemorySettingsStore {
    #[must_use]
    pub fn writes(&self) -> Vec<(String, SettingValue)> {
        lock(&self.writes).clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn persist(&self, key: &str, value: &SettingValue) -> Result<(), ConfigError> {
        lock(&self.writes).push((key.to_string(), value.clone()));
        Ok(())
    }
}

/// Returns canned diff data.
#[derive(Debug, Default)]
pub struct FakeDiffLoader {
    pub data: DiffData,
}

impl DiffLoader for FakeDiffLoader {
    fn load<'a>(&'a self, _cwd: &'a Path) -> DiffFuture<'a> {
        let data = self.data.clone();
        Box::pin(async move { data })
    }
}

/// Completion client that always answers `reply`.
#[derive(Debug, Clone)]
pub struct FakeCompletion {
    pub reply: String,
}

impl CompletionClient for FakeCompletion {
    fn complete<'a>(
        &'a self,
        _model: &'a str,
        _system: &'a str,
        _messages: Vec<Message>,
        _max_tokens: u32,
    ) -> CompletionFuture<'a> {
        let reply = self.reply.clone();
        Box::pin(async move { Ok(reply) })
    }
}

/// Knobs for [`Harness::with`].
#[derive(Debug, Clone, Default)]
pub struct HarnessOptions {
    pub settings: Settings,
    pub sessions: Vec<Session>,
    pub skills: Vec<Skill>,
    pub diff: DiffData,
    /// Reply of the suggestion client; `None` leaves suggestions disabled.
    pub suggestion: Option<String>,
    pub initial_prompt: Option<String>,
    pub continue_session: bool,
}

/// A model wired to fakes, plus a record of every effect it produced.
pub struct Harness {
    pub model: Model,
    pub agent: Arc<FakeAgent>,
    pub sessions: Arc<MemorySessionStore>,
    pub settings: Arc<MemorySettingsStore>,
    pub printed: Vec<ScrollbackEntry>,
    /// Messages from `Schedule` effects; never fired automatically.
    pub scheduled: Vec<Msg>,
    /// `(program, args)` of every `Exec` effect.
    pub execs: Vec<(String, Vec<String>)>,
    pub quit: bool,
    mailbox: Mailbox,
    rx: mpsc::UnboundedReceiver<Msg>,
    in_flight: Arc<AtomicUsize>,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self::with(HarnessOptions::default())
    }

    #[must_use]
    pub fn with(options: HarnessOptions) -> Self {
        let (mailbox, rx) = Mailbox::channel();
        let agent = Arc::new(FakeAgent::default());
        let sessions = Arc::new(MemorySessionStore::with_sessions(options.sessions));
        let settings = Arc::new(MemorySettingsStore::default());
        let completion = options.suggestion.map(|reply| {
            Arc::new(FakeCompletion { reply }) as Arc<dyn CompletionClient>
        });
        let deps = Deps {
            agent: agent.clone(),
            sessions: sessions.clone(),
            settings_store: settings.clone(),
            diff_loader: Arc::new(FakeDiffLoader { data: options.diff }),
            completion,
            mcp: Arc::new(NoMcpServers),
            mailbox: mailbox.clone(),
        };
        let cwd = PathBuf::from("/work/project");
        let model_id = options
            .settings
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let session = SharedSession::new(Session::new(
            sessions.generate_id(),
            model_id.clone(),
            cwd.clone(),
            Utc::now(),
        ));
        let model = Model::new(
            deps,
            ModelOptions {
                version: "0.1.0".to_string(),
                cwd,
                settings: options.settings,
                model: model_id,
                session,
                skills: options.skills,
                initial_prompt: options.initial_prompt,
                continue_session: options.continue_session,
                config_path: Some(PathBuf::from("/home/user/.tern/config.toml")),
                sessions_dir: Some(PathBuf::from("/home/user/.tern/sessions")),
                api_key_present: true,
            },
        );
        Self {
            model,
            agent,
            sessions,
            settings,
            printed: Vec::new(),
            scheduled: Vec::new(),
            execs: Vec::new(),
            quit: false,
            mailbox,
            rx,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Runs `update` and applies the resulting effects.
    pub fn send(&mut self, msg: Msg) {
        let effects = self.model.update(msg);
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Print(entry) => self.printed.push(entry),
                Effect::Quit => self.quit = true,
                Effect::Schedule { msg, .. } => self.scheduled.push(msg),
                Effect::Exec(request) => self.execs.push((request.program, request.args)),
                Effect::Task(future) => {
                    let mailbox = self.mailbox.clone();
                    let in_flight = Arc::clone(&self.in_flight);
                    in_flight.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        if let Some(msg) = future.await {
                            mailbox.post(msg);
                        }
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    });
                }
                Effect::Call(call) => {
                    if let Some(msg) = call() {
                        self.send(msg);
                    }
                }
            }
        }
    }

    /// Processes posted messages until every task has finished or the model
    /// is waiting on the user.
    pub async fn settle(&mut self) {
        for _ in 0..5_000 {
            while let Ok(msg) = self.rx.try_recv() {
                self.send(msg);
            }
            let waiting_on_user = matches!(self.model.mode(), Mode::Permission | Mode::AskUser);
            if self.in_flight.load(Ordering::SeqCst) == 0 || waiting_on_user {
                // Let tasks that just finished post their last message.
                tokio::task::yield_now().await;
                if self.rx.is_empty() {
                    return;
                }
                continue;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("harness did not settle");
    }

    pub fn press(&mut self, key: KeyEvent) {
        self.send(Msg::Key(key));
    }

    pub fn key(&mut self, code: KeyCode) {
        self.press(KeyEvent::new(code, KeyModifiers::NONE));
    }

    pub fn ctrl(&mut self, c: char) {
        self.press(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL));
    }

    pub fn type_str(&mut self, text: &str) {
        for c in text.chars() {
            self.key(KeyCode::Char(c));
        }
    }

    /// Types `text` and presses Enter.
    pub fn submit(&mut self, text: &str) {
        self.type_str(text);
        self.key(KeyCode::Enter);
    }

    /// Plain text of everything printed so far, one entry per line.
    #[must_use]
    pub fn printed_text(&self) -> String {
        self.printed
            .iter()
            .map(ScrollbackEntry::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear_printed(&mut self) {
        self.printed.clear();
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// A session updated `minutes_ago` with one user/assistant exchange.
#[must_use]
pub fn saved_session(id: &str, minutes_ago: i64, first: &str) -> Session {
    let at = Utc::now() - chrono::Duration::minutes(minutes_ago);
    let mut session = Session::new(id, DEFAULT_MODEL, PathBuf::from("/work/project"), at);
    session.messages = vec![Message::user(first), Message::assistant_text("done")];
    session.updated_at = at;
    session
}
