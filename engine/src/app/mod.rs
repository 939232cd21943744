//! The event-loop model.
//!
//! [`Model`] holds all UI state and is mutated only by [`Model::update`],
//! which takes one [`Msg`](crate::Msg) and returns the [`Effect`]s the runtime
//! must carry out. Worker calls, process spawns and file IO never happen
//! inside `update`; they are wrapped in effects.
//!
//! # Modes
//!
//! The active [`ModeState`] decides which handler owns the keyboard and what
//! the live region shows. Modal state lives inside the variant, so a panel or
//! pending request exists exactly when its mode is active.

mod modal;
mod streaming;
mod submit;
mod update;


pub use submit::EXIT_WORDS;

use std::collections::VecDeque;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use tern_types::{FAST_MODEL, Settings, Skill, TodoItem};

use crate::agent::{Agent, CompletionClient, McpStatusSource};
use crate::commands::{SlashRegistry, builtin_registry};
use crate::diff_loader::DiffLoader;
use crate::effect::{Effect, Mailbox};
use crate::queue::InputQueue;
use crate::rendezvous::{
    AskUserRequest, MailboxAskUserHandler, MailboxPermissionHandler, PermissionRequest,
};
use crate::session::{SessionStore, SharedSession, turn_complete_callback};
use crate::settings_store::SettingsStore;
use crate::sink::StreamSink;
use crate::tokens::TokenTracker;
use crate::ui::{
    AskUserPrompt, ConfigPanel, DiffViewer, HelpScreen, ModelPicker, PermissionPrompt,
    ResumePicker, Spinner, TextInput,
};

/// Window in which a second Ctrl-C quits.
pub const CTRL_C_WINDOW: Duration = Duration::from_millis(800);

pub const DEFAULT_PLACEHOLDER: &str = "Type a message, or /help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Input,
    Streaming,
    Permission,
    AskUser,
    Resume,
    ModelPicker,
    Diff,
    Config,
    Help,
}

/// What the caller should do after the loop exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitAction {
    #[default]
    None,
    Login,
}

#[derive(Debug)]
pub enum ModeState {
    Input,
    Streaming,
    Permission(PermissionPrompt),
    AskUser(AskUserPrompt),
    Resume(ResumePicker),
    ModelPicker(ModelPicker),
    Diff(DiffViewer),
    Config(ConfigPanel),
    Help(HelpScreen),
}

impl ModeState {
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self {
            ModeState::Input => Mode::Input,
            ModeState::Streaming => Mode::Streaming,
            ModeState::Permission(_) => Mode::Permission,
            ModeState::AskUser(_) => Mode::AskUser,
            ModeState::Resume(_) => Mode::Resume,
            ModeState::ModelPicker(_) => Mode::ModelPicker,
            ModeState::Diff(_) => Mode::Diff,
            ModeState::Config(_) => Mode::Config,
            ModeState::Help(_) => Mode::Help,
        }
    }
}

/// A rendezvous request waiting for the prompt in front of it.
#[derive(Debug)]
pub(crate) enum Deferred {
    Permission(PermissionRequest),
    AskUser(AskUserRequest),
}

/// Tab-completion state for `/` commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completions {
    pub items: Vec<String>,
    pub index: usize,
    /// The typed name the items were built from.
    pub base: String,
}

impl Completions {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.items.get(self.index).map(String::as_str)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn next(&mut self) {
        if !self.items.is_empty() {
            self.index = (self.index + 1) % self.items.len();
        }
    }

    fn prev(&mut self) {
        if !self.items.is_empty() {
            self.index = (self.index + self.items.len() - 1) % self.items.len();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TurnKind {
    Prompt,
    Compact,
}

/// Collaborators the model talks to through effects.
#[derive(Clone)]
pub struct Deps {
    pub agent: Arc<dyn Agent>,
    pub sessions: Arc<dyn SessionStore>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub diff_loader: Arc<dyn DiffLoader>,
    /// Client for prompt suggestions; `None` disables them.
    pub completion: Option<Arc<dyn CompletionClient>>,
    pub mcp: Arc<dyn McpStatusSource>,
    pub mailbox: Mailbox,
}

/// Runtime parameters fixed at startup.
#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub version: String,
    pub cwd: PathBuf,
    pub settings: Settings,
    pub model: String,
    pub session: SharedSession,
    pub skills: Vec<Skill>,
    pub initial_prompt: Option<String>,
    /// Adopt the most recent session on the first tick.
    pub continue_session: bool,
    pub config_path: Option<PathBuf>,
    pub sessions_dir: Option<PathBuf>,
    pub api_key_present: bool,
}

pub struct Model {
    pub(crate) deps: Deps,
    pub(crate) mode: ModeState,
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) input: TextInput,
    pub(crate) streaming_text: String,
    pub(crate) active_tool: Option<String>,
    pub(crate) tokens: TokenTracker,
    pub(crate) session: SharedSession,
    pub(crate) queue: InputQueue,
    pub(crate) deferred: VecDeque<Deferred>,
    pub(crate) completions: Completions,
    pub(crate) suggestion: Option<String>,
    pub(crate) suggestion_generating: bool,
    pub(crate) status_line: String,
    pub(crate) ctrl_c_pending: bool,
    pub(crate) fast_mode: bool,
    /// Model in use before fast mode switched away from it.
    pub(crate) pre_fast_model: Option<String>,
    pub(crate) settings: Settings,
    pub(crate) model_name: String,
    pub(crate) resolved_model_id: Option<String>,
    pub(crate) version: String,
    pub(crate) cwd: PathBuf,
    pub(crate) initial_prompt: Option<String>,
    pub(crate) continue_session: bool,
    pub(crate) quitting: bool,
    pub(crate) exit_action: ExitAction,
    pub(crate) registry: Arc<SlashRegistry>,
    pub(crate) cancel: CancellationToken,
    pub(crate) turn_kind: TurnKind,
    pub(crate) turn_started: Option<Instant>,
    pub(crate) last_stream_error: Option<String>,
    pub(crate) todos: Vec<TodoItem>,
    pub(crate) spinner: Spinner,
    pub(crate) diff_loading: bool,
    pub(crate) submit_count: u64,
    pub(crate) started_at: Instant,
    pub(crate) api_time: Duration,
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) sessions_dir: Option<PathBuf>,
    pub(crate) api_key_present: bool,
}

impl Model {
    /// Builds the model and registers the loop's handlers with the worker.
    #[must_use]
    pub fn new(deps: Deps, options: ModelOptions) -> Self {
        let mut registry = builtin_registry();
        registry.register_skills(&options.skills);

        let agent = &deps.agent;
        agent.set_handler(Arc::new(StreamSink::new(deps.mailbox.clone())));
        agent.set_permission_handler(Arc::new(MailboxPermissionHandler::new(deps.mailbox.clone())));
        agent.set_ask_user_handler(Arc::new(MailboxAskUserHandler::new(deps.mailbox.clone())));
        agent.set_on_turn_complete(turn_complete_callback(
            options.session.clone(),
            Arc::clone(&deps.sessions),
            deps.mailbox.clone(),
        ));
        agent.set_permission_mode(options.settings.permission_mode);

        let fast_mode = options.settings.fast_mode;
        let (model_name, pre_fast_model) = if fast_mode && options.model != FAST_MODEL {
            (FAST_MODEL.to_string(), Some(options.model))
        } else {
            (options.model, None)
        };
        agent.set_model(&model_name);
        agent.set_fast_mode(fast_mode);

        let mut input = TextInput::default();
        input.set_placeholder(DEFAULT_PLACEHOLDER);
        input.set_vim(options.settings.vim_mode);

        Self {
            deps,
            mode: ModeState::Input,
            width: 80,
            height: 24,
            input,
            streaming_text: String::new(),
            active_tool: None,
            tokens: TokenTracker::default(),
            session: options.session,
            queue: InputQueue::default(),
            deferred: VecDeque::new(),
            completions: Completions::default(),
            suggestion: None,
            suggestion_generating: false,
            status_line: String::new(),
            ctrl_c_pending: false,
            fast_mode,
            pre_fast_model,
            settings: options.settings,
            model_name,
            resolved_model_id: None,
            version: options.version,
            cwd: options.cwd,
            initial_prompt: options.initial_prompt,
            continue_session: options.continue_session,
            quitting: false,
            exit_action: ExitAction::None,
            registry: Arc::new(registry),
            cancel: CancellationToken::new(),
            turn_kind: TurnKind::Prompt,
            turn_started: None,
            last_stream_error: None,
            todos: Vec::new(),
            spinner: Spinner::default(),
            diff_loading: false,
            submit_count: 0,
            started_at: Instant::now(),
            api_time: Duration::ZERO,
            config_path: options.config_path,
            sessions_dir: options.sessions_dir,
            api_key_present: options.api_key_present,
        }
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode.mode()
    }

    #[must_use]
    pub fn mode_state(&self) -> &ModeState {
        &self.mode
    }

    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    #[must_use]
    pub fn input(&self) -> &TextInput {
        &self.input
    }

    #[must_use]
    pub fn streaming_text(&self) -> &str {
        &self.streaming_text
    }

    #[must_use]
    pub fn active_tool(&self) -> Option<&str> {
        self.active_tool.as_deref()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenTracker {
        &self.tokens
    }

    #[must_use]
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    #[must_use]
    pub fn queue(&self) -> &InputQueue {
        &self.queue
    }

    #[must_use]
    pub fn completions(&self) -> &Completions {
        &self.completions
    }

    #[must_use]
    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    #[must_use]
    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    #[must_use]
    pub fn ctrl_c_pending(&self) -> bool {
        self.ctrl_c_pending
    }

    #[must_use]
    pub fn fast_mode(&self) -> bool {
        self.fast_mode
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The id the API reported, falling back to the configured name.
    #[must_use]
    pub fn effective_model_id(&self) -> &str {
        self.resolved_model_id.as_deref().unwrap_or(&self.model_name)
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    #[must_use]
    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    #[must_use]
    pub fn exit_action(&self) -> ExitAction {
        self.exit_action
    }

    #[must_use]
    pub fn registry(&self) -> &SlashRegistry {
        &self.registry
    }

    #[must_use]
    pub fn todos(&self) -> &[TodoItem] {
        &self.todos
    }

    #[must_use]
    pub fn spinner(&self) -> &Spinner {
        &self.spinner
    }

    #[must_use]
    pub fn is_diff_loading(&self) -> bool {
        self.diff_loading
    }

    #[must_use]
    pub fn submit_count(&self) -> u64 {
        self.submit_count
    }

    /// Elapsed time of the running turn.
    #[must_use]
    pub fn turn_elapsed(&self) -> Option<Duration> {
        self.turn_started.map(|t| t.elapsed())
    }

    /// Switches fast mode on or off, moving to the fast model and back.
    pub fn apply_fast_mode(&mut self, enabled: bool) -> Vec<Effect> {
        self.fast_mode = enabled;
        self.settings.fast_mode = enabled;
        if enabled {
            if self.model_name != FAST_MODEL {
                let previous = mem::replace(&mut self.model_name, FAST_MODEL.to_string());
                self.pre_fast_model = Some(previous);
            }
        } else if let Some(previous) = self.pre_fast_model.take() {
            self.model_name = previous;
        }
        let agent = Arc::clone(&self.deps.agent);
        let model = self.model_name.clone();
        vec![Effect::call(move || {
            agent.set_fast_mode(enabled);
            agent.set_model(&model);
        })]
    }

    /// Returns to `Input` and focuses the editor.
    pub(crate) fn enter_input(&mut self) -> Vec<Effect> {
        self.mode = ModeState::Input;
        if !self.diff_loading {
            self.spinner.stop();
        }
        vec![self.input.focus()]
    }

    /// Resubmits the queue head, if any. Exactly one item per finished turn.
    pub(super) fn submit_queued(&mut self) -> Vec<Effect> {
        if self.queue.is_empty() {
            return Vec::new();
        }
        let text = self.queue.dequeue();
        tracing::debug!(remaining = self.queue.len(), "submitting queued message");
        self.mode = ModeState::Input;
        self.handle_submit(&text)
    }

    pub(crate) fn set_suggestion(&mut self, suggestion: Option<String>) {
        match &suggestion {
            Some(text) => self.input.set_placeholder(text.clone()),
            None => self.input.set_placeholder(DEFAULT_PLACEHOLDER),
        }
        self.suggestion = suggestion;
    }
}
