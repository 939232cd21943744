//! Core engine for tern: the event-loop model and everything it talks to.
//!
//! This crate has no terminal dependencies beyond key-event types. The
//! [`Model`] is driven by [`Msg`] values and answers with [`Effect`]s; the
//! binary owns the terminal and executes those effects. The conversation
//! worker ([`ConversationAgent`]) runs on its own tasks and reaches the loop
//! only through the [`Mailbox`].

mod agent;
mod app;
pub mod commands;
mod diff_loader;
mod effect;
pub mod fuzzy;
mod msg;
mod process;
mod queue;
mod rendezvous;
mod scrollback;
mod session;
mod settings_store;
mod sink;
mod status_line;
mod suggestion;
mod summary;
mod tokens;
pub mod ui;
mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use agent::{
    Agent, AgentError, AgentFuture, AskUserFuture, AskUserHandler, CompletionClient,
    CompletionFuture, McpServerStatus, McpStatusSource, NoMcpServers, PermissionFuture,
    PermissionHandler, TurnCompleteFn,
};
pub use app::{
    CTRL_C_WINDOW, Completions, DEFAULT_PLACEHOLDER, Deps, EXIT_WORDS, ExitAction, Mode,
    ModeState, Model, ModelOptions,
};
pub use commands::{SlashCommand, SlashRegistry, builtin_registry};
pub use diff_loader::{DiffLoadError, DiffLoader, GitDiffLoader, load_git_diff};
pub use effect::{Effect, ExecRequest, ExitCallback, Mailbox, TaskFuture};
pub use msg::{Msg, StreamBlock};
pub use queue::InputQueue;
pub use rendezvous::{
    AskUserRequest, MailboxAskUserHandler, MailboxPermissionHandler, PermissionRequest,
    Responder, permission_suggestions,
};
pub use scrollback::ScrollbackEntry;
pub use session::{FileSessionStore, SessionStore, SharedSession, StoreError, turn_complete_callback};
pub use settings_store::{FileSettingsStore, SettingsStore};
pub use sink::StreamSink;
pub use status_line::{
    STATUS_LINE_TIMEOUT, StatusLineContext, StatusLineError, StatusLineInput, render_status_line,
};
pub use suggestion::{generate_suggestion, validate_suggestion};
pub use summary::{edit_preview, parse_tool_input, summarize_tool, verbose_summary};
pub use tokens::{TokenTracker, format_tokens};
pub use worker::{ConversationAgent, NoTools, TodoSink, ToolFuture, ToolRuntime};
