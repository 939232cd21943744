//! The worker contract consumed by the event loop.
//!
//! The loop never calls these methods from `update`; calls are wrapped in
//! effects so the loop stays free of blocking work.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use tern_providers::ProviderError;
use tern_types::{
    Answers, Message, PermissionContext, PermissionMode, PermissionVerdict, Question, StreamHandler,
};

#[derive(Debug, Error)]
pub enum AgentError {
    /// The turn's cancellation token fired.
    #[error("Interrupted")]
    Cancelled,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("{0}")]
    Tool(String),
    #[error("nothing to compact")]
    NothingToCompact,
}

impl AgentError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Cancelled)
    }
}

pub type AgentFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AgentError>> + Send + 'a>>;

pub type PermissionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<PermissionVerdict, AgentError>> + Send + 'a>>;

pub type AskUserFuture<'a> = Pin<Box<dyn Future<Output = Result<Answers, AgentError>> + Send + 'a>>;

/// Called by the worker with the full history after every completed turn.
pub type TurnCompleteFn = Arc<dyn Fn(&[Message]) + Send + Sync>;

/// Asks the user whether a tool may run. Safe to call from any worker task.
pub trait PermissionHandler: Send + Sync {
    fn request_permission<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        tool: &'a str,
        input: &'a serde_json::Value,
    ) -> PermissionFuture<'a>;
}

/// Asks the user one or more multiple-choice questions.
pub trait AskUserHandler: Send + Sync {
    fn ask<'a>(&'a self, cancel: &'a CancellationToken, questions: Vec<Question>) -> AskUserFuture<'a>;
}

pub trait Agent: Send + Sync {
    /// Runs one user turn to completion, streaming into the registered handler.
    fn send_message(&self, cancel: CancellationToken, text: String) -> AgentFuture<'_>;

    /// Replaces the history with a summary of itself.
    fn compact(&self, cancel: CancellationToken) -> AgentFuture<'_>;

    /// Resets history in place.
    fn clear(&self);

    fn set_model(&self, model: &str);

    fn model(&self) -> String;

    fn set_fast_mode(&self, enabled: bool);

    fn fast_mode(&self) -> bool;

    fn set_permission_mode(&self, mode: PermissionMode);

    fn set_on_turn_complete(&self, callback: TurnCompleteFn);

    fn set_handler(&self, handler: Arc<dyn StreamHandler>);

    fn set_permission_handler(&self, handler: Arc<dyn PermissionHandler>);

    fn set_ask_user_handler(&self, handler: Arc<dyn AskUserHandler>);

    fn messages(&self) -> Vec<Message>;

    fn set_messages(&self, messages: Vec<Message>);

    fn history_len(&self) -> usize;

    fn permission_context(&self) -> PermissionContext;
}

/// Resolves to the first text block of the response.
pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, AgentError>> + Send + 'a>>;

/// One-shot, non-streaming LLM call.
pub trait CompletionClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        model: &'a str,
        system: &'a str,
        messages: Vec<Message>,
        max_tokens: u32,
    ) -> CompletionFuture<'a>;
}

/// Source of MCP server status lines for `/mcp`.
pub trait McpStatusSource: Send + Sync {
    fn servers(&self) -> Vec<McpServerStatus>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerStatus {
    pub name: String,
    pub connected: bool,
    pub tool_count: usize,
}

/// No servers configured.
#[derive(Debug, Default)]
pub struct NoMcpServers;

impl McpStatusSource for NoMcpServers {
    fn servers(&self) -> Vec<McpServerStatus> {
        Vec::new()
    }
}
