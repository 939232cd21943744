//! Worker-to-loop requests that block the worker until the user answers.
//!
//! The worker builds a request carrying a single-shot [`Responder`], posts it
//! into the mailbox, and waits on the receiving end or on cancellation. The
//! loop parks the request and writes exactly one answer. A responder that is
//! dropped unanswered writes its fallback (deny, or empty answers), so no
//! request can leave the worker hanging.

use std::fmt;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use tern_types::{Answers, PermissionVerdict, Question};

use crate::agent::{AgentError, AskUserFuture, AskUserHandler, PermissionFuture, PermissionHandler};
use crate::effect::Mailbox;
use crate::msg::Msg;
use crate::summary::summarize_tool;

/// Single-shot answer channel. Writes its fallback if dropped unanswered.
pub struct Responder<T: Send> {
    tx: Option<oneshot::Sender<T>>,
    fallback: Option<T>,
}

impl<T: Send> Responder<T> {
    #[must_use]
    pub fn channel(fallback: T) -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Some(tx),
                fallback: Some(fallback),
            },
            rx,
        )
    }

    /// Writes `value`, consuming the responder.
    pub fn send(mut self, value: T) {
        self.fallback = None;
        if let Some(tx) = self.tx.take() {
            // The worker may have given up after cancellation.
            let _ = tx.send(value);
        }
    }
}

impl<T: Send> Drop for Responder<T> {
    fn drop(&mut self) {
        if let (Some(tx), Some(fallback)) = (self.tx.take(), self.fallback.take()) {
            let _ = tx.send(fallback);
        }
    }
}

impl<T: Send> fmt::Debug for Responder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("answered", &self.tx.is_none())
            .finish()
    }
}

#[derive(Debug)]
pub struct PermissionRequest {
    pub tool: String,
    pub input: Value,
    pub summary: String,
    /// Rules that "always allow" would add. Empty disables that choice.
    pub suggestions: Vec<String>,
    pub respond: Responder<PermissionVerdict>,
}

impl PermissionRequest {
    #[must_use]
    pub fn new(tool: &str, input: Value) -> (Self, oneshot::Receiver<PermissionVerdict>) {
        let (respond, rx) = Responder::channel(PermissionVerdict::Deny);
        let request = Self {
            tool: tool.to_string(),
            summary: summarize_tool(tool, &input),
            suggestions: permission_suggestions(tool, &input),
            input,
            respond,
        };
        (request, rx)
    }
}

#[derive(Debug)]
pub struct AskUserRequest {
    pub questions: Vec<Question>,
    pub respond: Responder<Answers>,
}

impl AskUserRequest {
    #[must_use]
    pub fn new(questions: Vec<Question>) -> (Self, oneshot::Receiver<Answers>) {
        let (respond, rx) = Responder::channel(Answers::new());
        (Self { questions, respond }, rx)
    }
}

/// Always-allow rules offered for a tool call.
///
/// Shell commands are scoped to their first word; compound commands get no
/// suggestion since a prefix rule would cover more than the user saw.
#[must_use]
pub fn permission_suggestions(tool: &str, input: &Value) -> Vec<String> {
    if tool != "Bash" {
        return vec![tool.to_string()];
    }
    let command = input.get("command").and_then(Value::as_str).unwrap_or_default();
    if ["&&", "||", "|", ";"].iter().any(|sep| command.contains(sep)) {
        return Vec::new();
    }
    match command.split_whitespace().next() {
        Some(first) => vec![format!("Bash({first}:*)")],
        None => Vec::new(),
    }
}

/// Permission handler that routes requests through the loop's mailbox.
#[derive(Debug, Clone)]
pub struct MailboxPermissionHandler {
    mailbox: Mailbox,
}

impl MailboxPermissionHandler {
    #[must_use]
    pub fn new(mailbox: Mailbox) -> Self {
        Self { mailbox }
    }
}

impl PermissionHandler for MailboxPermissionHandler {
    fn request_permission<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        tool: &'a str,
        input: &'a Value,
    ) -> PermissionFuture<'a> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            let (request, rx) = PermissionRequest::new(tool, input.clone());
            if !self.mailbox.post(Msg::PermissionRequest(request)) {
                return Ok(PermissionVerdict::Deny);
            }
            tokio::select! {
                () = cancel.cancelled() => Err(AgentError::Cancelled),
                verdict = rx => {
                    let verdict = verdict.unwrap_or(PermissionVerdict::Deny);
                    tracing::info!(tool, ?verdict, "permission answered");
                    Ok(verdict)
                }
            }
        })
    }
}

/// Ask-user handler that routes questions through the loop's mailbox.
#[derive(Debug, Clone)]
pub struct MailboxAskUserHandler {
    mailbox: Mailbox,
}

impl MailboxAskUserHandler {
    #[must_use]
    pub fn new(mailbox: Mailbox) -> Self {
        Self { mailbox }
    }
}

impl AskUserHandler for MailboxAskUserHandler {
    fn ask<'a>(&'a self, cancel: &'a CancellationToken, questions: Vec<Question>) -> AskUserFuture<'a> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            let (request, rx) = AskUserRequest::new(questions);
            if !self.mailbox.post(Msg::AskUserRequest(request)) {
                return Ok(Answers::new());
            }
            tokio::select! {
                () = cancel.cancelled() => Err(AgentError::Cancelled),
                answers = rx => Ok(answers.unwrap_or_default()),
            }
        })
    }
}
