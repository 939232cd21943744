//! Deferred actions returned by `update`.
//!
//! `update` never performs IO. It returns a list of [`Effect`]s which the
//! runtime executes in order; anything that produces a result posts it back
//! through the [`Mailbox`] as a [`Msg`].

use std::fmt;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::msg::Msg;
use crate::scrollback::ScrollbackEntry;

pub type TaskFuture = Pin<Box<dyn Future<Output = Option<Msg>> + Send + 'static>>;

pub type ExitCallback = Box<dyn FnOnce(io::Result<ExitStatus>) -> Msg + Send>;

/// An external process that takes over the terminal until it exits.
pub struct ExecRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub on_exit: ExitCallback,
}

pub enum Effect {
    /// Append an entry to the scrollback above the live region.
    Print(ScrollbackEntry),
    Quit,
    /// Post `msg` after `after` elapses.
    Schedule { after: Duration, msg: Msg },
    Exec(ExecRequest),
    /// Spawn a future; its message, if any, is posted when it completes.
    Task(TaskFuture),
    /// Run a short synchronous worker call before the next message is
    /// handled. Calls in one batch run in order.
    Call(Box<dyn FnOnce() -> Option<Msg> + Send>),
}

impl Effect {
    pub fn task<F>(future: F) -> Self
    where
        F: Future<Output = Option<Msg>> + Send + 'static,
    {
        Effect::Task(Box::pin(future))
    }

    pub fn call<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Effect::Call(Box::new(move || {
            f();
            None
        }))
    }

    #[must_use]
    pub fn schedule(after: Duration, msg: Msg) -> Self {
        Effect::Schedule { after, msg }
    }

    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Effect::Print(ScrollbackEntry::Info(text.into()))
    }

    #[must_use]
    pub fn dim(text: impl Into<String>) -> Self {
        Effect::Print(ScrollbackEntry::Dim(text.into()))
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Effect::Print(ScrollbackEntry::Error(text.into()))
    }

    #[must_use]
    pub fn warning(text: impl Into<String>) -> Self {
        Effect::Print(ScrollbackEntry::Warning(text.into()))
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Print(entry) => f.debug_tuple("Print").field(entry).finish(),
            Effect::Quit => f.write_str("Quit"),
            Effect::Schedule { after, msg } => f
                .debug_struct("Schedule")
                .field("after", after)
                .field("msg", msg)
                .finish(),
            Effect::Exec(req) => f
                .debug_struct("Exec")
                .field("program", &req.program)
                .field("args", &req.args)
                .finish_non_exhaustive(),
            Effect::Task(_) => f.write_str("Task(..)"),
            Effect::Call(_) => f.write_str("Call(..)"),
        }
    }
}

/// Non-blocking handle for posting messages into the event loop.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::UnboundedSender<Msg>,
}

impl Mailbox {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Msg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Posts `msg`. Returns `false` once the loop has shut down.
    pub fn post(&self, msg: Msg) -> bool {
        self.tx.send(msg).is_ok()
    }
}
