//! Messages delivered to the event loop.
//!
//! Everything the loop reacts to arrives as a [`Msg`]: terminal input from the
//! input pump, stream events from the worker's [`StreamSink`](crate::StreamSink),
//! rendezvous requests, and the results of effects it scheduled earlier.

use std::path::PathBuf;

use crossterm::event::KeyEvent;
use tern_types::{DiffData, Session, TodoItem, Usage};

use crate::agent::AgentError;
use crate::rendezvous::{AskUserRequest, PermissionRequest};

/// Block kind announced by `ContentBlockStart`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamBlock {
    Text,
    Thinking,
    ToolUse { name: String },
}

#[derive(Debug)]
pub enum Msg {
    /// First tick of the loop; submits the initial prompt if one was given.
    Init,
    WindowSize {
        width: i32,
        height: i32,
    },
    Key(KeyEvent),
    Paste(String),
    SubmitInput(String),

    MessageStart {
        usage: Usage,
        model: Option<String>,
    },
    ContentBlockStart {
        index: usize,
        block: StreamBlock,
    },
    TextDelta {
        index: usize,
        text: String,
    },
    InputJsonDelta {
        index: usize,
        json: String,
    },
    /// `name` and `input` are set only for tool-use blocks.
    ContentBlockStop {
        index: usize,
        name: Option<String>,
        input: Option<String>,
    },
    MessageDelta {
        stop_reason: Option<String>,
        usage: Option<Usage>,
    },
    MessageStop,
    StreamError(String),
    LoopDone {
        result: Result<(), AgentError>,
    },

    PermissionRequest(PermissionRequest),
    AskUserRequest(AskUserRequest),
    TodoUpdate(Vec<TodoItem>),
    DiffLoaded(DiffData),
    MemoryEditDone {
        path: PathBuf,
        error: Option<String>,
    },
    StatusLineUpdate(String),
    PromptSuggestionResult(Option<String>),
    SessionsLoaded(Result<Vec<Session>, String>),
    ContinueLoaded(Result<Option<Session>, String>),
    StoreWarning(String),

    CtrlCReset,
    SpinnerTick(u64),
    Blink(u64),
}

impl Msg {
    /// Stream events that only make sense while a turn is running.
    #[must_use]
    pub fn is_stream_event(&self) -> bool {
        matches!(
            self,
            Msg::MessageStart { .. }
                | Msg::ContentBlockStart { .. }
                | Msg::TextDelta { .. }
                | Msg::InputJsonDelta { .. }
                | Msg::ContentBlockStop { .. }
                | Msg::MessageDelta { .. }
                | Msg::MessageStop
                | Msg::StreamError(_)
                | Msg::LoopDone { .. }
        )
    }
}
