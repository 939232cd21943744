//! Core domain types for tern.
//!
//! This crate contains pure domain types with no IO and no async. The engine,
//! the renderers, the provider client, and the configuration loader all share
//! these definitions.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod diff;
mod message;
mod model;
mod permission;
mod question;
mod session;
mod settings;
mod skill;
mod stream;
mod text;
mod todo;
mod usage;

pub use diff::{DiffData, DiffFile, DiffHunk, DiffStats};
pub use message::{ContentBlock, Message, Role};
pub use model::{
    DEFAULT_CONTEXT_WINDOW, DEFAULT_MODEL, FAST_MODEL, MODELS, ModelInfo, Pricing,
    context_window_for, display_name_for, lookup_model, resolve_model,
};
pub use permission::{PermissionContext, PermissionVerdict};
pub use question::{Answers, Question, QuestionOption};
pub use session::Session;
pub use settings::{
    EnumParseError, PermissionMode, SettingValue, Settings, StatusLineConfig, THEMES,
};
pub use skill::Skill;
pub use stream::{BlockStart, StreamHandler};
pub use text::{strip_control, truncate_to_fit, truncate_with_ellipsis};
pub use todo::{TodoItem, TodoStatus};
pub use usage::Usage;
