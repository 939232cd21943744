//! Per-mode interaction state.
//!
//! These types own their cursors and buffers and turn key events into
//! outcomes; rendering lives in `tern-tui`.

mod ask_user;
mod config_panel;
mod diff_view;
mod help;
mod input;
mod model_select;
mod permission;
mod resume;
mod spinner;

pub use ask_user::{AskOutcome, AskUserPrompt, OTHER_LABEL};
pub use config_panel::{
    ConfigChanges, ConfigItem, ConfigPanel, ItemKind, PanelOutcome, viewport_height,
};
pub use diff_view::{DETAIL_ROWS, DiffOutcome, DiffViewMode, DiffViewer, FILE_LIST_WINDOW};
pub use help::{HelpOutcome, HelpScreen, HelpTab, help_lines, help_viewport};
pub use input::{BLINK_INTERVAL, TextInput};
pub use model_select::{ModelPicker, PickerOutcome};
pub use permission::{PermissionChoice, PermissionPrompt};
pub use resume::{RESUME_WINDOW, ResumeOutcome, ResumePicker, relative_time, session_line};
pub use spinner::{SPINNER_FRAMES, SPINNER_INTERVAL, Spinner};
