//! Resolved user settings.
//!
//! The raw TOML shape stays private in `tern-config`; the loader resolves it
//! into [`Settings`] at the parse boundary.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{raw}'; expected one of: {expected:?}")]
pub struct EnumParseError {
    kind: &'static str,
    raw: String,
    expected: &'static [&'static str],
}

impl EnumParseError {
    #[must_use]
    pub fn new(kind: &'static str, raw: impl Into<String>, expected: &'static [&'static str]) -> Self {
        Self {
            kind,
            raw: raw.into(),
            expected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    Plan,
    BypassPermissions,
}

impl PermissionMode {
    pub const ALL: [PermissionMode; 4] = [
        PermissionMode::Default,
        PermissionMode::AcceptEdits,
        PermissionMode::Plan,
        PermissionMode::BypassPermissions,
    ];

    const NAMES: &'static [&'static str] = &["default", "acceptEdits", "plan", "bypassPermissions"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::Plan => "plan",
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            PermissionMode::Default => "Default",
            PermissionMode::AcceptEdits => "Accept edits",
            PermissionMode::Plan => "Plan mode",
            PermissionMode::BypassPermissions => "Bypass permissions",
        }
    }

    /// Accepts the canonical camelCase name or any case/`-`/`_` variant of it.
    pub fn parse(raw: &str) -> Result<Self, EnumParseError> {
        let folded: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().to_ascii_lowercase() == folded)
            .ok_or_else(|| EnumParseError::new("permission mode", raw, Self::NAMES))
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const THEMES: &[&str] = &[
    "dark",
    "light",
    "dark-daltonized",
    "light-daltonized",
    "dark-ansi",
    "light-ansi",
];

/// `{type = "command", command = "..."}` from the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLineConfig {
    pub kind: String,
    pub command: String,
}

impl StatusLineConfig {
    #[must_use]
    pub fn is_command(&self) -> bool {
        self.kind == "command" && !self.command.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub model: Option<String>,
    pub fast_mode: bool,
    pub theme: String,
    pub permission_mode: PermissionMode,
    pub vim_mode: bool,
    pub verbose: bool,
    pub auto_compact: bool,
    pub prompt_suggestions: bool,
    pub show_turn_duration: bool,
    pub status_line: Option<StatusLineConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: None,
            fast_mode: false,
            theme: "dark".to_string(),
            permission_mode: PermissionMode::Default,
            vim_mode: false,
            verbose: false,
            auto_compact: true,
            prompt_suggestions: true,
            show_turn_duration: false,
            status_line: None,
        }
    }
}

/// A single persisted settings value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Str(String),
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}
