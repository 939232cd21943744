use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};

/// A saved conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub model: String,
    pub cwd: PathBuf,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn new(id: impl Into<String>, model: impl Into<String>, cwd: PathBuf, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            cwd,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Text of the first real user prompt, skipping tool-result turns.
    #[must_use]
    pub fn first_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User && !m.is_tool_result())
            .map(Message::text)
            .find(|text| !text.trim().is_empty())
    }
}
