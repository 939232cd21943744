//! Session picker for `/resume`.

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use tern_types::{Session, truncate_with_ellipsis};

pub const RESUME_WINDOW: usize = 10;
const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    Continue,
    Cancel,
    Select(Session),
}

#[derive(Debug, Clone)]
pub struct ResumePicker {
    pub sessions: Vec<Session>,
    pub cursor: usize,
    pub offset: usize,
}

impl ResumePicker {
    #[must_use]
    pub fn new(sessions: Vec<Session>) -> Self {
        Self {
            sessions,
            cursor: 0,
            offset: 0,
        }
    }

    /// Sessions currently in the scroll window, with their absolute index.
    pub fn visible(&self) -> impl Iterator<Item = (usize, &Session)> {
        self.sessions
            .iter()
            .enumerate()
            .skip(self.offset)
            .take(RESUME_WINDOW)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ResumeOutcome {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return ResumeOutcome::Cancel;
        }
        match key.code {
            KeyCode::Esc => return ResumeOutcome::Cancel,
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < self.sessions.len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(session) = self.sessions.get(self.cursor) {
                    return ResumeOutcome::Select(session.clone());
                }
            }
            _ => {}
        }
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + RESUME_WINDOW {
            self.offset = self.cursor + 1 - RESUME_WINDOW;
        }
        ResumeOutcome::Continue
    }
}

/// `just now`, `5m ago`, `3h ago`, `2d ago`.
#[must_use]
pub fn relative_time(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    match secs {
        0..60 => "just now".to_string(),
        60..3_600 => format!("{}m ago", secs / 60),
        3_600..86_400 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

/// One picker row: relative time, message count, and first prompt.
#[must_use]
pub fn session_line(session: &Session, now: DateTime<Utc>) -> String {
    let count = session.messages.len();
    let noun = if count == 1 { "message" } else { "messages" };
    let preview = session
        .first_user_text()
        .map_or_else(|| "(no prompt)".to_string(), |t| truncate_with_ellipsis(&t, PREVIEW_CHARS));
    format!(
        "{} · {count} {noun} · {preview}",
        relative_time(now, session.updated_at)
    )
}
