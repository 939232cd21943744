//! Entries appended to the terminal scrollback.
//!
//! The engine decides *what* is printed; the renderer in `tern-tui` decides how
//! each entry is styled. [`ScrollbackEntry::plain_text`] gives the unstyled
//! form used by logs and tests.

use tern_types::{PermissionVerdict, TodoItem};
use tern_utils::EditLine;

#[derive(Debug, Clone, PartialEq)]
pub enum ScrollbackEntry {
    /// Text the user submitted.
    UserEcho(String),
    /// Text accepted into the queue while a turn is running.
    Queued(String),
    /// Markdown source of a finished assistant text block.
    Assistant(String),
    ToolCall {
        name: String,
        summary: String,
        diff: Vec<EditLine>,
    },
    PermissionOutcome {
        tool: String,
        verdict: PermissionVerdict,
    },
    /// Question and chosen answer, one pair per question.
    AskUserSummary(Vec<(String, String)>),
    Todos(Vec<TodoItem>),
    Info(String),
    Dim(String),
    /// `(corrected /typed → /best)`
    Corrected { typed: String, corrected: String },
    Warning(String),
    Error(String),
}

impl ScrollbackEntry {
    #[must_use]
    pub fn plain_text(&self) -> String {
        match self {
            ScrollbackEntry::UserEcho(text) => format!("> {text}"),
            ScrollbackEntry::Queued(text) => format!("> {text} (queued)"),
            ScrollbackEntry::Assistant(text) | ScrollbackEntry::Info(text) | ScrollbackEntry::Dim(text) => {
                text.clone()
            }
            ScrollbackEntry::ToolCall {
                name,
                summary,
                diff,
            } => {
                let mut out = if summary.is_empty() {
                    format!("⏺ {name}")
                } else {
                    format!("⏺ {name} {summary}")
                };
                for line in diff {
                    out.push('\n');
                    out.push_str("  ");
                    out.push_str(&line.display());
                }
                out
            }
            ScrollbackEntry::PermissionOutcome { tool, verdict } => match verdict {
                PermissionVerdict::Allow => format!("{tool} ✓ allowed"),
                PermissionVerdict::AlwaysAllow => format!("{tool} ✓ always allowed"),
                PermissionVerdict::Deny => format!("{tool} ✗ denied"),
            },
            ScrollbackEntry::AskUserSummary(pairs) => pairs
                .iter()
                .map(|(question, answer)| format!("· {question} → {answer}"))
                .collect::<Vec<_>>()
                .join("\n"),
            ScrollbackEntry::Todos(items) => items
                .iter()
                .map(|item| format!("{} {}", item.status.glyph(), item.content))
                .collect::<Vec<_>>()
                .join("\n"),
            ScrollbackEntry::Corrected { typed, corrected } => {
                format!("(corrected /{typed} → /{corrected})")
            }
            ScrollbackEntry::Warning(text) => format!("Warning: {text}"),
            ScrollbackEntry::Error(text) => format!("Error: {text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use tern_types::{PermissionVerdict, TodoItem, TodoStatus};
    use tern_utils::EditLine;

    use super::ScrollbackEntry;

    #[test]
    fn tool_call_includes_edit_lines() {
        let entry = ScrollbackEntry::ToolCall {
            name: "FileEdit".into(),
            summary: "src/main.rs".into(),
            diff: vec![EditLine::Removed("a".into()), EditLine::Added("b".into())],
        };
        assert_eq!(entry.plain_text(), "⏺ FileEdit src/main.rs\n  - a\n  + b");
    }

    #[test]
    fn permission_outcome_names_tool() {
        let entry = ScrollbackEntry::PermissionOutcome {
            tool: "Bash".into(),
            verdict: PermissionVerdict::Deny,
        };
        assert_eq!(entry.plain_text(), "Bash ✗ denied");
    }

    #[test]
    fn todos_use_status_glyphs() {
        let entry = ScrollbackEntry::Todos(vec![
            TodoItem {
                content: "write tests".into(),
                status: TodoStatus::Completed,
                active_form: String::new(),
            },
            TodoItem {
                content: "ship".into(),
                status: TodoStatus::InProgress,
                active_form: "Shipping".into(),
            },
        ]);
        assert_eq!(entry.plain_text(), "☑ write tests\n◐ ship");
    }
}
