//! Changed-line extraction for inline edit previews.

use similar::{ChangeTag, TextDiff};

/// A changed line of an edit, without its trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditLine {
    Removed(String),
    Added(String),
}

impl EditLine {
    /// The line as shown in scrollback: `- old` or `+ new`.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            EditLine::Removed(text) => format!("- {text}"),
            EditLine::Added(text) => format!("+ {text}"),
        }
    }
}

/// Lines removed and added when `old` is replaced by `new`.
///
/// Unchanged lines are dropped. Output keeps diff order, so a replaced line
/// shows its removal before its addition.
#[must_use]
pub fn edit_lines(old: &str, new: &str) -> Vec<EditLine> {
    TextDiff::from_lines(old, new)
        .iter_all_changes()
        .filter_map(|change| {
            let text = change.value().trim_end_matches(['\n', '\r']).to_string();
            match change.tag() {
                ChangeTag::Delete => Some(EditLine::Removed(text)),
                ChangeTag::Insert => Some(EditLine::Added(text)),
                ChangeTag::Equal => None,
            }
        })
        .collect()
}
