//! Working-tree diff summary handed to the diff viewer.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub files_count: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffFile {
    pub path: String,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub is_binary: bool,
    pub is_large_file: bool,
    pub is_truncated: bool,
    pub is_untracked: bool,
}

/// One `@@` hunk. `lines` keep their leading `+`, `-` or space marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
    pub lines: Vec<String>,
}

impl DiffHunk {
    #[must_use]
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_lines, self.new_start, self.new_lines
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffData {
    pub stats: DiffStats,
    pub files: Vec<DiffFile>,
    pub hunks: BTreeMap<String, Vec<DiffHunk>>,
    pub error_msg: Option<String>,
}

impl DiffData {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_msg: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
