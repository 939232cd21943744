//! Diff viewer state: a file list and a per-file detail view.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use tern_types::{DiffData, DiffFile, DiffHunk};

/// Rows of the file list shown at once.
pub const FILE_LIST_WINDOW: usize = 5;
/// Rows of a file's hunks shown at once.
pub const DETAIL_ROWS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffViewMode {
    #[default]
    List,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOutcome {
    Continue,
    Close,
}

#[derive(Debug, Clone)]
pub struct DiffViewer {
    pub data: DiffData,
    pub selected: usize,
    pub view_mode: DiffViewMode,
    pub detail_scroll: usize,
}

impl DiffViewer {
    #[must_use]
    pub fn new(data: DiffData) -> Self {
        Self {
            data,
            selected: 0,
            view_mode: DiffViewMode::List,
            detail_scroll: 0,
        }
    }

    #[must_use]
    pub fn selected_file(&self) -> Option<&DiffFile> {
        self.data.files.get(self.selected)
    }

    #[must_use]
    pub fn selected_hunks(&self) -> &[DiffHunk] {
        self.selected_file()
            .and_then(|file| self.data.hunks.get(&file.path))
            .map_or(&[], Vec::as_slice)
    }

    /// Rows in the selected file's hunk body: one header per hunk, its
    /// lines, and a marker when the diff was cut short.
    #[must_use]
    pub fn detail_len(&self) -> usize {
        let hunks: usize = self
            .selected_hunks()
            .iter()
            .map(|hunk| 1 + hunk.lines.len())
            .sum();
        let truncated = self.selected_file().is_some_and(|file| file.is_truncated);
        hunks + usize::from(truncated)
    }

    /// `(start, end)` of the file-list window, keeping the selection visible.
    #[must_use]
    pub fn list_window(&self) -> (usize, usize) {
        let len = self.data.files.len();
        let start = (self.selected + 1).saturating_sub(FILE_LIST_WINDOW);
        (start, (start + FILE_LIST_WINDOW).min(len))
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> DiffOutcome {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return DiffOutcome::Close;
        }
        match (self.view_mode, key.code) {
            (_, KeyCode::Esc | KeyCode::Char('q')) => return DiffOutcome::Close,
            (DiffViewMode::List, KeyCode::Up | KeyCode::Char('k')) => {
                self.selected = self.selected.saturating_sub(1);
            }
            (DiffViewMode::List, KeyCode::Down | KeyCode::Char('j')) => {
                if self.selected + 1 < self.data.files.len() {
                    self.selected += 1;
                }
            }
            (DiffViewMode::List, KeyCode::Enter | KeyCode::Right) => {
                if self.selected_file().is_some() {
                    self.view_mode = DiffViewMode::Detail;
                    self.detail_scroll = 0;
                }
            }
            (DiffViewMode::Detail, KeyCode::Left | KeyCode::Backspace) => {
                self.view_mode = DiffViewMode::List;
            }
            (DiffViewMode::Detail, KeyCode::Up | KeyCode::Char('k')) => {
                self.detail_scroll = self.detail_scroll.saturating_sub(1);
            }
            (DiffViewMode::Detail, KeyCode::Down | KeyCode::Char('j')) => {
                if self.detail_scroll < self.detail_len().saturating_sub(DETAIL_ROWS) {
                    self.detail_scroll += 1;
                }
            }
            _ => {}
        }
        DiffOutcome::Continue
    }
}
