//! Interactive settings panel opened by `/config`.
//!
//! The panel edits a private copy of [`Settings`]. Closing it yields the
//! edited settings, the keys that changed (for persistence), and one
//! human-readable line per change.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use tern_types::{PermissionMode, SettingValue, Settings, THEMES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Bool,
    Enum(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigItem {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: ItemKind,
}

/// The settings fields the panel can change.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    fast_mode: bool,
    auto_compact: bool,
    prompt_suggestions: bool,
    verbose: bool,
    vim_mode: bool,
    show_turn_duration: bool,
    theme: String,
    permission_mode: PermissionMode,
}

impl Snapshot {
    fn of(settings: &Settings) -> Self {
        Self {
            fast_mode: settings.fast_mode,
            auto_compact: settings.auto_compact,
            prompt_suggestions: settings.prompt_suggestions,
            verbose: settings.verbose,
            vim_mode: settings.vim_mode,
            show_turn_duration: settings.show_turn_duration,
            theme: settings.theme.clone(),
            permission_mode: settings.permission_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelOutcome {
    Continue,
    Close,
}

/// Result of closing the panel.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChanges {
    pub settings: Settings,
    /// `(settings-file key, new value)` for every changed item.
    pub persist: Vec<(&'static str, SettingValue)>,
    pub summary: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConfigPanel {
    pub settings: Settings,
    initial: Snapshot,
    pub items: Vec<ConfigItem>,
    /// Index into `filtered`.
    pub cursor: usize,
    pub scroll_off: usize,
    pub search_query: String,
    pub searching: bool,
    pub filtered: Vec<usize>,
}

#[must_use]
pub fn viewport_height(term_height: u16) -> usize {
    usize::from(term_height).saturating_sub(15).max(5)
}

fn default_items() -> Vec<ConfigItem> {
    let bool_item = |id, label| ConfigItem {
        id,
        label,
        kind: ItemKind::Bool,
    };
    vec![
        bool_item("fastMode", "Fast mode"),
        bool_item("autoCompact", "Auto-compact"),
        bool_item("promptSuggestions", "Prompt suggestions"),
        bool_item("verbose", "Verbose output"),
        bool_item("vimMode", "Vim mode"),
        bool_item("showTurnDuration", "Show turn duration"),
        ConfigItem {
            id: "theme",
            label: "Theme",
            kind: ItemKind::Enum(THEMES.iter().map(|t| (*t).to_string()).collect()),
        },
        ConfigItem {
            id: "permissionMode",
            label: "Permission mode",
            kind: ItemKind::Enum(
                PermissionMode::ALL
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect(),
            ),
        },
    ]
}

impl ConfigPanel {
    #[must_use]
    pub fn open(settings: Settings) -> Self {
        let items = default_items();
        let filtered = (0..items.len()).collect();
        Self {
            initial: Snapshot::of(&settings),
            settings,
            items,
            cursor: 0,
            scroll_off: 0,
            search_query: String::new(),
            searching: false,
            filtered,
        }
    }

    /// The item under the cursor.
    #[must_use]
    pub fn selected(&self) -> Option<&ConfigItem> {
        self.filtered.get(self.cursor).map(|&i| &self.items[i])
    }

    /// Current value of `item` as shown in the panel.
    #[must_use]
    pub fn value_of(&self, id: &str) -> String {
        let on_off = |b: bool| if b { "on" } else { "off" }.to_string();
        match id {
            "fastMode" => on_off(self.settings.fast_mode),
            "autoCompact" => on_off(self.settings.auto_compact),
            "promptSuggestions" => on_off(self.settings.prompt_suggestions),
            "verbose" => on_off(self.settings.verbose),
            "vimMode" => on_off(self.settings.vim_mode),
            "showTurnDuration" => on_off(self.settings.show_turn_duration),
            "theme" => self.settings.theme.clone(),
            "permissionMode" => self.settings.permission_mode.as_str().to_string(),
            _ => String::new(),
        }
    }

    fn bool_mut(&mut self, id: &str) -> Option<&mut bool> {
        let s = &mut self.settings;
        match id {
            "fastMode" => Some(&mut s.fast_mode),
            "autoCompact" => Some(&mut s.auto_compact),
            "promptSuggestions" => Some(&mut s.prompt_suggestions),
            "verbose" => Some(&mut s.verbose),
            "vimMode" => Some(&mut s.vim_mode),
            "showTurnDuration" => Some(&mut s.show_turn_duration),
            _ => None,
        }
    }

    /// Flips the selected bool or advances the selected enum, wrapping.
    pub fn activate(&mut self) {
        let Some(item) = self.selected().cloned() else {
            return;
        };
        match item.kind {
            ItemKind::Bool => {
                if let Some(value) = self.bool_mut(item.id) {
                    *value = !*value;
                }
            }
            ItemKind::Enum(options) => {
                let current = self.value_of(item.id);
                let next = options
                    .iter()
                    .position(|o| *o == current)
                    .map_or(0, |i| (i + 1) % options.len());
                let Some(choice) = options.get(next) else {
                    return;
                };
                match item.id {
                    "theme" => self.settings.theme.clone_from(choice),
                    "permissionMode" => {
                        if let Ok(mode) = PermissionMode::parse(choice) {
                            self.settings.permission_mode = mode;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    pub fn move_up(&mut self, viewport: usize) {
        self.cursor = self.cursor.saturating_sub(1);
        self.ensure_visible(viewport);
    }

    pub fn move_down(&mut self, viewport: usize) {
        if self.cursor + 1 < self.filtered.len() {
            self.cursor += 1;
        }
        self.ensure_visible(viewport);
    }

    fn ensure_visible(&mut self, viewport: usize) {
        let viewport = viewport.max(1);
        if self.cursor < self.scroll_off {
            self.scroll_off = self.cursor;
        } else if self.cursor >= self.scroll_off + viewport {
            self.scroll_off = self.cursor + 1 - viewport;
        }
    }

    /// Items above and below the visible window.
    #[must_use]
    pub fn overflow(&self, viewport: usize) -> (usize, usize) {
        let above = self.scroll_off;
        let below = self
            .filtered
            .len()
            .saturating_sub(self.scroll_off + viewport.max(1));
        (above, below)
    }

    fn refilter(&mut self) {
        let query = self.search_query.to_lowercase();
        self.filtered = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                query.is_empty()
                    || item.label.to_lowercase().contains(&query)
                    || item.id.to_lowercase().contains(&query)
            })
            .map(|(i, _)| i)
            .collect();
        self.cursor = 0;
        self.scroll_off = 0;
    }

    pub fn handle_key(&mut self, key: KeyEvent, term_height: u16) -> PanelOutcome {
        let viewport = viewport_height(term_height);
        let ctrl_c =
            key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');
        if ctrl_c {
            return PanelOutcome::Close;
        }

        if self.searching {
            match key.code {
                KeyCode::Esc => {
                    self.search_query.clear();
                    self.searching = false;
                    self.refilter();
                }
                KeyCode::Enter => self.searching = false,
                KeyCode::Backspace => {
                    self.search_query.pop();
                    self.refilter();
                }
                KeyCode::Up => self.move_up(viewport),
                KeyCode::Down => self.move_down(viewport),
                KeyCode::Char(c) => {
                    self.search_query.push(c);
                    self.refilter();
                }
                _ => {}
            }
            return PanelOutcome::Continue;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return PanelOutcome::Close,
            KeyCode::Up | KeyCode::Char('k') => self.move_up(viewport),
            KeyCode::Down | KeyCode::Char('j') => self.move_down(viewport),
            KeyCode::Enter | KeyCode::Char(' ') => self.activate(),
            KeyCode::Char('/') => self.searching = true,
            _ => {}
        }
        PanelOutcome::Continue
    }

    /// Diffs the edited settings against the opening snapshot.
    #[must_use]
    pub fn finish(self) -> ConfigChanges {
        let now = Snapshot::of(&self.settings);
        let before = &self.initial;
        let mut persist = Vec::new();
        let mut summary = Vec::new();

        let bools = [
            ("fast_mode", "fast mode", before.fast_mode, now.fast_mode),
            ("auto_compact", "auto-compact", before.auto_compact, now.auto_compact),
            (
                "prompt_suggestions",
                "prompt suggestions",
                before.prompt_suggestions,
                now.prompt_suggestions,
            ),
            ("verbose", "verbose output", before.verbose, now.verbose),
            ("vim_mode", "vim mode", before.vim_mode, now.vim_mode),
            (
                "show_turn_duration",
                "turn duration",
                before.show_turn_duration,
                now.show_turn_duration,
            ),
        ];
        for (key, label, old, new) in bools {
            if old != new {
                persist.push((key, SettingValue::Bool(new)));
                summary.push(format!("{} {label}", if new { "Enabled" } else { "Disabled" }));
            }
        }
        if before.theme != now.theme {
            persist.push(("theme", SettingValue::Str(now.theme.clone())));
            summary.push(format!("Set theme to {}", now.theme));
        }
        if before.permission_mode != now.permission_mode {
            persist.push((
                "permission_mode",
                SettingValue::Str(now.permission_mode.as_str().to_string()),
            ));
            summary.push(format!("Set permission mode to {}", now.permission_mode));
        }

        ConfigChanges {
            settings: self.settings,
            persist,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use tern_types::{PermissionMode, SettingValue, Settings};

    use super::{ConfigPanel, PanelOutcome, viewport_height};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(panel: &mut ConfigPanel, code: KeyCode) -> PanelOutcome {
        panel.handle_key(key(code), 40)
    }

    #[test]
    fn open_then_close_changes_nothing() {
        let settings = Settings::default();
        let changes = ConfigPanel::open(settings.clone()).finish();
        assert!(changes.summary.is_empty());
        assert!(changes.persist.is_empty());
        assert_eq!(changes.settings, settings);
    }

    #[test]
    fn toggling_fast_mode_reports_change() {
        let mut panel = ConfigPanel::open(Settings::default());
        press(&mut panel, KeyCode::Enter);
        let changes = panel.finish();
        assert!(changes.settings.fast_mode);
        assert_eq!(changes.summary, vec!["Enabled fast mode"]);
        assert_eq!(changes.persist, vec![("fast_mode", SettingValue::Bool(true))]);
    }

    #[test]
    fn toggling_twice_is_no_change() {
        let mut panel = ConfigPanel::open(Settings::default());
        press(&mut panel, KeyCode::Char(' '));
        press(&mut panel, KeyCode::Char(' '));
        assert!(panel.finish().summary.is_empty());
    }

    #[test]
    fn enum_cycles_and_wraps() {
        let mut panel = ConfigPanel::open(Settings::default());
        press(&mut panel, KeyCode::Char('/'));
        for c in "perm".chars() {
            press(&mut panel, KeyCode::Char(c));
        }
        press(&mut panel, KeyCode::Enter);
        assert_eq!(panel.filtered.len(), 1);
        for _ in 0..PermissionMode::ALL.len() {
            press(&mut panel, KeyCode::Enter);
        }
        assert_eq!(panel.settings.permission_mode, PermissionMode::Default);
        press(&mut panel, KeyCode::Enter);
        let changes = panel.finish();
        assert_eq!(changes.summary, vec!["Set permission mode to acceptEdits"]);
    }

    #[test]
    fn theme_change_summary() {
        let mut panel = ConfigPanel::open(Settings::default());
        press(&mut panel, KeyCode::Char('/'));
        for c in "theme".chars() {
            press(&mut panel, KeyCode::Char(c));
        }
        press(&mut panel, KeyCode::Enter);
        press(&mut panel, KeyCode::Enter);
        assert_eq!(panel.finish().summary, vec!["Set theme to light"]);
    }

    #[test]
    fn search_escape_resets_filter() {
        let mut panel = ConfigPanel::open(Settings::default());
        let total = panel.items.len();
        press(&mut panel, KeyCode::Char('/'));
        press(&mut panel, KeyCode::Char('v'));
        press(&mut panel, KeyCode::Char('i'));
        assert_eq!(panel.filtered.len(), 1);
        press(&mut panel, KeyCode::Esc);
        assert!(!panel.searching);
        assert_eq!(panel.filtered.len(), total);
        assert_eq!(press(&mut panel, KeyCode::Esc), PanelOutcome::Close);
    }

    #[test]
    fn search_matches_ids_too() {
        let mut panel = ConfigPanel::open(Settings::default());
        press(&mut panel, KeyCode::Char('/'));
        for c in "showturn".chars() {
            press(&mut panel, KeyCode::Char(c));
        }
        assert_eq!(panel.selected().unwrap().id, "showTurnDuration");
    }

    #[test]
    fn cursor_scrolls_within_small_viewport() {
        let mut panel = ConfigPanel::open(Settings::default());
        assert_eq!(viewport_height(10), 5);
        for _ in 0..7 {
            panel.handle_key(key(KeyCode::Down), 10);
        }
        assert_eq!(panel.cursor, 7);
        assert_eq!(panel.scroll_off, 3);
        assert_eq!(panel.overflow(5), (3, 0));
        panel.handle_key(key(KeyCode::Char('k')), 10);
        assert_eq!(panel.cursor, 6);
    }

    #[test]
    fn q_and_ctrl_c_close() {
        let mut panel = ConfigPanel::open(Settings::default());
        assert_eq!(press(&mut panel, KeyCode::Char('q')), PanelOutcome::Close);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(panel.handle_key(ctrl_c, 40), PanelOutcome::Close);
    }
}
