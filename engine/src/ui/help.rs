//! Tabbed help screen.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::commands::SlashRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HelpTab {
    #[default]
    General,
    Commands,
    CustomCommands,
}

impl HelpTab {
    pub const ALL: [HelpTab; 3] = [HelpTab::General, HelpTab::Commands, HelpTab::CustomCommands];

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            HelpTab::General => "general",
            HelpTab::Commands => "commands",
            HelpTab::CustomCommands => "custom-commands",
        }
    }

    fn index(self) -> usize {
        match self {
            HelpTab::General => 0,
            HelpTab::Commands => 1,
            HelpTab::CustomCommands => 2,
        }
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    #[must_use]
    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

const GENERAL: &[&str] = &[
    "tern works alongside you in the terminal: ask questions, request edits,",
    "and review what it did before it does it.",
    "",
    "Shortcuts",
    "  enter            send the message",
    "  shift+enter      insert a newline (also ctrl+j)",
    "  esc              clear the input, or drop the last queued message",
    "  ctrl+c           cancel the running turn; twice to quit",
    "  tab              complete a /command or accept the suggestion",
    "  ?                show this help",
    "",
    "While a turn is running, messages you send are queued and sent in order.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HelpScreen {
    pub tab: HelpTab,
    pub scroll: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpOutcome {
    Continue,
    Close,
}

/// Viewport rows available to the scrolling pane.
#[must_use]
pub fn help_viewport(term_height: u16) -> usize {
    usize::from(term_height).saturating_sub(8).max(1)
}

/// Body lines of `tab`.
#[must_use]
pub fn help_lines(tab: HelpTab, registry: &SlashRegistry) -> Vec<String> {
    match tab {
        HelpTab::General => GENERAL.iter().map(|l| (*l).to_string()).collect(),
        HelpTab::Commands => command_rows(registry.visible_commands().map(|c| (c.name.as_str(), c.description.as_str()))),
        HelpTab::CustomCommands => {
            let rows = command_rows(registry.skills().map(|c| (c.name.as_str(), c.description.as_str())));
            if rows.is_empty() {
                vec![
                    "No custom commands.".to_string(),
                    String::new(),
                    "Add Markdown files to ~/.tern/commands/ or ./.tern/commands/.".to_string(),
                ]
            } else {
                rows
            }
        }
    }
}

fn command_rows<'a>(commands: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<String> {
    let rows: Vec<(&str, &str)> = commands.collect();
    let width = rows.iter().map(|(name, _)| name.chars().count()).max().unwrap_or(0) + 1;
    rows.into_iter()
        .map(|(name, description)| format!("  /{name:<width$}  {description}"))
        .collect()
}

impl HelpScreen {
    pub fn handle_key(&mut self, key: KeyEvent, line_count: usize, term_height: u16) -> HelpOutcome {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return HelpOutcome::Close;
        }
        let viewport = help_viewport(term_height);
        let max_scroll = line_count.saturating_sub(viewport);
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return HelpOutcome::Close,
            KeyCode::Right | KeyCode::Tab => self.switch(self.tab.next()),
            KeyCode::Left | KeyCode::BackTab => self.switch(self.tab.prev()),
            KeyCode::Up | KeyCode::Char('k') => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.scroll = (self.scroll + 1).min(max_scroll),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(viewport),
            KeyCode::PageDown => self.scroll = (self.scroll + viewport).min(max_scroll),
            _ => {}
        }
        HelpOutcome::Continue
    }

    fn switch(&mut self, tab: HelpTab) {
        self.tab = tab;
        self.scroll = 0;
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use super::{HelpOutcome, HelpScreen, HelpTab, help_viewport};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn tabs_cycle_both_ways() {
        let mut help = HelpScreen::default();
        help.handle_key(key(KeyCode::BackTab), 0, 30);
        assert_eq!(help.tab, HelpTab::CustomCommands);
        help.handle_key(key(KeyCode::Tab), 0, 30);
        assert_eq!(help.tab, HelpTab::General);
        help.handle_key(key(KeyCode::Right), 0, 30);
        assert_eq!(help.tab, HelpTab::Commands);
    }

    #[test]
    fn scroll_is_clamped_to_content() {
        let mut help = HelpScreen::default();
        // 20 lines, viewport 12 -> at most 8 rows of scroll.
        assert_eq!(help_viewport(20), 12);
        for _ in 0..20 {
            help.handle_key(key(KeyCode::Char('j')), 20, 20);
        }
        assert_eq!(help.scroll, 8);
        help.handle_key(key(KeyCode::PageUp), 20, 20);
        assert_eq!(help.scroll, 0);
        help.handle_key(key(KeyCode::PageDown), 20, 20);
        assert_eq!(help.scroll, 8);
    }

    #[test]
    fn tiny_terminal_still_scrolls_one_line() {
        assert_eq!(help_viewport(3), 1);
    }

    #[test]
    fn switching_tab_resets_scroll() {
        let mut help = HelpScreen {
            tab: HelpTab::General,
            scroll: 4,
        };
        help.handle_key(key(KeyCode::Left), 40, 20);
        assert_eq!(help.scroll, 0);
        assert_eq!(help.handle_key(key(KeyCode::Esc), 40, 20), HelpOutcome::Close);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(help.handle_key(ctrl_c, 40, 20), HelpOutcome::Close);
    }
}
