//! Multi-line text input with grapheme-aware cursor movement.
//!
//! The editor owns the draft text, the cursor (a grapheme index), focus, the
//! placeholder shown when empty, and cursor blink state. Key handling returns
//! whether the key was consumed so callers can fall through to their own
//! bindings.
//!
//! With vim keybindings on, the editor starts in insert mode; `Esc` switches
//! to normal mode where letters are motions and edits instead of text.

use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_segmentation::UnicodeSegmentation;

use crate::effect::Effect;
use crate::msg::Msg;

pub const BLINK_INTERVAL: Duration = Duration::from_millis(530);

#[derive(Debug, Clone)]
pub struct TextInput {
    text: String,
    cursor: usize,
    focused: bool,
    placeholder: String,
    width: u16,
    cursor_visible: bool,
    blink_generation: u64,
    vim: bool,
    normal: bool,
}

impl Default for TextInput {
    fn default() -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            focused: true,
            placeholder: String::new(),
            width: 80,
            cursor_visible: true,
            blink_generation: 0,
            vim: false,
            normal: false,
        }
    }
}

impl TextInput {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    #[must_use]
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[must_use]
    pub fn cursor_visible(&self) -> bool {
        self.focused && self.cursor_visible
    }

    /// In vim normal mode.
    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.vim && self.normal
    }

    /// Turns vim keybindings on or off, starting in insert mode.
    pub fn set_vim(&mut self, enabled: bool) {
        self.vim = enabled;
        self.normal = false;
    }

    /// Leaves insert mode. Returns `false` when vim keybindings are off or
    /// the editor is already in normal mode.
    pub fn enter_normal(&mut self) -> bool {
        if !self.vim || self.normal {
            return false;
        }
        self.normal = true;
        if self.cursor > self.line_start() {
            self.move_left();
        }
        true
    }

    pub fn set_width(&mut self, width: u16) {
        self.width = width.max(1);
    }

    pub fn set_placeholder(&mut self, placeholder: impl Into<String>) {
        self.placeholder = placeholder.into();
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    /// Focuses the editor and returns the effect that starts the blink timer.
    pub fn focus(&mut self) -> Effect {
        self.focused = true;
        self.cursor_visible = true;
        self.blink()
    }

    /// Schedules the next blink for the current generation.
    pub fn blink(&mut self) -> Effect {
        self.blink_generation += 1;
        Effect::schedule(BLINK_INTERVAL, Msg::Blink(self.blink_generation))
    }

    /// Toggles the cursor if `generation` is current. Stale ticks are dropped.
    pub fn on_blink(&mut self, generation: u64) -> Option<Effect> {
        if generation != self.blink_generation || !self.focused {
            return None;
        }
        self.cursor_visible = !self.cursor_visible;
        Some(Effect::schedule(BLINK_INTERVAL, Msg::Blink(generation)))
    }

    pub fn take_text(&mut self) -> String {
        self.cursor = 0;
        self.normal = false;
        std::mem::take(&mut self.text)
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.grapheme_count();
    }

    pub fn insert_str(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let index = self.byte_index();
        self.text.insert_str(index, text);
        let inserted = text.graphemes(true).count();
        self.cursor = self.clamp_cursor(self.cursor.saturating_add(inserted));
    }

    pub fn insert_char(&mut self, c: char) {
        let index = self.byte_index();
        self.text.insert(index, c);
        self.cursor = self.clamp_cursor(self.cursor.saturating_add(1));
    }

    /// Applies an editing key. Returns `false` for keys the editor ignores.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        self.cursor_visible = true;
        if self.is_normal() {
            return self.normal_key(key);
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        match key.code {
            KeyCode::Char('a') if ctrl => self.move_line_start(),
            KeyCode::Char('e') if ctrl => self.move_line_end(),
            KeyCode::Char('b') if ctrl => self.move_left(),
            KeyCode::Char('f') if ctrl => self.move_right(),
            KeyCode::Char('w') if ctrl => self.delete_word_backwards(),
            KeyCode::Char('u') if ctrl => self.delete_to_line_start(),
            KeyCode::Char('k') if ctrl => self.delete_to_line_end(),
            KeyCode::Char('j') if ctrl => self.insert_char('\n'),
            KeyCode::Char(_) if ctrl => return false,
            KeyCode::Char(c) => self.insert_char(c),
            KeyCode::Enter if alt || key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.insert_char('\n');
            }
            KeyCode::Backspace if alt => self.delete_word_backwards(),
            KeyCode::Backspace => self.delete_char(),
            KeyCode::Delete => self.delete_char_forward(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.move_line_start(),
            KeyCode::End => self.move_line_end(),
            _ => return false,
        }
        true
    }

    /// Normal-mode motions and edits. Unbound letters are swallowed.
    fn normal_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return false;
        }
        match key.code {
            KeyCode::Char('h') | KeyCode::Left | KeyCode::Backspace => self.move_left(),
            KeyCode::Char('l') | KeyCode::Right => self.move_right(),
            KeyCode::Char('0') | KeyCode::Home => self.move_line_start(),
            KeyCode::Char('$') | KeyCode::End => self.move_line_end(),
            KeyCode::Char('w') => self.move_word_forward(),
            KeyCode::Char('b') => self.move_word_backward(),
            KeyCode::Char('x') | KeyCode::Delete => self.delete_char_forward(),
            KeyCode::Char('D') => self.delete_to_line_end(),
            KeyCode::Char('i') => self.normal = false,
            KeyCode::Char('a') => {
                self.move_right();
                self.normal = false;
            }
            KeyCode::Char('I') => {
                self.move_line_start();
                self.normal = false;
            }
            KeyCode::Char('A') => {
                self.move_line_end();
                self.normal = false;
            }
            KeyCode::Char(_) => {}
            _ => return false,
        }
        true
    }

    fn move_word_forward(&mut self) {
        let end = self.grapheme_count();
        while self.cursor < end && !self.grapheme_is_whitespace(self.cursor) {
            self.cursor += 1;
        }
        while self.cursor < end && self.grapheme_is_whitespace(self.cursor) {
            self.cursor += 1;
        }
    }

    fn move_word_backward(&mut self) {
        while self.cursor > 0 && self.grapheme_is_whitespace(self.cursor - 1) {
            self.cursor -= 1;
        }
        while self.cursor > 0 && !self.grapheme_is_whitespace(self.cursor - 1) {
            self.cursor -= 1;
        }
    }

    fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_right(&mut self) {
        self.cursor = self.clamp_cursor(self.cursor.saturating_add(1));
    }

    fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let start = self.byte_index_at(self.cursor - 1);
        let end = self.byte_index_at(self.cursor);
        self.text.replace_range(start..end, "");
        self.move_left();
    }

    fn delete_char_forward(&mut self) {
        if self.cursor >= self.grapheme_count() {
            return;
        }
        let start = self.byte_index_at(self.cursor);
        let end = self.byte_index_at(self.cursor + 1);
        self.text.replace_range(start..end, "");
    }

    fn delete_word_backwards(&mut self) {
        while self.cursor > 0 && self.grapheme_is_whitespace(self.cursor - 1) {
            self.delete_char();
        }
        while self.cursor > 0 && !self.grapheme_is_whitespace(self.cursor - 1) {
            self.delete_char();
        }
    }

    fn delete_to_line_start(&mut self) {
        let start = self.line_start();
        while self.cursor > start {
            self.delete_char();
        }
    }

    fn delete_to_line_end(&mut self) {
        let end = self.line_end();
        let start_byte = self.byte_index();
        let end_byte = self.byte_index_at(end);
        self.text.replace_range(start_byte..end_byte, "");
    }

    fn move_line_start(&mut self) {
        self.cursor = self.line_start();
    }

    fn move_line_end(&mut self) {
        self.cursor = self.line_end();
    }

    fn line_start(&self) -> usize {
        let graphemes: Vec<&str> = self.text.graphemes(true).collect();
        let mut idx = self.cursor.min(graphemes.len());
        while idx > 0 && graphemes[idx - 1] != "\n" {
            idx -= 1;
        }
        idx
    }

    fn line_end(&self) -> usize {
        let graphemes: Vec<&str> = self.text.graphemes(true).collect();
        let mut idx = self.cursor.min(graphemes.len());
        while idx < graphemes.len() && graphemes[idx] != "\n" {
            idx += 1;
        }
        idx
    }

    #[must_use]
    pub fn grapheme_count(&self) -> usize {
        self.text.graphemes(true).count()
    }

    fn grapheme_is_whitespace(&self, index: usize) -> bool {
        self.text
            .graphemes(true)
            .nth(index)
            .is_some_and(|g| g.chars().all(char::is_whitespace))
    }

    #[must_use]
    pub fn byte_index(&self) -> usize {
        self.byte_index_at(self.cursor)
    }

    fn byte_index_at(&self, grapheme_index: usize) -> usize {
        self.text
            .grapheme_indices(true)
            .nth(grapheme_index)
            .map_or(self.text.len(), |(i, _)| i)
    }

    fn clamp_cursor(&self, pos: usize) -> usize {
        pos.min(self.grapheme_count())
    }
}
