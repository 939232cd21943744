//! Model picker opened by `/model` without arguments.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use tern_types::{MODELS, ModelInfo, lookup_model};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickerOutcome {
    Continue,
    Cancel,
    Select(&'static ModelInfo),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPicker {
    pub cursor: usize,
}

impl ModelPicker {
    /// Opens with the cursor on `current` when it is in the catalog.
    #[must_use]
    pub fn new(current: &str) -> Self {
        let cursor = lookup_model(current)
            .and_then(|info| MODELS.iter().position(|m| m.id == info.id))
            .unwrap_or(0);
        Self { cursor }
    }

    #[must_use]
    pub fn options() -> &'static [ModelInfo] {
        MODELS
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PickerOutcome {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return PickerOutcome::Cancel;
        }
        match key.code {
            KeyCode::Esc => PickerOutcome::Cancel,
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
                PickerOutcome::Continue
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < MODELS.len() {
                    self.cursor += 1;
                }
                PickerOutcome::Continue
            }
            KeyCode::Enter => MODELS
                .get(self.cursor)
                .map_or(PickerOutcome::Cancel, PickerOutcome::Select),
            KeyCode::Char(c) if c.is_ascii_digit() => {
                let n = c.to_digit(10).unwrap_or(0) as usize;
                match n.checked_sub(1).and_then(|i| MODELS.get(i)) {
                    Some(info) => PickerOutcome::Select(info),
                    None => PickerOutcome::Continue,
                }
            }
            _ => PickerOutcome::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use tern_types::MODELS;

    use super::{ModelPicker, PickerOutcome};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn opens_on_current_model() {
        let picker = ModelPicker::new("claude-haiku-4-5-20251001");
        assert_eq!(MODELS[picker.cursor].id, "claude-haiku-4-5");
    }

    #[test]
    fn unknown_model_opens_at_top() {
        assert_eq!(ModelPicker::new("gpt-x").cursor, 0);
    }

    #[test]
    fn enter_selects_cursor() {
        let mut picker = ModelPicker::new("claude-opus-4-5");
        picker.handle_key(key(KeyCode::Down));
        assert_eq!(
            picker.handle_key(key(KeyCode::Enter)),
            PickerOutcome::Select(&MODELS[1])
        );
    }

    #[test]
    fn digit_selects_directly() {
        let mut picker = ModelPicker::new("claude-opus-4-5");
        assert_eq!(
            picker.handle_key(key(KeyCode::Char('3'))),
            PickerOutcome::Select(&MODELS[2])
        );
        assert_eq!(picker.handle_key(key(KeyCode::Char('9'))), PickerOutcome::Continue);
        assert_eq!(picker.handle_key(key(KeyCode::Esc)), PickerOutcome::Cancel);
    }
}
