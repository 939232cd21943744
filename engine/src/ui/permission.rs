//! Tool permission prompt.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::rendezvous::PermissionRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionChoice {
    Allow,
    Deny,
    AlwaysAllow,
    /// Deny and cancel the running turn.
    Cancel,
}

#[derive(Debug)]
pub struct PermissionPrompt {
    pub request: PermissionRequest,
}

impl PermissionPrompt {
    #[must_use]
    pub fn new(request: PermissionRequest) -> Self {
        Self { request }
    }

    /// "Always allow" is offered only when the request carries a rule.
    #[must_use]
    pub fn can_always_allow(&self) -> bool {
        !self.request.suggestions.is_empty()
    }

    #[must_use]
    pub fn handle_key(&self, key: KeyEvent) -> Option<PermissionChoice> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return (key.code == KeyCode::Char('c')).then_some(PermissionChoice::Cancel);
        }
        match key.code {
            KeyCode::Char('y' | 'Y') => Some(PermissionChoice::Allow),
            KeyCode::Char('n' | 'N') | KeyCode::Esc => Some(PermissionChoice::Deny),
            KeyCode::Char('a' | 'A') if self.can_always_allow() => Some(PermissionChoice::AlwaysAllow),
            _ => None,
        }
    }
}
