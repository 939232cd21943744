//! Modal modes: rendezvous prompts, pickers, panels.
//!
//! Every modal has a close path back to `Input` (or to `Streaming` for the
//! rendezvous prompts), so no key sequence can leave the loop stuck.

use std::mem;
use std::sync::Arc;

use crossterm::event::KeyEvent;

use tern_types::{PermissionVerdict, SettingValue};

use super::{Deferred, Mode, ModeState, Model};
use crate::effect::Effect;
use crate::rendezvous::{AskUserRequest, PermissionRequest};
use crate::scrollback::ScrollbackEntry;
use crate::settings_store::persist_quietly;
use crate::ui::{
    AskOutcome, AskUserPrompt, DiffOutcome, HelpOutcome, PanelOutcome, PermissionChoice,
    PermissionPrompt, PickerOutcome, ResumeOutcome, help_lines,
};

impl Model {
    pub(super) fn on_permission_request(&mut self, request: PermissionRequest) -> Vec<Effect> {
        match self.mode() {
            Mode::Streaming => {
                tracing::debug!(tool = %request.tool, "permission requested");
                // Text streamed so far belongs above the prompt.
                let effects = self.flush_text();
                self.mode = ModeState::Permission(PermissionPrompt::new(request));
                return effects;
            }
            Mode::Permission | Mode::AskUser => {
                self.deferred.push_back(Deferred::Permission(request));
            }
            mode => {
                tracing::debug!(?mode, tool = %request.tool, "permission request outside a turn; denied");
            }
        }
        Vec::new()
    }

    pub(super) fn on_ask_user_request(&mut self, request: AskUserRequest) -> Vec<Effect> {
        match self.mode() {
            Mode::Streaming => {
                let effects = self.flush_text();
                self.mode = ModeState::AskUser(AskUserPrompt::new(request));
                return effects;
            }
            Mode::Permission | Mode::AskUser => {
                self.deferred.push_back(Deferred::AskUser(request));
            }
            mode => {
                tracing::debug!(?mode, "question outside a turn; answered empty");
            }
        }
        Vec::new()
    }

    /// Back to `Streaming`, presenting the next deferred request if any.
    fn resume_streaming(&mut self) {
        self.mode = match self.deferred.pop_front() {
            Some(Deferred::Permission(request)) => ModeState::Permission(PermissionPrompt::new(request)),
            Some(Deferred::AskUser(request)) => ModeState::AskUser(AskUserPrompt::new(request)),
            None => ModeState::Streaming,
        };
    }

    pub(super) fn modal_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match &mut self.mode {
            ModeState::Permission(prompt) => match prompt.handle_key(key) {
                Some(choice) => self.resolve_permission(choice),
                None => Vec::new(),
            },
            ModeState::AskUser(prompt) => match prompt.handle_key(key) {
                AskOutcome::Continue => Vec::new(),
                outcome => self.resolve_ask_user(outcome),
            },
            ModeState::Resume(picker) => match picker.handle_key(key) {
                ResumeOutcome::Continue => Vec::new(),
                ResumeOutcome::Cancel => self.enter_input(),
                ResumeOutcome::Select(session) => {
                    let mut effects = self.adopt_session(session);
                    effects.extend(self.enter_input());
                    effects
                }
            },
            ModeState::ModelPicker(picker) => match picker.handle_key(key) {
                PickerOutcome::Continue => Vec::new(),
                PickerOutcome::Cancel => self.enter_input(),
                PickerOutcome::Select(info) => {
                    let mut effects = self.switch_model(info.id, info.display_name);
                    effects.extend(self.enter_input());
                    effects
                }
            },
            ModeState::Diff(viewer) => match viewer.handle_key(key) {
                DiffOutcome::Continue => Vec::new(),
                DiffOutcome::Close => self.enter_input(),
            },
            ModeState::Config(panel) => match panel.handle_key(key, self.height) {
                PanelOutcome::Continue => Vec::new(),
                PanelOutcome::Close => self.close_config(),
            },
            ModeState::Help(screen) => {
                let lines = help_lines(screen.tab, &self.registry).len();
                match screen.handle_key(key, lines, self.height) {
                    HelpOutcome::Continue => Vec::new(),
                    HelpOutcome::Close => self.enter_input(),
                }
            }
            ModeState::Input | ModeState::Streaming => Vec::new(),
        }
    }

    fn resolve_permission(&mut self, choice: PermissionChoice) -> Vec<Effect> {
        let ModeState::Permission(prompt) = mem::replace(&mut self.mode, ModeState::Streaming)
        else {
            return Vec::new();
        };
        let verdict = match choice {
            PermissionChoice::Allow => PermissionVerdict::Allow,
            PermissionChoice::AlwaysAllow => PermissionVerdict::AlwaysAllow,
            PermissionChoice::Deny | PermissionChoice::Cancel => PermissionVerdict::Deny,
        };
        let tool = prompt.request.tool.clone();
        prompt.request.respond.send(verdict);

        let mut effects = vec![Effect::Print(ScrollbackEntry::PermissionOutcome { tool, verdict })];
        if choice == PermissionChoice::Cancel {
            effects.extend(self.cancel_turn());
        }
        self.resume_streaming();
        effects
    }

    fn resolve_ask_user(&mut self, outcome: AskOutcome) -> Vec<Effect> {
        let ModeState::AskUser(prompt) = mem::replace(&mut self.mode, ModeState::Streaming)
        else {
            return Vec::new();
        };
        let summary = prompt.finish();
        let mut effects = Vec::new();
        if !summary.is_empty() {
            effects.push(Effect::Print(ScrollbackEntry::AskUserSummary(summary)));
        }
        if outcome == AskOutcome::Cancelled {
            effects.extend(self.cancel_turn());
        }
        self.resume_streaming();
        effects
    }

    /// Makes `id` the active model and persists it.
    pub(crate) fn switch_model(&mut self, id: &str, display_name: &str) -> Vec<Effect> {
        self.model_name = id.to_string();
        self.resolved_model_id = None;
        self.pre_fast_model = None;
        self.settings.model = Some(id.to_string());
        self.session.with(|s| s.model = id.to_string());

        let agent = Arc::clone(&self.deps.agent);
        let model = id.to_string();
        vec![
            Effect::call(move || agent.set_model(&model)),
            persist_quietly(&self.deps.settings_store, "model", SettingValue::from(id)),
            Effect::info(format!("Set model to {display_name}")),
        ]
    }

    fn close_config(&mut self) -> Vec<Effect> {
        let ModeState::Config(panel) = mem::replace(&mut self.mode, ModeState::Input) else {
            return Vec::new();
        };
        let changes = panel.finish();
        let mut effects = Vec::new();

        let fast_mode = changes.settings.fast_mode;
        let permission_mode = changes.settings.permission_mode;
        if changes.settings.vim_mode != self.settings.vim_mode {
            self.input.set_vim(changes.settings.vim_mode);
        }
        self.settings = changes.settings;
        if fast_mode != self.fast_mode {
            effects.extend(self.apply_fast_mode(fast_mode));
        }
        let agent = Arc::clone(&self.deps.agent);
        effects.push(Effect::call(move || agent.set_permission_mode(permission_mode)));

        if changes.summary.is_empty() {
            effects.push(Effect::dim("Config dialog dismissed"));
        } else {
            effects.extend(changes.summary.into_iter().map(Effect::info));
        }
        for (key, value) in changes.persist {
            effects.push(persist_quietly(&self.deps.settings_store, key, value));
        }
        effects.extend(self.enter_input());
        effects
    }
}
