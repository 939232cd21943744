//! Slash-command registry.
//!
//! Commands are looked up by exact name first. Misses fall back to the fuzzy
//! index for auto-correction, and Tab completion ranks names the same way.
//! Aliases and hidden entries share the canonical command's handler.

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tern_types::Skill;

use crate::app::Model;
use crate::effect::Effect;
use crate::fuzzy;

pub use builtin::builtin_registry;

/// Completion suggestions shown at once.
pub const MAX_COMPLETIONS: usize = 8;

pub type CommandFn = Arc<dyn Fn(&mut Model, &str) -> Vec<Effect> + Send + Sync>;

#[derive(Clone)]
pub struct SlashCommand {
    pub name: String,
    pub description: String,
    pub is_alias: bool,
    pub is_hidden: bool,
    pub is_skill: bool,
    pub execute: CommandFn,
}

impl fmt::Debug for SlashCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlashCommand")
            .field("name", &self.name)
            .field("is_alias", &self.is_alias)
            .field("is_hidden", &self.is_hidden)
            .field("is_skill", &self.is_skill)
            .finish_non_exhaustive()
    }
}

impl SlashCommand {
    pub fn new<F>(name: &str, description: &str, execute: F) -> Self
    where
        F: Fn(&mut Model, &str) -> Vec<Effect> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            is_alias: false,
            is_hidden: false,
            is_skill: false,
            execute: Arc::new(execute),
        }
    }

    /// Visible in help and completion as a first-class command.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !self.is_alias && !self.is_hidden && !self.is_skill
    }
}

#[derive(Debug, Default, Clone)]
pub struct SlashRegistry {
    commands: HashMap<String, SlashCommand>,
    /// Every registered name, sorted.
    names: Vec<String>,
}

impl SlashRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `command`. A skill never replaces an existing non-skill entry.
    pub fn register(&mut self, command: SlashCommand) {
        if let Some(existing) = self.commands.get(&command.name) {
            if command.is_skill && !existing.is_skill {
                tracing::warn!(name = %command.name, "skill shadows a built-in command; ignored");
                return;
            }
        } else if let Err(pos) = self.names.binary_search(&command.name) {
            self.names.insert(pos, command.name.clone());
        }
        self.commands.insert(command.name.clone(), command);
    }

    /// Registers `alias` sharing `target`'s handler. No-op if `target` is unknown.
    pub fn alias(&mut self, alias: &str, target: &str, hidden: bool) {
        let Some(canonical) = self.commands.get(target) else {
            return;
        };
        let entry = SlashCommand {
            name: alias.to_string(),
            description: format!("Alias for /{target}"),
            is_alias: !hidden,
            is_hidden: hidden,
            is_skill: false,
            execute: Arc::clone(&canonical.execute),
        };
        self.register(entry);
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&SlashCommand> {
        self.commands.get(name)
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn completable(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .filter(|name| self.commands.get(*name).is_some_and(|c| !c.is_hidden))
            .map(String::as_str)
    }

    /// Names starting with `prefix`, sorted.
    #[must_use]
    pub fn prefix_complete(&self, prefix: &str) -> Vec<String> {
        self.completable()
            .filter(|name| name.starts_with(prefix))
            .map(str::to_string)
            .collect()
    }

    /// Names ranked by fuzzy score against `pattern`. An empty pattern lists
    /// every completable name.
    #[must_use]
    pub fn fuzzy_complete(&self, pattern: &str) -> Vec<String> {
        if pattern.is_empty() {
            return self.completable().map(str::to_string).collect();
        }
        fuzzy::rank(pattern, self.completable())
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// The best correction for `pattern`, if any scores above zero.
    #[must_use]
    pub fn fuzzy_best(&self, pattern: &str) -> Option<String> {
        fuzzy::best(pattern, self.completable()).map(str::to_string)
    }

    /// Canonical commands in name order; no aliases, hidden entries, or skills.
    pub fn visible_commands(&self) -> impl Iterator<Item = &SlashCommand> {
        self.names
            .iter()
            .filter_map(|name| self.commands.get(name))
            .filter(|c| c.is_visible())
    }

    pub fn skills(&self) -> impl Iterator<Item = &SlashCommand> {
        self.names
            .iter()
            .filter_map(|name| self.commands.get(name))
            .filter(|c| c.is_skill)
    }

    /// Plain-text command list for non-interactive output.
    #[must_use]
    pub fn help_text(&self) -> String {
        let mut out = String::from("Available commands:");
        for command in self.visible_commands() {
            out.push_str(&format!("\n  /{:<12} {}", command.name, command.description));
        }
        let skills: Vec<&SlashCommand> = self.skills().collect();
        if !skills.is_empty() {
            out.push_str("\n\nCustom commands:");
            for skill in skills {
                out.push_str(&format!("\n  /{:<12} {}", skill.name, skill.description));
            }
        }
        out
    }

    /// Registers each skill as a command that sends its rendered prompt.
    pub fn register_skills(&mut self, skills: &[Skill]) {
        for skill in skills {
            let template = skill.clone();
            let mut command = SlashCommand::new(&skill.name, &skill.description, move |model, args| {
                model.send_prompt(template.render(args))
            });
            command.is_skill = true;
            self.register(command);
        }
    }
}
