//! The built-in slash commands.

use std::env;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tern_config::{project_memory_path, user_memory_path};
use tern_types::{
    FAST_MODEL, PermissionMode, SettingValue, THEMES, context_window_for, display_name_for,
    resolve_model,
};

use super::{SlashCommand, SlashRegistry};
use crate::app::{ExitAction, ModeState, Model};
use crate::effect::{Effect, ExecRequest};
use crate::msg::Msg;
use crate::settings_store::persist_quietly;
use crate::tokens::format_tokens;
use crate::ui::{ConfigPanel, ModelPicker};

type Handler = fn(&mut Model, &str) -> Vec<Effect>;

struct Builtin {
    name: &'static str,
    description: &'static str,
    run: Handler,
}

const BUILTINS: &[Builtin] = &[
    Builtin { name: "help", description: "Show help and available commands", run: help },
    Builtin { name: "model", description: "Switch model (opus, sonnet, haiku or an id)", run: model },
    Builtin { name: "version", description: "Show the tern version", run: version },
    Builtin { name: "cost", description: "Show token usage and cost for this session", run: cost },
    Builtin { name: "context", description: "Show context window usage", run: context },
    Builtin { name: "mcp", description: "Show MCP server status", run: mcp },
    Builtin { name: "memory", description: "Edit the project or user memory file", run: memory },
    Builtin { name: "init", description: "Create a TERN.md with notes about this codebase", run: init },
    Builtin { name: "compact", description: "Summarise the conversation to free context", run: compact },
    Builtin { name: "clear", description: "Clear the conversation and start a new session", run: clear },
    Builtin { name: "resume", description: "Resume a saved session", run: resume },
    Builtin { name: "continue", description: "Continue the most recent session", run: continue_session },
    Builtin { name: "diff", description: "Show uncommitted changes", run: diff },
    Builtin { name: "review", description: "Review a pull request or the current changes", run: review },
    Builtin { name: "config", description: "Open the settings panel", run: config },
    Builtin { name: "fast", description: "Toggle fast mode", run: fast },
    Builtin { name: "permissions", description: "Show or set the permission mode", run: permissions },
    Builtin { name: "theme", description: "Show or set the colour theme", run: theme },
    Builtin { name: "vim", description: "Toggle vim keybindings", run: vim },
    Builtin { name: "doctor", description: "Check the installation", run: doctor },
    Builtin { name: "hooks", description: "Show configured hooks", run: hooks },
    Builtin { name: "status", description: "Show session status", run: status },
    Builtin { name: "login", description: "Sign in with a different API key", run: login },
    Builtin { name: "logout", description: "Sign out", run: login },
    Builtin { name: "quit", description: "Exit tern", run: quit },
];

/// `(alias, target, hidden)`
const ALIASES: &[(&str, &str, bool)] = &[
    ("reset", "clear", false),
    ("new", "clear", false),
    ("settings", "config", false),
    ("mode", "permissions", false),
    ("exit", "quit", false),
    ("q", "quit", true),
    ("h", "help", true),
];

const INIT_PROMPT: &str = "Please analyze this codebase and create a TERN.md file containing:\n\
1. Build, lint and test commands, including how to run a single test.\n\
2. Code style guidelines: imports, formatting, types, naming, error handling.\n\n\
Keep it to about 20 lines. If a TERN.md already exists, improve it. Include any \
rules from .cursorrules, .cursor/rules/ or .github/copilot-instructions.md.";

const REVIEW_PROMPT: &str = "You are an expert code reviewer. Review the changes and give \
concrete, prioritised feedback: correctness bugs first, then security, performance, and \
readability. Quote the code you are commenting on. Be concise.";

#[must_use]
pub fn builtin_registry() -> SlashRegistry {
    let mut registry = SlashRegistry::new();
    for builtin in BUILTINS {
        let run = builtin.run;
        registry.register(SlashCommand::new(builtin.name, builtin.description, move |model, args| {
            run(model, args)
        }));
    }
    for (alias, target, hidden) in ALIASES {
        registry.alias(alias, target, *hidden);
    }
    registry
}

fn help(model: &mut Model, _args: &str) -> Vec<Effect> {
    model.open_help()
}

fn model(model: &mut Model, args: &str) -> Vec<Effect> {
    if args.is_empty() {
        model.input.blur();
        model.mode = ModeState::ModelPicker(ModelPicker::new(&model.model_name));
        return Vec::new();
    }
    match resolve_model(args) {
        Some(info) => model.switch_model(info.id, info.display_name),
        None => {
            let display = display_name_for(args);
            model.switch_model(args, &display)
        }
    }
}

fn version(model: &mut Model, _args: &str) -> Vec<Effect> {
    vec![Effect::info(format!("tern v{}", model.version))]
}

fn cost(model: &mut Model, _args: &str) -> Vec<Effect> {
    let t = &model.tokens;
    vec![Effect::info(format!(
        "Tokens:  {} in, {} out\nCache:   {} read, {} write\nTurns:   {}\nCost:    ${:.4}",
        format_tokens(t.input_tokens),
        format_tokens(t.output_tokens),
        format_tokens(t.cache_read),
        format_tokens(t.cache_write),
        t.turn_count,
        t.cost_usd,
    ))]
}

fn context(model: &mut Model, _args: &str) -> Vec<Effect> {
    let window = context_window_for(model.effective_model_id());
    let used = model.tokens.context_tokens();
    let pct = model.tokens.used_percentage(window).unwrap_or(0.0);
    vec![Effect::info(format!(
        "Context: {} / {} ({pct:.1}%)",
        format_tokens(used),
        format_tokens(window)
    ))]
}

fn mcp(model: &mut Model, _args: &str) -> Vec<Effect> {
    let servers = model.deps.mcp.servers();
    if servers.is_empty() {
        return vec![Effect::info("No MCP servers configured")];
    }
    let mut out = String::from("MCP servers:");
    for server in servers {
        let state = if server.connected { "connected" } else { "disconnected" };
        out.push_str(&format!("\n  {}  {state}, {} tools", server.name, server.tool_count));
    }
    vec![Effect::info(out)]
}

fn memory(model: &mut Model, args: &str) -> Vec<Effect> {
    let path = match args {
        "" | "project" => project_memory_path(&model.cwd),
        "user" => match user_memory_path() {
            Some(path) => path,
            None => return vec![Effect::error("Cannot locate the home directory")],
        },
        _ => return vec![Effect::info("Usage: /memory [project|user]")],
    };
    let (program, mut editor_args) = editor_command();
    editor_args.push(path.display().to_string());

    let touch = path.clone();
    let done = path;
    vec![
        Effect::call(move || {
            if let Err(err) = ensure_file(&touch) {
                tracing::warn!(path = %touch.display(), %err, "failed to create memory file");
            }
        }),
        Effect::Exec(ExecRequest {
            program,
            args: editor_args,
            cwd: Some(model.cwd.clone()),
            on_exit: Box::new(move |result| {
                let error = match result {
                    Ok(status) if status.success() => None,
                    Ok(status) => Some(format!("editor exited with {status}")),
                    Err(err) => Some(err.to_string()),
                };
                Msg::MemoryEditDone { path: done, error }
            }),
        }),
    ]
}

/// `$VISUAL`, then `$EDITOR`, then `vi`, split on whitespace.
fn editor_command() -> (String, Vec<String>) {
    let raw = ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string());
    let mut parts = raw.split_whitespace().map(str::to_string);
    let program = parts.next().unwrap_or_else(|| "vi".to_string());
    (program, parts.collect())
}

fn ensure_file(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

fn init(model: &mut Model, _args: &str) -> Vec<Effect> {
    model.send_prompt(INIT_PROMPT.to_string())
}

fn review(model: &mut Model, args: &str) -> Vec<Effect> {
    let prompt = if args.is_empty() {
        format!("{REVIEW_PROMPT}\n\nReview the uncommitted changes in this repository (use git diff).")
    } else {
        format!("{REVIEW_PROMPT}\n\nReview pull request {args} (use `gh pr view {args}` and `gh pr diff {args}`).")
    };
    model.send_prompt(prompt)
}

fn compact(model: &mut Model, _args: &str) -> Vec<Effect> {
    model.start_compact()
}

fn clear(model: &mut Model, args: &str) -> Vec<Effect> {
    let mut effects = model.clear_conversation();
    if !args.is_empty() {
        effects.extend(model.send_prompt(args.to_string()));
    }
    effects
}

fn resume(model: &mut Model, _args: &str) -> Vec<Effect> {
    vec![model.load_sessions()]
}

fn continue_session(model: &mut Model, _args: &str) -> Vec<Effect> {
    vec![model.load_most_recent()]
}

fn diff(model: &mut Model, _args: &str) -> Vec<Effect> {
    if model.diff_loading {
        return Vec::new();
    }
    model.diff_loading = true;
    let loader = Arc::clone(&model.deps.diff_loader);
    let cwd = model.cwd.clone();
    let mut effects = vec![Effect::task(async move {
        let data = loader.load(&cwd).await;
        Some(Msg::DiffLoaded(data))
    })];
    effects.extend(model.spinner.start());
    effects
}

fn config(model: &mut Model, _args: &str) -> Vec<Effect> {
    model.input.blur();
    model.mode = ModeState::Config(ConfigPanel::open(model.settings.clone()));
    Vec::new()
}

fn fast(model: &mut Model, _args: &str) -> Vec<Effect> {
    let enabled = !model.fast_mode;
    let mut effects = model.apply_fast_mode(enabled);
    effects.push(persist_quietly(
        &model.deps.settings_store,
        "fast_mode",
        SettingValue::Bool(enabled),
    ));
    effects.push(Effect::info(if enabled {
        format!("Fast mode on ({})", display_name_for(FAST_MODEL))
    } else {
        format!("Fast mode off ({})", display_name_for(&model.model_name))
    }));
    effects
}

fn permissions(model: &mut Model, args: &str) -> Vec<Effect> {
    if args.is_empty() {
        let choices: Vec<&str> = PermissionMode::ALL.iter().map(|m| m.as_str()).collect();
        return vec![Effect::info(format!(
            "Permission mode: {}\nAvailable: {}",
            model.settings.permission_mode,
            choices.join(", ")
        ))];
    }
    match PermissionMode::parse(args) {
        Ok(mode) => {
            model.settings.permission_mode = mode;
            let agent = Arc::clone(&model.deps.agent);
            vec![
                Effect::call(move || agent.set_permission_mode(mode)),
                persist_quietly(
                    &model.deps.settings_store,
                    "permission_mode",
                    SettingValue::from(mode.as_str()),
                ),
                Effect::info(format!("Set permission mode to {}", mode.label())),
            ]
        }
        Err(err) => vec![Effect::error(err.to_string())],
    }
}

fn theme(model: &mut Model, args: &str) -> Vec<Effect> {
    if args.is_empty() {
        return vec![Effect::info(format!(
            "Theme: {}\nAvailable: {}",
            model.settings.theme,
            THEMES.join(", ")
        ))];
    }
    let name = args.to_ascii_lowercase();
    if !THEMES.contains(&name.as_str()) {
        return vec![Effect::error(format!(
            "Unknown theme: {args} (choose from {})",
            THEMES.join(", ")
        ))];
    }
    model.settings.theme.clone_from(&name);
    vec![
        persist_quietly(&model.deps.settings_store, "theme", SettingValue::from(name.as_str())),
        Effect::info(format!("Set theme to {name}")),
    ]
}

fn vim(model: &mut Model, _args: &str) -> Vec<Effect> {
    let enabled = !model.settings.vim_mode;
    model.settings.vim_mode = enabled;
    model.input.set_vim(enabled);
    vec![
        persist_quietly(&model.deps.settings_store, "vim_mode", SettingValue::Bool(enabled)),
        Effect::info(if enabled { "Vim mode enabled" } else { "Vim mode disabled" }),
    ]
}

fn doctor(model: &mut Model, _args: &str) -> Vec<Effect> {
    let path_or = |path: &Option<PathBuf>| {
        path.as_ref()
            .map_or_else(|| "(unavailable)".to_string(), |p| p.display().to_string())
    };
    let status_line = match &model.settings.status_line {
        Some(config) if config.is_command() => config.command.clone(),
        _ => "not configured".to_string(),
    };
    let lines = [
        format!("tern v{}", model.version),
        format!("Model:        {}", model.effective_model_id()),
        format!(
            "API key:      {}",
            if model.api_key_present { "found" } else { "missing (set ANTHROPIC_API_KEY)" }
        ),
        format!("Config file:  {}", path_or(&model.config_path)),
        format!("Sessions:     {}", path_or(&model.sessions_dir)),
        format!("Status line:  {status_line}"),
    ];
    vec![Effect::info(lines.join("\n"))]
}

fn hooks(_model: &mut Model, _args: &str) -> Vec<Effect> {
    vec![Effect::info("No hooks configured")]
}

fn status(model: &mut Model, _args: &str) -> Vec<Effect> {
    let lines = [
        format!("tern v{}", model.version),
        format!("Session:      {}", model.session.id()),
        format!("Model:        {}", display_name_for(model.effective_model_id())),
        format!("Directory:    {}", model.cwd.display()),
        format!("Permissions:  {}", model.settings.permission_mode.label()),
        format!("Fast mode:    {}", if model.fast_mode { "on" } else { "off" }),
    ];
    vec![Effect::info(lines.join("\n"))]
}

fn login(model: &mut Model, _args: &str) -> Vec<Effect> {
    model.exit_action = ExitAction::Login;
    model.quitting = true;
    vec![Effect::Quit]
}

fn quit(model: &mut Model, _args: &str) -> Vec<Effect> {
    model.quitting = true;
    vec![Effect::Quit]
}

#[cfg(test)]
mod tests {
    use super::{ALIASES, BUILTINS, builtin_registry};

    #[test]
    fn every_builtin_and_alias_resolves() {
        let registry = builtin_registry();
        for builtin in BUILTINS {
            assert!(registry.lookup(builtin.name).is_some_and(|c| c.is_visible()), "{}", builtin.name);
        }
        for (alias, _, hidden) in ALIASES {
            let entry = registry.lookup(alias).unwrap();
            assert_eq!(entry.is_hidden, *hidden, "{alias}");
            assert_eq!(entry.is_alias, !*hidden, "{alias}");
        }
    }

    #[test]
    fn hidden_entries_are_not_completed() {
        let registry = builtin_registry();
        assert!(!registry.prefix_complete("q").contains(&"q".to_string()));
        assert!(registry.prefix_complete("q").contains(&"quit".to_string()));
    }
}
