mod runtime;

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{Stdout, stdout};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{TerminalOptions, Viewport, prelude::*};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tern_engine::{
    CompletionClient, ConversationAgent, Deps, ExitAction, FileSessionStore, FileSettingsStore, GitDiffLoader,
    Mailbox, Model, ModelOptions, Msg, NoMcpServers, SessionStore, SharedSession,
};
use tern_providers::AnthropicClient;
use tern_types::{DEFAULT_MODEL, Session, Settings, resolve_model};

use crate::runtime::Runtime;

const LOGIN_HINT: &str = "Set ANTHROPIC_API_KEY (or api_key in ~/.tern/config.toml) and run tern again.";

/// Interactive terminal front-end for an AI coding agent.
#[derive(Debug, Parser)]
#[command(name = "tern", version, about)]
struct Args {
    /// Prompt to send as soon as the session starts.
    prompt: Option<String>,

    /// Continue the most recent session.
    #[arg(short, long = "continue")]
    continue_session: bool,

    /// Model alias (opus, sonnet, haiku) or full model id.
    #[arg(long)]
    model: Option<String>,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // The terminal belongs to the TUI; no log file means no logs.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!("Failed to create log dir {}: {e}", parent.display()));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!("Failed to open log file {}: {e}", candidate.display()));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = tern_config::logs_dir() {
        candidates.push(dir.join("tern.log"));
    }
    candidates.push(PathBuf::from(".tern").join("logs").join("tern.log"));
    candidates
}

/// Raw mode, bracketed paste, and an inline viewport, restored on drop even
/// after a panic or early return.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn new(height: u16) -> Result<Self> {
        enable_raw_mode()?;

        let mut out = stdout();
        if let Err(err) = execute!(out, EnableBracketedPaste) {
            let _ = disable_raw_mode();
            return Err(err.into());
        }

        let terminal = match Terminal::with_options(
            CrosstermBackend::new(out),
            TerminalOptions {
                viewport: Viewport::Inline(height),
            },
        ) {
            Ok(t) => t,
            Err(err) => {
                let _ = disable_raw_mode();
                let _ = execute!(stdout(), DisableBracketedPaste);
                return Err(err.into());
            }
        };

        Ok(Self { terminal })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = runtime::clear_viewport(&mut self.terminal);
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), DisableBracketedPaste);
        let _ = self.terminal.show_cursor();
    }
}

fn load_settings() -> Settings {
    match tern_config::load_settings() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(%err, "using default settings");
            Settings::default()
        }
    }
}

/// `--model`, then the settings file, then the default. Aliases resolve
/// through the catalog; unknown ids are passed through.
fn initial_model(flag: Option<&str>, settings: &Settings) -> String {
    let raw = flag
        .or(settings.model.as_deref())
        .unwrap_or(DEFAULT_MODEL);
    resolve_model(raw).map_or_else(|| raw.to_string(), |info| info.id.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let cwd = env::current_dir().context("reading the current directory")?;
    let settings = load_settings();
    let model_id = initial_model(args.model.as_deref(), &settings);
    let api_key = tern_config::api_key();
    let skills = tern_config::load_skills(&cwd);
    tracing::info!(model = %model_id, skills = skills.len(), "starting");

    let (mailbox, rx) = Mailbox::channel();

    let client = AnthropicClient::new(api_key.clone().unwrap_or_default())
        .context("building the HTTP client")?;
    let agent = Arc::new(ConversationAgent::new(client.clone(), model_id.clone()));
    {
        let mailbox = mailbox.clone();
        agent.set_todo_sink(Arc::new(move |todos| {
            mailbox.post(Msg::TodoUpdate(todos));
        }));
    }

    let sessions_dir = tern_config::sessions_dir();
    let sessions: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(
        sessions_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".tern").join("sessions")),
    ));
    let config_path = tern_config::config_path();
    let settings_store = Arc::new(FileSettingsStore::new(
        config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(".tern").join("config.toml")),
    ));

    let session = SharedSession::new(Session::new(
        sessions.generate_id(),
        model_id.clone(),
        cwd.clone(),
        Utc::now(),
    ));

    let completion = api_key
        .is_some()
        .then(|| Arc::new(client) as Arc<dyn CompletionClient>);
    let deps = Deps {
        agent,
        sessions,
        settings_store,
        diff_loader: Arc::new(GitDiffLoader),
        completion,
        mcp: Arc::new(NoMcpServers),
        mailbox: mailbox.clone(),
    };
    let model = Model::new(
        deps,
        ModelOptions {
            version: env!("CARGO_PKG_VERSION").to_string(),
            cwd,
            settings,
            model: model_id,
            session,
            skills,
            initial_prompt: args.prompt,
            continue_session: args.continue_session,
            config_path,
            sessions_dir,
            api_key_present: api_key.is_some(),
        },
    );

    let exit_action = {
        let mut session = TerminalSession::new(1)?;
        let mut runtime = Runtime::new(model, mailbox, rx);
        let result = runtime.run(&mut session.terminal).await;
        runtime.shutdown().await;
        result?;
        runtime.exit_action()
    };

    if exit_action == ExitAction::Login {
        println!("{LOGIN_HINT}");
    }
    Ok(())
}
