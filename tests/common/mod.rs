//! Shared test utilities and fixtures
//!
//! A mock Messages API that streams canned SSE bodies, and [`Live`], a model
//! wired to the real conversation worker and file-backed stores.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tern_engine::{
    ConversationAgent, Deps, Effect, FileSessionStore, FileSettingsStore, GitDiffLoader, Mailbox,
    Model, ModelOptions, Msg, NoMcpServers, ScrollbackEntry, SessionStore, SharedSession,
    ToolRuntime,
};
use tern_providers::AnthropicClient;
use tern_providers::retry::RetryConfig;
use tern_types::{Session, Settings, Skill};

pub const TEST_MODEL: &str = "claude-haiku-4-5";

fn event(data: &serde_json::Value) -> String {
    format!("event: {}\ndata: {data}\n\n", data["type"].as_str().unwrap_or("unknown"))
}

/// SSE body for an assistant message made of one text block.
pub fn text_stream(text: &str) -> String {
    let mut body = String::new();
    body.push_str(&event(&json!({
        "type": "message_start",
        "message": {"model": TEST_MODEL, "usage": {"input_tokens": 12, "cache_read_input_tokens": 4}}
    })));
    body.push_str(&event(&json!({
        "type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}
    })));
    // Two deltas so the loop has to accumulate.
    let (head, tail) = text.split_at(text.len() / 2);
    for piece in [head, tail] {
        body.push_str(&event(&json!({
            "type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": piece}
        })));
    }
    body.push_str(&event(&json!({"type": "content_block_stop", "index": 0})));
    body.push_str(&event(&json!({
        "type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 7}
    })));
    body.push_str(&event(&json!({"type": "message_stop"})));
    body
}

/// SSE body for an assistant message that calls one tool.
pub fn tool_stream(name: &str, input: &serde_json::Value) -> String {
    let raw = input.to_string();
    let (head, tail) = raw.split_at(raw.len() / 2);
    let mut body = String::new();
    body.push_str(&event(&json!({
        "type": "message_start", "message": {"model": TEST_MODEL, "usage": {"input_tokens": 20}}
    })));
    body.push_str(&event(&json!({
        "type": "content_block_start", "index": 0,
        "content_block": {"type": "tool_use", "id": "toolu_01", "name": name, "input": {}}
    })));
    for piece in [head, tail] {
        body.push_str(&event(&json!({
            "type": "content_block_delta", "index": 0,
            "delta": {"type": "input_json_delta", "partial_json": piece}
        })));
    }
    body.push_str(&event(&json!({"type": "content_block_stop", "index": 0})));
    body.push_str(&event(&json!({
        "type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 9}
    })));
    body.push_str(&event(&json!({"type": "message_stop"})));
    body
}

/// Serves `body` for the next POST to `/v1/messages`. Mounted responses are
/// used in mount order.
pub async fn mount_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
}

pub async fn mount_error(server: &MockServer, status: u16, message: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "type": "error",
            "error": {"type": "invalid_request_error", "message": message}
        })))
        .mount(server)
        .await;
}

/// A model driving the real worker against a mock server, with sessions and
/// settings written under a temporary directory.
pub struct Live {
    pub model: Model,
    pub agent: Arc<ConversationAgent>,
    pub sessions: Arc<FileSessionStore>,
    pub config_path: PathBuf,
    pub printed: Vec<ScrollbackEntry>,
    mailbox: Mailbox,
    rx: UnboundedReceiver<Msg>,
    _home: TempDir,
}

impl Live {
    pub fn start(server: &MockServer, tools: Option<Arc<dyn ToolRuntime>>) -> Self {
        Self::start_with(server, tools, Settings::default(), Vec::new())
    }

    pub fn start_with(
        server: &MockServer,
        tools: Option<Arc<dyn ToolRuntime>>,
        settings: Settings,
        skills: Vec<Skill>,
    ) -> Self {
        let home = tempfile::tempdir().expect("tempdir");
        let (mailbox, rx) = Mailbox::channel();
        let client = AnthropicClient::new("test-key")
            .expect("client")
            .with_url(format!("{}/v1/messages", server.uri()))
            .with_retry(RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            });
        let mut agent = ConversationAgent::new(client, TEST_MODEL);
        if let Some(tools) = tools {
            agent = agent.with_tools(tools);
        }
        let agent = Arc::new(agent);
        let sessions = Arc::new(FileSessionStore::new(home.path().join("sessions")));
        let config_path = home.path().join("config.toml");
        let cwd = home.path().join("project");

        let session = SharedSession::new(Session::new(
            sessions.generate_id(),
            TEST_MODEL,
            cwd.clone(),
            Utc::now(),
        ));
        let deps = Deps {
            agent: agent.clone(),
            sessions: sessions.clone(),
            settings_store: Arc::new(FileSettingsStore::new(&config_path)),
            diff_loader: Arc::new(GitDiffLoader),
            completion: None,
            mcp: Arc::new(NoMcpServers),
            mailbox: mailbox.clone(),
        };
        let model = Model::new(
            deps,
            ModelOptions {
                version: "0.0.0-test".to_string(),
                cwd,
                settings,
                model: TEST_MODEL.to_string(),
                session,
                skills,
                initial_prompt: None,
                continue_session: false,
                config_path: Some(config_path.clone()),
                sessions_dir: Some(home.path().join("sessions")),
                api_key_present: true,
            },
        );
        Self {
            model,
            agent,
            sessions,
            config_path,
            printed: Vec::new(),
            mailbox,
            rx,
            _home: home,
        }
    }

    pub fn send(&mut self, msg: Msg) {
        let effects = self.model.update(msg);
        for effect in effects {
            match effect {
                Effect::Print(entry) => self.printed.push(entry),
                Effect::Task(future) => {
                    let mailbox = self.mailbox.clone();
                    tokio::spawn(async move {
                        if let Some(msg) = future.await {
                            mailbox.post(msg);
                        }
                    });
                }
                Effect::Call(call) => {
                    if let Some(msg) = call() {
                        self.send(msg);
                    }
                }
                // Timers, editors and quitting are not exercised here.
                Effect::Schedule { .. } | Effect::Exec(_) | Effect::Quit => {}
            }
        }
    }

    pub fn key(&mut self, code: KeyCode) {
        self.send(Msg::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    pub fn submit(&mut self, text: &str) {
        for c in text.chars() {
            self.key(KeyCode::Char(c));
        }
        self.key(KeyCode::Enter);
    }

    /// Feeds posted messages into the model until `done` holds.
    pub async fn run_until(&mut self, done: impl Fn(&Model) -> bool) {
        let deadline = Duration::from_secs(10);
        let wait = async {
            while !done(&self.model) {
                match self.rx.recv().await {
                    Some(msg) => self.send(msg),
                    None => break,
                }
            }
        };
        tokio::time::timeout(deadline, wait)
            .await
            .expect("model did not reach the expected state");
    }

    pub fn printed_text(&self) -> String {
        self.printed
            .iter()
            .map(ScrollbackEntry::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
