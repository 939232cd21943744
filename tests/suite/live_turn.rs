//! Full turns through the real worker, SSE parser, stream sink and mailbox.

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use tern_engine::{Agent, Mode, Msg, ScrollbackEntry, SessionStore, ToolFuture, ToolRuntime};
use tern_providers::ToolDefinition;
use tern_types::{ContentBlock, PermissionVerdict};

use crate::common::{Live, mount_error, mount_stream, text_stream, tool_stream};

/// Runs `Bash` by echoing the command back.
struct EchoShell;

impl ToolRuntime for EchoShell {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "Bash".to_string(),
            description: "Run a shell command".to_string(),
            input_schema: json!({"type": "object", "properties": {"command": {"type": "string"}}}),
        }]
    }

    fn is_read_only(&self, _name: &str) -> bool {
        false
    }

    fn execute<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
        _name: &'a str,
        input: &'a Value,
    ) -> ToolFuture<'a> {
        let command = input["command"].as_str().unwrap_or_default().to_string();
        Box::pin(async move { Ok(format!("ran {command}")) })
    }
}

fn permission_outcomes(live: &Live) -> Vec<PermissionVerdict> {
    live.printed
        .iter()
        .filter_map(|entry| match entry {
            ScrollbackEntry::PermissionOutcome { verdict, .. } => Some(*verdict),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn text_reply_is_printed_counted_and_saved() {
    let server = MockServer::start().await;
    mount_stream(&server, text_stream("Hello from the mock")).await;
    let mut live = Live::start(&server, None);

    live.submit("hi");
    assert_eq!(live.model.mode(), Mode::Streaming);
    live.run_until(|m| m.mode() == Mode::Input).await;

    assert!(
        live.printed
            .contains(&ScrollbackEntry::Assistant("Hello from the mock".into()))
    );
    let tokens = live.model.tokens();
    assert_eq!(tokens.input_tokens, 12);
    assert_eq!(tokens.cache_read, 4);
    assert_eq!(tokens.output_tokens, 7);
    assert_eq!(tokens.turn_count, 1);
    assert!(tokens.cost_usd > 0.0);

    assert_eq!(live.agent.history_len(), 2);
    let saved = live.sessions.most_recent().unwrap().unwrap();
    assert_eq!(saved.id, live.model.session().id());
    assert_eq!(saved.messages.len(), 2);
}

#[tokio::test]
async fn tool_call_waits_for_permission_then_runs() {
    let server = MockServer::start().await;
    mount_stream(&server, tool_stream("Bash", &json!({"command": "ls"}))).await;
    mount_stream(&server, text_stream("Listed.")).await;
    let mut live = Live::start(&server, Some(Arc::new(EchoShell)));

    live.submit("list files");
    live.run_until(|m| m.mode() == Mode::Permission).await;
    assert!(live.printed_text().contains("⏺ Bash $ ls"));

    live.key(KeyCode::Char('y'));
    assert_eq!(live.model.mode(), Mode::Streaming);
    live.run_until(|m| m.mode() == Mode::Input).await;

    assert_eq!(permission_outcomes(&live), vec![PermissionVerdict::Allow]);
    assert!(live.printed.contains(&ScrollbackEntry::Assistant("Listed.".into())));
    let history = live.agent.messages();
    assert_eq!(history.len(), 4);
    match &history[2].content[0] {
        ContentBlock::ToolResult { content, is_error, .. } => {
            assert_eq!(content, "ran ls");
            assert!(!is_error);
        }
        other => panic!("expected a tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn always_allow_covers_later_calls_with_the_same_command() {
    let server = MockServer::start().await;
    mount_stream(&server, tool_stream("Bash", &json!({"command": "ls"}))).await;
    mount_stream(&server, tool_stream("Bash", &json!({"command": "ls -la"}))).await;
    mount_stream(&server, text_stream("Both listed.")).await;
    let mut live = Live::start(&server, Some(Arc::new(EchoShell)));

    live.submit("list twice");
    live.run_until(|m| m.mode() == Mode::Permission).await;
    live.key(KeyCode::Char('a'));
    // A second prompt would park the loop in Permission and time out here.
    live.run_until(|m| m.mode() == Mode::Input).await;

    assert_eq!(permission_outcomes(&live), vec![PermissionVerdict::AlwaysAllow]);
    assert_eq!(
        live.agent.permission_context().always_allowed,
        vec!["Bash(ls:*)".to_string()]
    );
    assert_eq!(live.agent.history_len(), 6);
}

#[tokio::test]
async fn denied_tool_is_reported_to_the_model() {
    let server = MockServer::start().await;
    mount_stream(&server, tool_stream("Bash", &json!({"command": "rm -rf build"}))).await;
    mount_stream(&server, text_stream("Okay, skipped.")).await;
    let mut live = Live::start(&server, Some(Arc::new(EchoShell)));

    live.submit("clean up");
    live.run_until(|m| m.mode() == Mode::Permission).await;
    live.key(KeyCode::Char('n'));
    live.run_until(|m| m.mode() == Mode::Input).await;

    assert_eq!(permission_outcomes(&live), vec![PermissionVerdict::Deny]);
    match &live.agent.messages()[2].content[0] {
        ContentBlock::ToolResult { is_error, .. } => assert!(is_error),
        other => panic!("expected a tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn api_error_is_printed_once() {
    let server = MockServer::start().await;
    mount_error(&server, 400, "model: unknown model").await;
    let mut live = Live::start(&server, None);

    live.submit("hi");
    live.run_until(|m| m.mode() == Mode::Input).await;

    let errors = live
        .printed
        .iter()
        .filter(|entry| matches!(entry, ScrollbackEntry::Error(text) if text.contains("unknown model")))
        .count();
    assert_eq!(errors, 1);
}

#[tokio::test]
async fn queued_message_runs_after_the_first_turn() {
    let server = MockServer::start().await;
    mount_stream(&server, text_stream("one")).await;
    mount_stream(&server, text_stream("two")).await;
    let mut live = Live::start(&server, None);

    live.submit("first");
    live.submit("second");
    assert_eq!(live.model.queue().len(), 1);
    live.run_until(|m| m.mode() == Mode::Input).await;

    assert!(live.model.queue().is_empty());
    assert_eq!(live.agent.history_len(), 4);
    assert!(live.printed.contains(&ScrollbackEntry::Assistant("one".into())));
    assert!(live.printed.contains(&ScrollbackEntry::Assistant("two".into())));
    assert_eq!(live.model.tokens().turn_count, 2);
}

#[tokio::test]
async fn ctrl_c_interrupts_a_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(text_stream("too late"))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;
    let mut live = Live::start(&server, None);

    live.submit("slow please");
    live.send(Msg::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    assert_eq!(live.model.mode(), Mode::Streaming);
    live.run_until(|m| m.mode() == Mode::Input).await;

    assert!(live.printed.contains(&ScrollbackEntry::Dim("Interrupted".into())));
    assert!(
        !live
            .printed
            .iter()
            .any(|entry| matches!(entry, ScrollbackEntry::Error(_)))
    );
}
