//! Settings and sessions written through the file-backed stores.

use std::fs;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use crossterm::event::KeyCode;
use wiremock::MockServer;

use tern_config::load_settings_from;
use tern_engine::{Agent, Mode, SessionStore};
use tern_types::{Message, PermissionMode, Session};

use crate::common::{Live, TEST_MODEL, mount_stream, text_stream};

fn saved(id: &str, minutes_ago: i64, prompt: &str) -> Session {
    let at = Utc::now() - Duration::minutes(minutes_ago);
    let mut session = Session::new(id, TEST_MODEL, PathBuf::from("/work"), at);
    session.messages = vec![Message::user(prompt), Message::assistant_text("done")];
    session
}

#[tokio::test]
async fn config_panel_changes_land_in_the_settings_file() {
    let server = MockServer::start().await;
    let mut live = Live::start(&server, None);
    fs::write(&live.config_path, "# my settings\ntheme = \"dark\"\n").unwrap();

    live.submit("/settings");
    assert_eq!(live.model.mode(), Mode::Config);
    // Fast mode is the first row.
    live.key(KeyCode::Enter);
    for _ in 0..6 {
        live.key(KeyCode::Down);
    }
    // Theme: dark -> light.
    live.key(KeyCode::Enter);
    live.key(KeyCode::Esc);

    assert_eq!(live.model.mode(), Mode::Input);
    assert!(live.printed_text().contains("Enabled fast mode"));
    assert!(live.printed_text().contains("Set theme to light"));
    assert!(live.agent.fast_mode());

    let settings = load_settings_from(&live.config_path).unwrap();
    assert!(settings.fast_mode);
    assert_eq!(settings.theme, "light");
    let raw = fs::read_to_string(&live.config_path).unwrap();
    assert!(raw.starts_with("# my settings"));
}

#[tokio::test]
async fn permissions_command_persists_and_reaches_worker() {
    let server = MockServer::start().await;
    let mut live = Live::start(&server, None);

    live.submit("/mode acceptEdits");

    assert_eq!(live.agent.permission_context().mode, PermissionMode::AcceptEdits);
    let settings = load_settings_from(&live.config_path).unwrap();
    assert_eq!(settings.permission_mode, PermissionMode::AcceptEdits);
}

#[tokio::test]
async fn continue_adopts_the_newest_saved_session() {
    let server = MockServer::start().await;
    let mut live = Live::start(&server, None);
    let older = saved("older", 120, "write docs");
    let newer = saved("newer", 3, "fix the parser");
    live.sessions.save(&older).unwrap();
    live.sessions.save(&newer).unwrap();

    live.submit("/continue");
    live.run_until(|m| m.session().id() == "newer").await;

    assert_eq!(live.model.mode(), Mode::Input);
    assert_eq!(live.agent.messages(), newer.messages);
    assert!(live.printed_text().contains("Resumed session newer"));
}

#[tokio::test]
async fn resume_picker_lists_saved_sessions() {
    let server = MockServer::start().await;
    let mut live = Live::start(&server, None);
    live.sessions.save(&saved("older", 120, "write docs")).unwrap();
    live.sessions.save(&saved("newer", 3, "fix the parser")).unwrap();

    live.submit("/resume");
    live.run_until(|m| m.mode() == Mode::Resume).await;
    live.key(KeyCode::Down);
    live.key(KeyCode::Enter);

    assert_eq!(live.model.mode(), Mode::Input);
    assert_eq!(live.model.session().id(), "older");
    assert_eq!(live.agent.history_len(), 2);
}

#[tokio::test]
async fn clear_keeps_the_old_session_on_disk() {
    let server = MockServer::start().await;
    mount_stream(&server, text_stream("first reply")).await;
    mount_stream(&server, text_stream("second reply")).await;
    let mut live = Live::start(&server, None);

    live.submit("Hi");
    live.run_until(|m| m.mode() == Mode::Input).await;
    let first_id = live.model.session().id();

    live.submit("/clear");
    assert_eq!(live.agent.history_len(), 0);
    assert!(live.model.tokens().is_empty());
    assert!(live.model.todos().is_empty());
    let second_id = live.model.session().id();
    assert_ne!(second_id, first_id);
    assert_eq!(live.model.session().snapshot().model, TEST_MODEL);

    live.submit("Hello again");
    live.run_until(|m| m.mode() == Mode::Input).await;

    let ids: Vec<String> = live
        .sessions
        .list()
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], second_id);
    assert!(ids.contains(&first_id));
}
