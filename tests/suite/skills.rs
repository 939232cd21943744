//! Custom commands read from disk and run as prompts.

use std::fs;

use wiremock::MockServer;

use tern_config::load_skills_from;
use tern_engine::{Agent, Mode, builtin_registry};
use tern_types::Settings;

use crate::common::{Live, mount_stream, text_stream};

#[test]
fn project_commands_override_user_commands() {
    let user = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    fs::write(user.path().join("explain.md"), "Explain this code simply.").unwrap();
    fs::write(user.path().join("Lint.md"), "# Run the linter\nRun clippy and fix warnings.").unwrap();
    fs::write(
        project.path().join("explain.md"),
        "---\ndescription: \"Explain for the team\"\n---\nExplain $ARGUMENTS to a new hire.",
    )
    .unwrap();
    fs::write(project.path().join("notes.txt"), "not a command").unwrap();

    let skills = load_skills_from(&[user.path().to_path_buf(), project.path().to_path_buf()]);

    let names: Vec<&str> = skills.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["explain", "lint"]);
    assert_eq!(skills[0].description, "Explain for the team");
    assert_eq!(skills[0].render("the parser"), "Explain the parser to a new hire.");
    assert_eq!(skills[1].description, "Run the linter");
}

#[test]
fn loaded_commands_appear_under_custom_commands() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("deploy.md"), "Deploy to staging.").unwrap();
    // Shadows a built-in and must be ignored.
    fs::write(dir.path().join("clear.md"), "Not the real clear.").unwrap();

    let mut registry = builtin_registry();
    registry.register_skills(&load_skills_from(&[dir.path().to_path_buf()]));

    let help = registry.help_text();
    let (builtins, custom) = help.split_once("Custom commands:").unwrap();
    assert!(builtins.contains("/clear"));
    assert!(custom.contains("/deploy"));
    assert!(!custom.contains("/clear"));
    assert!(!registry.lookup("clear").unwrap().is_skill);
}

#[tokio::test]
async fn running_a_command_sends_its_prompt() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("explain.md"), "Explain $ARGUMENTS briefly.").unwrap();
    let skills = load_skills_from(&[dir.path().to_path_buf()]);

    let server = MockServer::start().await;
    mount_stream(&server, text_stream("It parses.")).await;
    let mut live = Live::start_with(&server, None, Settings::default(), skills);

    live.submit("/explain the parser");
    assert_eq!(live.model.mode(), Mode::Streaming);
    live.run_until(|m| m.mode() == Mode::Input).await;

    let history = live.agent.messages();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].text(), "Explain the parser briefly.");
}
