//! Custom status line: an external command fed a JSON document on stdin.
//!
//! The command runs through `sh -c` in its own process group with a
//! five-second budget. Any failure yields an empty string, which the loop
//! treats as "keep the previous text".

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use tern_types::{context_window_for, display_name_for};
use tern_utils::expand_tilde;

use crate::process::{ChildGuard, set_new_session};
use crate::tokens::TokenTracker;

pub const STATUS_LINE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StatusLineError {
    #[error("failed to spawn status line command: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("status line command failed: {0}")]
    Io(#[source] std::io::Error),
    #[error("status line command timed out")]
    Timeout,
    #[error("status line command exited with {0}")]
    Exit(std::process::ExitStatus),
    #[error("failed to encode status line input: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusLineInput {
    pub cwd: String,
    pub session_id: String,
    pub model: StatusLineModel,
    pub workspace: StatusLineWorkspace,
    pub version: String,
    pub output_style: StatusLineOutputStyle,
    pub cost: StatusLineCost,
    pub context_window: StatusLineContextWindow,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusLineModel {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusLineWorkspace {
    pub current_dir: String,
    pub project_dir: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusLineOutputStyle {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusLineCost {
    pub total_cost_usd: f64,
    pub total_duration_ms: u64,
    pub total_api_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusLineContextWindow {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub context_window_size: u64,
    pub used_percentage: Option<f64>,
}

/// Everything the status line document is built from.
#[derive(Debug, Clone)]
pub struct StatusLineContext<'a> {
    pub cwd: &'a Path,
    pub session_id: &'a str,
    pub model_id: &'a str,
    pub version: &'a str,
    pub tokens: &'a TokenTracker,
    pub total_duration: Duration,
    pub api_duration: Duration,
}

impl StatusLineInput {
    #[must_use]
    pub fn build(ctx: &StatusLineContext<'_>) -> Self {
        let cwd = ctx.cwd.display().to_string();
        let window = context_window_for(ctx.model_id);
        Self {
            cwd: cwd.clone(),
            session_id: ctx.session_id.to_string(),
            model: StatusLineModel {
                id: ctx.model_id.to_string(),
                display_name: display_name_for(ctx.model_id),
            },
            workspace: StatusLineWorkspace {
                current_dir: cwd.clone(),
                project_dir: cwd,
            },
            version: ctx.version.to_string(),
            output_style: StatusLineOutputStyle {
                name: "default".to_string(),
            },
            cost: StatusLineCost {
                total_cost_usd: ctx.tokens.cost_usd,
                total_duration_ms: duration_ms(ctx.total_duration),
                total_api_duration_ms: duration_ms(ctx.api_duration),
            },
            context_window: StatusLineContextWindow {
                total_input_tokens: ctx.tokens.input_tokens,
                total_output_tokens: ctx.tokens.output_tokens,
                context_window_size: window,
                used_percentage: ctx.tokens.used_percentage(window),
            },
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Runs `command` with `input` on stdin. `None` when the command fails or
/// times out, so the previous text stays on screen.
pub async fn render_status_line(command: &str, input: &StatusLineInput) -> Option<String> {
    match run_status_command(command, input, STATUS_LINE_TIMEOUT).await {
        Ok(text) => Some(text),
        Err(err) => {
            tracing::warn!(%err, "status line command failed");
            None
        }
    }
}

pub async fn run_status_command(
    command: &str,
    input: &StatusLineInput,
    timeout: Duration,
) -> Result<String, StatusLineError> {
    let payload = serde_json::to_vec(input)?;
    run_shell_with_stdin(command, &payload, timeout).await
}

pub(crate) async fn run_shell_with_stdin(
    command: &str,
    stdin: &[u8],
    timeout: Duration,
) -> Result<String, StatusLineError> {
    let command = expand_tilde(command.trim());
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c")
        .arg(&command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    set_new_session(&mut cmd);

    let child = cmd.spawn().map_err(StatusLineError::Spawn)?;
    let mut guard = ChildGuard::new(child);

    let run = async {
        if let Some(mut pipe) = guard.child_mut().stdin.take() {
            // A command that ignores stdin may exit before we finish writing.
            if let Err(err) = pipe.write_all(stdin).await {
                tracing::debug!(%err, "status line stdin closed early");
            }
        }
        let mut stdout = Vec::new();
        if let Some(mut pipe) = guard.child_mut().stdout.take() {
            pipe.read_to_end(&mut stdout).await.map_err(StatusLineError::Io)?;
        }
        let status = guard.child_mut().wait().await.map_err(StatusLineError::Io)?;
        Ok::<_, StatusLineError>((status, stdout))
    };

    let (status, stdout) = tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| StatusLineError::Timeout)??;
    guard.disarm();

    if !status.success() {
        return Err(StatusLineError::Exit(status));
    }
    Ok(clean_output(&String::from_utf8_lossy(&stdout)))
}

/// Trims output and drops blank lines.
#[must_use]
pub fn clean_output(raw: &str) -> String {
    raw.trim()
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::{Duration, Instant};

    use tern_types::Usage;

    use super::{
        StatusLineContext, StatusLineError, StatusLineInput, clean_output, render_status_line,
        run_shell_with_stdin, run_status_command,
    };
    use crate::tokens::TokenTracker;

    fn input(tokens: &TokenTracker) -> StatusLineInput {
        StatusLineInput::build(&StatusLineContext {
            cwd: Path::new("/work/repo"),
            session_id: "sess-1",
            model_id: "claude-sonnet-4-5",
            version: "0.4.0",
            tokens,
            total_duration: Duration::from_millis(1500),
            api_duration: Duration::from_millis(700),
        })
    }

    #[test]
    fn document_keys_are_in_order() {
        let tokens = TokenTracker::default();
        let json = serde_json::to_string(&input(&tokens)).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"cwd":"/work/repo","session_id":"sess-1","#,
                r#""model":{"id":"claude-sonnet-4-5","display_name":"Sonnet 4.5"},"#,
                r#""workspace":{"current_dir":"/work/repo","project_dir":"/work/repo"},"#,
                r#""version":"0.4.0","output_style":{"name":"default"},"#,
                r#""cost":{"total_cost_usd":0.0,"total_duration_ms":1500,"total_api_duration_ms":700},"#,
                r#""context_window":{"total_input_tokens":0,"total_output_tokens":0,"#,
                r#""context_window_size":200000,"used_percentage":null}}"#
            )
        );
    }

    #[test]
    fn used_percentage_includes_cache() {
        let mut tokens = TokenTracker::default();
        tokens.add_message_start(
            &Usage {
                input_tokens: 1000,
                output_tokens: 0,
                cache_read_input_tokens: 1000,
                cache_creation_input_tokens: 0,
            },
            "claude-sonnet-4-5",
        );
        let doc = input(&tokens);
        assert_eq!(doc.context_window.used_percentage, Some(1.0));
    }

    #[test]
    fn blank_lines_are_removed() {
        assert_eq!(clean_output("\n  a  \n\n   \nb\n\n"), "a\nb");
        assert_eq!(clean_output("   \n"), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_reads_document_from_stdin() {
        let tokens = TokenTracker::default();
        let out = run_status_command(
            "cat | grep -o '\"session_id\":\"[^\"]*\"'",
            &input(&tokens),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(out, r#""session_id":"sess-1""#);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let started = Instant::now();
        let result = run_shell_with_stdin("sleep 10; echo late", b"", Duration::from_millis(200)).await;
        assert!(matches!(result, Err(StatusLineError::Timeout)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_an_error() {
        let result = run_shell_with_stdin("exit 3", b"", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(StatusLineError::Exit(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn multi_line_output_is_kept() {
        let out = run_shell_with_stdin("printf 'one\\n\\ntwo\\n'", b"", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, "one\ntwo");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_yields_no_text_but_empty_output_does() {
        let tokens = TokenTracker::default();
        assert_eq!(render_status_line("exit 3", &input(&tokens)).await, None);
        assert_eq!(
            render_status_line("true", &input(&tokens)).await,
            Some(String::new())
        );
    }
}
