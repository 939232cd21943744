//! One-line summaries of tool calls.

use serde_json::Value;
use tern_types::truncate_with_ellipsis;
use tern_utils::{EditLine, edit_lines};

const COMMAND_MAX_CHARS: usize = 200;

/// Short human-readable description of a tool call, empty for unknown tools.
#[must_use]
pub fn summarize_tool(name: &str, input: &Value) -> String {
    let field = |key: &str| input.get(key).and_then(Value::as_str).unwrap_or_default();
    match name {
        "Bash" => {
            let command = field("command");
            if command.is_empty() {
                String::new()
            } else {
                format!("$ {}", truncate_with_ellipsis(command, COMMAND_MAX_CHARS))
            }
        }
        "FileRead" | "FileEdit" | "FileWrite" | "Read" | "Edit" | "Write" => {
            field("file_path").to_string()
        }
        "Glob" => field("pattern").to_string(),
        "Grep" => {
            let pattern = field("pattern");
            if pattern.is_empty() {
                String::new()
            } else {
                format!("/{pattern}/")
            }
        }
        "WebFetch" => field("url").to_string(),
        "WebSearch" => format!("searching: {}", field("query")),
        "TodoWrite" => "updating task list".to_string(),
        _ => String::new(),
    }
}

/// Summary for verbose output: Bash commands untruncated, every other tool
/// with its full input JSON.
#[must_use]
pub fn verbose_summary(name: &str, input: &Value) -> String {
    if let Some(command) = input.get("command").and_then(Value::as_str).filter(|_| name == "Bash") {
        return format!("$ {command}");
    }
    match input.as_object() {
        Some(map) if map.is_empty() => String::new(),
        _ => input.to_string(),
    }
}

/// Parses raw tool input JSON, treating malformed or empty input as `{}`.
#[must_use]
pub fn parse_tool_input(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|err| {
        tracing::debug!(%err, "tool input is not valid JSON");
        Value::Object(serde_json::Map::new())
    })
}

/// Removed and added lines for edit tools; empty for everything else.
#[must_use]
pub fn edit_preview(name: &str, input: &Value) -> Vec<EditLine> {
    if !matches!(name, "FileEdit" | "Edit") {
        return Vec::new();
    }
    let old = input.get("old_string").and_then(Value::as_str).unwrap_or_default();
    let new = input.get("new_string").and_then(Value::as_str).unwrap_or_default();
    edit_lines(old, new)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tern_utils::EditLine;

    use super::{edit_preview, parse_tool_input, summarize_tool, verbose_summary};

    #[test]
    fn bash_prefixes_dollar() {
        assert_eq!(summarize_tool("Bash", &json!({"command": "ls -la"})), "$ ls -la");
    }

    #[test]
    fn verbose_keeps_full_input() {
        let command = "x".repeat(300);
        let summary = verbose_summary("Bash", &json!({ "command": command }));
        assert_eq!(summary.chars().count(), 2 + 300);
        assert_eq!(
            verbose_summary("Glob", &json!({"pattern": "**/*.rs"})),
            r#"{"pattern":"**/*.rs"}"#
        );
        assert_eq!(verbose_summary("Mystery", &json!({})), "");
    }

    #[test]
    fn long_bash_command_is_truncated() {
        let command = "x".repeat(300);
        let summary = summarize_tool("Bash", &json!({ "command": command }));
        assert_eq!(summary.chars().count(), 2 + 200);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn file_tools_show_path() {
        for tool in ["FileRead", "FileEdit", "FileWrite"] {
            assert_eq!(
                summarize_tool(tool, &json!({"file_path": "/tmp/a.rs"})),
                "/tmp/a.rs"
            );
        }
    }

    #[test]
    fn search_tools() {
        assert_eq!(summarize_tool("Glob", &json!({"pattern": "**/*.rs"})), "**/*.rs");
        assert_eq!(summarize_tool("Grep", &json!({"pattern": "fn main"})), "/fn main/");
        assert_eq!(
            summarize_tool("WebSearch", &json!({"query": "rust async"})),
            "searching: rust async"
        );
        assert_eq!(
            summarize_tool("WebFetch", &json!({"url": "https://example.com"})),
            "https://example.com"
        );
        assert_eq!(summarize_tool("TodoWrite", &json!({})), "updating task list");
    }

    #[test]
    fn unknown_tool_is_empty() {
        assert_eq!(summarize_tool("Mystery", &json!({"command": "x"})), "");
    }

    #[test]
    fn malformed_input_becomes_empty_object() {
        assert_eq!(parse_tool_input("{not json"), json!({}));
        assert_eq!(parse_tool_input(""), json!({}));
    }

    #[test]
    fn file_edit_renders_changed_lines() {
        let input = json!({"file_path": "a", "old_string": "foo", "new_string": "bar"});
        assert_eq!(
            edit_preview("FileEdit", &input),
            vec![EditLine::Removed("foo".into()), EditLine::Added("bar".into())]
        );
        assert!(edit_preview("FileWrite", &input).is_empty());
    }
}
