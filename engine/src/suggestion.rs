//! Next-prompt suggestions shown as the input placeholder after a turn.

use std::sync::LazyLock;

use regex::Regex;

use tern_types::Message;

use crate::agent::CompletionClient;

pub const SUGGESTION_MAX_TOKENS: u32 = 64;

const MAX_WORDS: usize = 12;
const MAX_CHARS: usize = 100;

pub const SUGGESTION_SYSTEM_PROMPT: &str = "You are in suggestion mode. Predict the single next \
message the user is most likely to type into this coding assistant, based on the conversation so \
far. Reply with only that message, written as the user would type it: short, imperative, no \
quotes, no preamble, no explanation. If there is no obvious next step, reply with nothing.";

static MULTI_SENTENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+[A-Z]").ok());

const SINGLE_WORD_ALLOWLIST: &[&str] = &[
    "yes", "yeah", "yep", "sure", "ok", "okay", "push", "commit", "deploy", "stop", "continue",
    "check", "exit", "quit", "no", "nope", "proceed", "retry", "undo", "revert", "test", "build",
    "run", "merge",
];

const META_PHRASES: &[&str] = &[
    "nothing found",
    "nothing to suggest",
    "no suggestion",
    "no obvious",
    "no next step",
    "silence",
    "n/a",
];

const ERROR_MARKERS: &[&str] = &["error", "api key", "rate limit", "unauthorized", "failed to"];

const EVALUATIVE: &[&str] = &[
    "thanks",
    "thank you",
    "looks good",
    "makes sense",
    "great job",
    "nice work",
    "perfect",
    "awesome",
    "lgtm",
];

const ASSISTANT_OPENINGS: &[&str] = &[
    "let me",
    "i'll",
    "i will",
    "i'm going",
    "here's",
    "here is",
    "sure,",
    "certainly",
    "you could",
    "you should",
    "i can",
];

/// Returns the trimmed candidate if it reads like something the user would
/// type next.
#[must_use]
pub fn validate_suggestion(raw: &str) -> Option<String> {
    let text = raw.trim().trim_matches('"').trim();
    if text.is_empty() || text.contains('\n') || text.contains('*') {
        return None;
    }
    if text.chars().count() >= MAX_CHARS {
        return None;
    }
    let lower = text.to_lowercase();
    if lower.trim_end_matches('.') == "done" {
        return None;
    }
    if META_PHRASES.iter().any(|p| lower.contains(p)) {
        return None;
    }
    if ERROR_MARKERS.iter().any(|p| lower.contains(p)) {
        return None;
    }
    if is_labelled(text) {
        return None;
    }
    if MULTI_SENTENCE.as_ref().is_some_and(|re| re.is_match(text)) {
        return None;
    }
    if EVALUATIVE.iter().any(|p| lower.contains(p)) {
        return None;
    }
    if ASSISTANT_OPENINGS.iter().any(|p| lower.starts_with(p)) {
        return None;
    }

    let words = text.split_whitespace().count();
    if words > MAX_WORDS {
        return None;
    }
    if words == 1 && !text.starts_with('/') {
        let word = lower.trim_end_matches(['.', '!', '?']);
        if !SINGLE_WORD_ALLOWLIST.contains(&word) {
            return None;
        }
    }
    Some(text.to_string())
}

/// `Suggestion: ...`, `Next: ...` and similar labelled answers.
fn is_labelled(text: &str) -> bool {
    let Some((label, _)) = text.split_once(':') else {
        return false;
    };
    let label = label.trim();
    !label.is_empty()
        && label.split_whitespace().count() <= 2
        && label.chars().all(|c| c.is_alphabetic() || c == ' ')
        && label.chars().next().is_some_and(char::is_uppercase)
}

/// Asks the model for a suggestion. Failures and invalid output yield `None`.
pub async fn generate_suggestion(
    client: &dyn CompletionClient,
    model: &str,
    messages: Vec<Message>,
) -> Option<String> {
    if messages.is_empty() {
        return None;
    }
    match client
        .complete(model, SUGGESTION_SYSTEM_PROMPT, messages, SUGGESTION_MAX_TOKENS)
        .await
    {
        Ok(text) => validate_suggestion(&text),
        Err(err) => {
            tracing::debug!(%err, "prompt suggestion failed");
            None
        }
    }
}
