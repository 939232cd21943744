//! Anthropic Messages API client.
//!
//! - [`AnthropicClient::stream`] sends a request with `stream: true` and
//!   reports every SSE event to a [`tern_types::StreamHandler`] in wire order,
//!   returning the assembled assistant message.
//! - [`AnthropicClient::complete`] sends a small non-streaming request and
//!   returns the first text block (used for prompt suggestions).
//!
//! Transport failures, HTTP errors, and in-stream `error` events surface as
//! [`ProviderError`]. In-stream errors are also reported through
//! `StreamHandler::on_error` so partial output stays visible.

mod anthropic;
pub mod retry;
mod sse;
pub mod sse_types;

use std::time::Duration;

use thiserror::Error;

pub use anthropic::{AnthropicClient, MessagesRequest, StreamOutcome, ToolDefinition};
pub use tern_types;

/// Canonical Anthropic Messages API endpoint.
pub const MESSAGES_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const STREAM_IDLE_TIMEOUT_SECS: u64 = 90;
const TCP_KEEPALIVE_SECS: u64 = 60;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request failed after {attempts} attempts: {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("{0}")]
    Stream(String),
    #[error("stream idle for {0:?}")]
    IdleTimeout(Duration),
    #[error("response contained no text")]
    EmptyResponse,
}

fn client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
}

/// Reads at most [`MAX_ERROR_BODY_BYTES`] of an error response body.
async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            return format!("{}...(truncated)", String::from_utf8_lossy(&body));
        }
    }
    api_error_message(&String::from_utf8_lossy(&body))
}

/// Pulls `error.message` out of an Anthropic error body, else returns it raw.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
