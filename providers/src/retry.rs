//! HTTP retry policy with exponential backoff.
//!
//! - Max retries: 2 (3 total attempts)
//! - Initial delay: 500ms, doubling, capped at 8s
//! - Down-jitter up to 25%
//! - Retries HTTP 408, 409, 429, 5xx and connection errors
//! - `retry-after-ms` / `retry-after` headers override the computed delay

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response, StatusCode};
use uuid::Uuid;

use crate::ProviderError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

/// Server-provided delay, accepted only when `0 < delay < 60s`.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let in_range = |d: Duration| d > Duration::ZERO && d < Duration::from_secs(60);

    let from_ms = headers
        .get("retry-after-ms")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .map(|ms| Duration::from_secs_f64(ms / 1000.0))
        .filter(|d| in_range(*d));
    if from_ms.is_some() {
        return from_ms;
    }

    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .filter(|d| in_range(*d))
}

#[must_use]
pub fn should_retry(status: StatusCode, headers: &HeaderMap) -> bool {
    if let Some(val) = headers.get("x-should-retry").and_then(|v| v.to_str().ok()) {
        if val.eq_ignore_ascii_case("true") {
            return true;
        }
        if val.eq_ignore_ascii_case("false") {
            return false;
        }
    }
    matches!(status.as_u16(), 408 | 409 | 429 | 500..=599)
}

/// `backoff_step` is 0 before the first retry.
#[must_use]
pub fn calculate_retry_delay(
    backoff_step: u32,
    config: &RetryConfig,
    headers: Option<&HeaderMap>,
) -> Duration {
    if let Some(delay) = headers.and_then(parse_retry_after) {
        return delay;
    }
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(config.max_delay.as_secs_f64());
    let jitter = 1.0 - rand::random::<f64>() * config.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}

/// Sends with retries and returns the final response, successful or not.
///
/// `build_request` is called once per attempt. All attempts share one
/// `Idempotency-Key`.
pub async fn send_with_retry<F>(build_request: F, config: &RetryConfig) -> Result<Response, ProviderError>
where
    F: Fn() -> RequestBuilder,
{
    let idempotency_key = format!("tern-retry-{}", Uuid::new_v4());
    let mut attempt: u32 = 0;
    loop {
        let request = build_request()
            .header("x-retry-count", attempt.to_string())
            .header("idempotency-key", &idempotency_key);
        let can_retry = attempt < config.max_retries;

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || !can_retry || !should_retry(status, response.headers()) {
                    return Ok(response);
                }
                let delay = calculate_retry_delay(attempt, config, Some(response.headers()));
                tracing::debug!(%status, attempt, delay_ms = delay.as_millis(), "retrying after error status");
                tokio::time::sleep(delay).await;
            }
            Err(source) => {
                let retryable = source.is_connect() || source.is_timeout() || source.is_request();
                if !can_retry || !retryable {
                    return Err(ProviderError::Connection {
                        attempts: attempt + 1,
                        source,
                    });
                }
                let delay = calculate_retry_delay(attempt, config, None);
                tracing::debug!(attempt, delay_ms = delay.as_millis(), "retrying after connection error: {source}");
                tokio::time::sleep(delay).await;
            }
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::{RetryConfig, calculate_retry_delay, parse_retry_after, should_retry};

    #[test]
    fn retryable_statuses() {
        let headers = HeaderMap::new();
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS, &headers));
        assert!(should_retry(StatusCode::BAD_GATEWAY, &headers));
        assert!(should_retry(StatusCode::from_u16(529).unwrap(), &headers));
        assert!(!should_retry(StatusCode::BAD_REQUEST, &headers));
        assert!(!should_retry(StatusCode::UNAUTHORIZED, &headers));
    }

    #[test]
    fn header_override_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-should-retry", HeaderValue::from_static("false"));
        assert!(!should_retry(StatusCode::SERVICE_UNAVAILABLE, &headers));
        headers.insert("x-should-retry", HeaderValue::from_static("true"));
        assert!(should_retry(StatusCode::BAD_REQUEST, &headers));
    }

    #[test]
    fn retry_after_ms_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after-ms", HeaderValue::from_static("1500"));
        headers.insert("retry-after", HeaderValue::from_static("9"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn retry_after_out_of_range_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("120"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn backoff_is_capped_and_jittered() {
        let config = RetryConfig::default();
        for step in 0..10 {
            let delay = calculate_retry_delay(step, &config, None);
            assert!(delay <= config.max_delay);
            assert!(delay >= Duration::from_millis(375).min(config.max_delay.mul_f64(0.75)));
        }
    }
}
