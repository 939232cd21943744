//! Token and cost accounting across a session.

use tern_types::{Usage, lookup_model};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenTracker {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read: u64,
    pub cache_write: u64,
    pub turn_count: u64,
    pub cost_usd: f64,
    /// Context size of the most recent request, cache included.
    pub last_context: u64,
}

impl TokenTracker {
    /// Records the input side of a streamed message.
    pub fn add_message_start(&mut self, usage: &Usage, model_id: &str) {
        self.input_tokens += usage.input_tokens;
        self.cache_read += usage.cache_read_input_tokens;
        self.cache_write += usage.cache_creation_input_tokens;
        self.last_context =
            usage.input_tokens + usage.cache_read_input_tokens + usage.cache_creation_input_tokens;
        self.cost_usd += cost_delta(
            model_id,
            usage.input_tokens,
            0,
            usage.cache_read_input_tokens,
            usage.cache_creation_input_tokens,
        );
    }

    /// Records output tokens and counts the turn.
    pub fn add_message_delta(&mut self, output_tokens: u64, model_id: &str) {
        self.output_tokens += output_tokens;
        self.turn_count += 1;
        self.cost_usd += cost_delta(model_id, 0, output_tokens, 0, 0);
    }

    /// Input tokens including cache reads and writes.
    #[must_use]
    pub fn context_tokens(&self) -> u64 {
        self.input_tokens + self.cache_read + self.cache_write
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.context_tokens() == 0 && self.output_tokens == 0
    }

    /// Percentage of `window` used, or `None` before any tokens are seen.
    #[must_use]
    pub fn used_percentage(&self, window: u64) -> Option<f64> {
        if self.is_empty() || window == 0 {
            return None;
        }
        Some(100.0 * self.context_tokens() as f64 / window as f64)
    }

    /// Whether the last request filled at least `threshold` percent of
    /// `window`.
    #[must_use]
    pub fn context_exceeds(&self, window: u64, threshold: f64) -> bool {
        window > 0 && 100.0 * self.last_context as f64 / window as f64 >= threshold
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn cost_delta(model_id: &str, input: u64, output: u64, cache_read: u64, cache_write: u64) -> f64 {
    lookup_model(model_id).map_or(0.0, |info| {
        info.pricing.cost_usd(input, output, cache_read, cache_write)
    })
}

/// Compact token count: `950`, `12.3k`, `1.2M`.
#[must_use]
pub fn format_tokens(n: u64) -> String {
    match n {
        0..1_000 => n.to_string(),
        1_000..1_000_000 => format!("{:.1}k", n as f64 / 1_000.0),
        _ => format!("{:.1}M", n as f64 / 1_000_000.0),
    }
}

#[cfg(test)]
mod tests {
    use tern_types::Usage;

    use super::{TokenTracker, format_tokens};

    fn usage(input: u64, cache_read: u64, cache_write: u64) -> Usage {
        Usage {
            input_tokens: input,
            output_tokens: 0,
            cache_read_input_tokens: cache_read,
            cache_creation_input_tokens: cache_write,
        }
    }

    #[test]
    fn message_start_accumulates_input_and_cache() {
        let mut tracker = TokenTracker::default();
        tracker.add_message_start(&usage(1_000_000, 0, 0), "claude-sonnet-4-5");
        tracker.add_message_start(&usage(10, 20, 30), "claude-sonnet-4-5");
        assert_eq!(tracker.input_tokens, 1_000_010);
        assert_eq!(tracker.cache_read, 20);
        assert_eq!(tracker.cache_write, 30);
        assert!(tracker.cost_usd > 3.0);
    }

    #[test]
    fn message_delta_counts_turns() {
        let mut tracker = TokenTracker::default();
        tracker.add_message_delta(1_000_000, "claude-sonnet-4-5");
        assert_eq!(tracker.turn_count, 1);
        assert!((tracker.cost_usd - 15.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_records_tokens_without_cost() {
        let mut tracker = TokenTracker::default();
        tracker.add_message_start(&usage(500, 0, 0), "mystery-model");
        tracker.add_message_delta(100, "mystery-model");
        assert_eq!(tracker.input_tokens, 500);
        assert_eq!(tracker.output_tokens, 100);
        assert!(tracker.cost_usd.abs() < f64::EPSILON);
    }

    #[test]
    fn used_percentage_is_none_until_tokens_seen() {
        let mut tracker = TokenTracker::default();
        assert_eq!(tracker.used_percentage(200_000), None);
        tracker.add_message_start(&usage(1_000, 500, 500), "claude-sonnet-4-5");
        let pct = tracker.used_percentage(200_000).unwrap();
        assert!((pct - 1.0).abs() < 1e-9);
    }

    #[test]
    fn context_check_uses_the_latest_request_only() {
        let mut tracker = TokenTracker::default();
        tracker.add_message_start(&usage(100_000, 60_000, 0), "claude-sonnet-4-5");
        assert!(tracker.context_exceeds(200_000, 80.0));
        tracker.add_message_start(&usage(5_000, 0, 0), "claude-sonnet-4-5");
        assert!(!tracker.context_exceeds(200_000, 80.0));
        assert!(!tracker.context_exceeds(0, 80.0));
    }

    #[test]
    fn token_formatting() {
        assert_eq!(format_tokens(950), "950");
        assert_eq!(format_tokens(12_345), "12.3k");
        assert_eq!(format_tokens(1_200_000), "1.2M");
    }
}
