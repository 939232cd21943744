//! Model catalog: display names, aliases, context windows and pricing.

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_write: f64,
}

impl Pricing {
    #[must_use]
    pub fn cost_usd(&self, input: u64, output: u64, cache_read: u64, cache_write: u64) -> f64 {
        const PER: f64 = 1_000_000.0;
        (input as f64 * self.input
            + output as f64 * self.output
            + cache_read as f64 * self.cache_read
            + cache_write as f64 * self.cache_write)
            / PER
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub alias: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub context_window: u64,
    pub pricing: Pricing,
}

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// The model `/fast` and the fast-mode setting switch to.
pub const FAST_MODEL: &str = "claude-haiku-4-5";

pub const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;

pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "claude-opus-4-5",
        alias: "opus",
        display_name: "Opus 4.5",
        description: "Most capable for complex work",
        context_window: 200_000,
        pricing: Pricing {
            input: 5.0,
            output: 25.0,
            cache_read: 0.5,
            cache_write: 6.25,
        },
    },
    ModelInfo {
        id: "claude-sonnet-4-5",
        alias: "sonnet",
        display_name: "Sonnet 4.5",
        description: "Best for everyday tasks",
        context_window: 200_000,
        pricing: Pricing {
            input: 3.0,
            output: 15.0,
            cache_read: 0.3,
            cache_write: 3.75,
        },
    },
    ModelInfo {
        id: "claude-haiku-4-5",
        alias: "haiku",
        display_name: "Haiku 4.5",
        description: "Fastest for quick answers",
        context_window: 200_000,
        pricing: Pricing {
            input: 1.0,
            output: 5.0,
            cache_read: 0.1,
            cache_write: 1.25,
        },
    },
    ModelInfo {
        id: "claude-opus-4-1",
        alias: "opus-4.1",
        display_name: "Opus 4.1",
        description: "Previous generation flagship",
        context_window: 200_000,
        pricing: Pricing {
            input: 15.0,
            output: 75.0,
            cache_read: 1.5,
            cache_write: 18.75,
        },
    },
];

/// Finds catalog metadata for a model id.
///
/// Dated snapshot ids (`claude-sonnet-4-5-20250929`) match their base entry.
#[must_use]
pub fn lookup_model(id: &str) -> Option<&'static ModelInfo> {
    let id = id.trim();
    MODELS.iter().find(|m| m.id == id).or_else(|| {
        MODELS
            .iter()
            .filter(|m| {
                id.strip_prefix(m.id)
                    .and_then(|rest| rest.strip_prefix('-'))
                    .is_some_and(|date| !date.is_empty() && date.bytes().all(|b| b.is_ascii_digit()))
            })
            .max_by_key(|m| m.id.len())
    })
}

/// Resolves user input (`opus`, `Sonnet`, a full id) to catalog metadata.
#[must_use]
pub fn resolve_model(input: &str) -> Option<&'static ModelInfo> {
    let needle = input.trim().to_ascii_lowercase();
    MODELS
        .iter()
        .find(|m| m.alias == needle)
        .or_else(|| lookup_model(&needle))
}

#[must_use]
pub fn context_window_for(id: &str) -> u64 {
    lookup_model(id).map_or(DEFAULT_CONTEXT_WINDOW, |m| m.context_window)
}

#[must_use]
pub fn display_name_for(id: &str) -> String {
    lookup_model(id).map_or_else(|| id.to_string(), |m| m.display_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_CONTEXT_WINDOW, FAST_MODEL, context_window_for, display_name_for, lookup_model,
        resolve_model,
    };

    #[test]
    fn dated_ids_match_base_entry() {
        let info = lookup_model("claude-sonnet-4-5-20250929").unwrap();
        assert_eq!(info.id, "claude-sonnet-4-5");
    }

    #[test]
    fn lookup_rejects_non_date_suffix() {
        assert!(lookup_model("claude-sonnet-4-5-turbo").is_none());
    }

    #[test]
    fn aliases_resolve_case_insensitively() {
        assert_eq!(resolve_model("Opus").unwrap().id, "claude-opus-4-5");
        assert_eq!(resolve_model("haiku").unwrap().id, FAST_MODEL);
    }

    #[test]
    fn unknown_model_uses_default_window() {
        assert_eq!(context_window_for("gpt-foo"), DEFAULT_CONTEXT_WINDOW);
        assert_eq!(display_name_for("gpt-foo"), "gpt-foo");
    }

    #[test]
    fn pricing_is_per_million() {
        let info = lookup_model("claude-sonnet-4-5").unwrap();
        let cost = info.pricing.cost_usd(1_000_000, 0, 0, 0);
        assert!((cost - 3.0).abs() < 1e-9);
    }
}
