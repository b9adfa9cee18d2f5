//! Per-model context window limits.

use serde::{Deserialize, Serialize};

/// Context budget for one model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLimits {
    /// Context window size in tokens.
    pub max_tokens: u64,
    /// Tokens reserved for the next completion.
    pub max_output_tokens: u64,
}

/// Limits applied when a model id matches no known family.
pub const DEFAULT_LIMITS: ModelLimits = ModelLimits {
    max_tokens: 128_000,
    max_output_tokens: 4_096,
};

/// Known model families, matched by id prefix. Longest prefix wins.
const FAMILY_LIMITS: &[(&str, ModelLimits)] = &[
    (
        "gpt-4o-mini",
        ModelLimits {
            max_tokens: 128_000,
            max_output_tokens: 16_384,
        },
    ),
    (
        "gpt-4o",
        ModelLimits {
            max_tokens: 128_000,
            max_output_tokens: 16_384,
        },
    ),
    (
        "gpt-4.1",
        ModelLimits {
            max_tokens: 1_047_576,
            max_output_tokens: 32_768,
        },
    ),
    (
        "gpt-5",
        ModelLimits {
            max_tokens: 272_000,
            max_output_tokens: 128_000,
        },
    ),
    (
        "o3",
        ModelLimits {
            max_tokens: 200_000,
            max_output_tokens: 100_000,
        },
    ),
    (
        "o4-mini",
        ModelLimits {
            max_tokens: 200_000,
            max_output_tokens: 100_000,
        },
    ),
    (
        "claude-",
        ModelLimits {
            max_tokens: 200_000,
            max_output_tokens: 8_192,
        },
    ),
    (
        "gemini-",
        ModelLimits {
            max_tokens: 1_048_576,
            max_output_tokens: 8_192,
        },
    ),
    (
        "llama",
        ModelLimits {
            max_tokens: 131_072,
            max_output_tokens: 4_096,
        },
    ),
];

impl ModelLimits {
    /// Explicit limits.
    #[must_use]
    pub fn new(max_tokens: u64, max_output_tokens: u64) -> Self {
        Self {
            max_tokens,
            max_output_tokens,
        }
    }

    /// Limits for a model id, by longest matching family prefix.
    #[must_use]
    pub fn for_model(model_id: &str) -> Self {
        let id = model_id.to_ascii_lowercase();
        FAMILY_LIMITS
            .iter()
            .filter(|(prefix, _)| id.starts_with(prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(DEFAULT_LIMITS, |(_, limits)| *limits)
    }

    /// Budget available for conversation input once output is reserved.
    #[must_use]
    pub fn input_budget(&self) -> u64 {
        self.max_tokens.saturating_sub(self.max_output_tokens)
    }

    /// Same limits with a smaller output reservation.
    #[must_use]
    pub fn with_max_output_tokens(mut self, max_output_tokens: u64) -> Self {
        self.max_output_tokens = max_output_tokens.min(self.max_tokens);
        self
    }
}

impl Default for ModelLimits {
    fn default() -> Self {
        DEFAULT_LIMITS
    }
}
