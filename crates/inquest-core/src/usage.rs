//! Point-in-time token accounting against a model's context window.

use serde::{Deserialize, Serialize};

/// Token usage at one instant, broken down by role.
///
/// Recomputed after every ledger mutation; carries the model limits it was
/// measured against so a snapshot is meaningful on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsageSnapshot {
    /// Tokens in the system message.
    pub system_tokens: u64,
    /// Tokens across user messages.
    pub user_tokens: u64,
    /// Tokens across assistant messages, including tool call requests.
    pub assistant_tokens: u64,
    /// Tokens spent on the tool schemas advertised to the model.
    pub tool_definition_tokens: u64,
    /// Tokens across tool-role result messages.
    pub tool_result_tokens: u64,
    /// Sum of all of the above.
    pub total_tokens: u64,
    /// The model's context window size.
    pub max_tokens: u64,
    /// Tokens reserved for the next completion.
    pub max_output_tokens: u64,
}

impl TokenUsageSnapshot {
    /// Budget available for conversation input once output is reserved.
    #[must_use]
    pub fn input_budget(&self) -> u64 {
        self.max_tokens.saturating_sub(self.max_output_tokens)
    }

    /// Whether the next completion would not fit the context window.
    ///
    /// This is the compaction trigger: the conversation plus the reserved
    /// output no longer fits in `max_tokens`.
    #[must_use]
    pub fn over_budget(&self) -> bool {
        self.total_tokens + self.max_output_tokens > self.max_tokens
    }
}
