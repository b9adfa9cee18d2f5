//! Whole-ledger compaction against the model's context window.
//!
//! Invoked when cumulative usage plus the output reservation no longer
//! fits `max_tokens`. The system message and a recent tail are preserved
//! verbatim; older tool result bodies are replaced with short omission
//! markers. Assistant and user messages are never altered, so the
//! conversational skeleton the model reasons over stays coherent.
//!
//! Two properties hold unconditionally: the result never counts more
//! tokens than the input, and re-running on an already-compacted sequence
//! is the identity (markers are never re-summarized, and the replacement
//! guard uses a fixed threshold so no second pass can fire).

use inquest_core::{Message, Role};
use inquest_tokens::{count_message_tokens, ModelLimits};

use crate::constants::{is_omission_marker, omission_marker};

/// Result of one compaction run.
#[derive(Clone, Debug, PartialEq)]
pub struct CompactionOutcome {
    /// The compacted sequence, same length and roles as the input.
    pub messages: Vec<Message>,
    /// How many tool result bodies were replaced this run.
    pub omitted: usize,
    /// Ledger token total before the run.
    pub initial_tokens: u64,
    /// Ledger token total after the run.
    pub compacted_tokens: u64,
}

impl CompactionOutcome {
    /// Whether this run changed anything.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.omitted > 0
    }

    /// Event text summarizing the run.
    #[must_use]
    pub fn summary(&self) -> String {
        omission_marker(self.omitted)
    }
}

/// First index of the tail that fits within `preserve_budget`.
///
/// Walks back from the newest message; index 0 is excluded because the
/// system message is preserved unconditionally, not as part of the tail.
fn tail_start(messages: &[Message], preserve_budget: u64) -> usize {
    let mut start = messages.len();
    let mut used = 0u64;
    while start > 1 {
        let tokens = count_message_tokens(&messages[start - 1]);
        if used + tokens > preserve_budget {
            break;
        }
        used += tokens;
        start -= 1;
    }
    start
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn preserve_budget(limits: ModelLimits, preserve_fraction: f64) -> u64 {
    let fraction = preserve_fraction.clamp(0.0, 1.0);
    (limits.input_budget() as f64 * fraction) as u64
}

/// Compact a message sequence to fit the context window.
///
/// Pure function: the caller swaps the outcome into the ledger (and emits
/// the compaction event) only when [`CompactionOutcome::changed`].
#[must_use]
pub fn compact(
    messages: &[Message],
    limits: ModelLimits,
    preserve_fraction: f64,
) -> CompactionOutcome {
    let initial_tokens = messages.iter().map(count_message_tokens).sum();
    let mut compacted = messages.to_vec();
    let mut omitted = 0usize;

    if compacted.len() > 1 {
        let tail = tail_start(messages, preserve_budget(limits, preserve_fraction));
        let marker = omission_marker(1);
        for message in &mut compacted[1..tail] {
            if message.role != Role::Tool {
                continue;
            }
            let body = message.content_str();
            // Replace only when it strictly shrinks; the fixed threshold
            // makes the decision stable across repeated runs.
            if !is_omission_marker(body) && body.len() > marker.len() {
                message.content = Some(marker.clone());
                omitted += 1;
            }
        }
    }

    let compacted_tokens = compacted.iter().map(count_message_tokens).sum();
    CompactionOutcome {
        messages: compacted,
        omitted,
        initial_tokens,
        compacted_tokens,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
