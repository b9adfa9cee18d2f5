//! Per-result truncation against a per-call token budget.
//!
//! Policy: keep a prefix of the content starting at index 0, append a
//! marker stating what was cut, and record the operation. Applied at the
//! moment a result is about to be folded into the ledger, never
//! retroactively to already-appended messages.

use inquest_core::{ToolCallResult, TruncationRecord};
use inquest_tokens::count_text_tokens;
use serde_json::Value;

const CHARS_PER_TOKEN: usize = 4;

fn marker(shown_tokens: u64, original_tokens: u64) -> String {
    format!("\n[Output truncated: showed {shown_tokens} of {original_tokens} tokens]")
}

/// Largest index `<= cut` that falls on a char boundary.
fn floor_char_boundary(text: &str, cut: usize) -> usize {
    if cut >= text.len() {
        return text.len();
    }
    let mut cut = cut;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

/// Shrink `text` to at most `max_tokens`, keeping a prefix.
///
/// Returns `None` when the text already fits. Otherwise returns the marked
/// replacement and the byte offset at which the original was cut. The
/// replacement's token count is `<= max_tokens` whenever the budget leaves
/// room for the marker itself; below that floor the marker alone is
/// returned so the cut is still visible to the model.
#[must_use]
pub fn truncate_text(text: &str, max_tokens: u64) -> Option<(String, usize)> {
    let original_tokens = count_text_tokens(text);
    if original_tokens <= max_tokens {
        return None;
    }

    let budget_chars = usize::try_from(max_tokens).unwrap_or(usize::MAX) * CHARS_PER_TOKEN;
    // Reserve marker space assuming the largest shown count; the real count
    // is never larger, so the final marker is never longer than reserved.
    let reserved = marker(max_tokens, original_tokens).len();
    let keep = floor_char_boundary(text, budget_chars.saturating_sub(reserved));

    let kept = &text[..keep];
    let mut replacement = String::with_capacity(keep + reserved);
    replacement.push_str(kept);
    replacement.push_str(&marker(count_text_tokens(kept), original_tokens));
    Some((replacement, keep))
}

/// Apply the per-call budget to a tool result.
///
/// The payload (or the error text for failed calls) is shrunk in place;
/// a [`TruncationRecord`] is produced only when something was cut.
#[must_use]
pub fn truncate_result(
    result: ToolCallResult,
    max_tokens: u64,
) -> (ToolCallResult, Option<TruncationRecord>) {
    let mut result = result;

    let original = match (&result.data, &result.error) {
        (Some(Value::String(s)), _) => s.clone(),
        (Some(other), _) => other.to_string(),
        (None, Some(err)) => err.clone(),
        (None, None) => return (result, None),
    };

    let Some((replacement, cut)) = truncate_text(&original, max_tokens) else {
        return (result, None);
    };

    let record = TruncationRecord {
        tool_call_id: result.tool_call_id.clone(),
        tool_name: result.tool_name.clone(),
        original_token_count: count_text_tokens(&original),
        start_index: 0,
        end_index: cut,
    };

    if result.data.is_some() {
        result.data = Some(Value::String(replacement));
    } else {
        result.error = Some(replacement);
    }
    (result, Some(record))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
