//! Pure token counting over messages, ledgers, and tool schemas.
//!
//! Formula: `tokens = ceil(chars / 4)`, plus a small per-message overhead
//! for the role and structural framing. Tool call requests count their id,
//! name, and serialized parameters; tool schemas count their full JSON
//! serialization, since that is what the provider actually transmits.

use inquest_core::{Message, MessageLedger, Role, TokenUsageSnapshot, ToolSchema};

use crate::limits::ModelLimits;

/// Divisor for the chars → tokens approximation.
const CHARS_PER_TOKEN: usize = 4;

/// Structural framing overhead per message, in chars.
const MESSAGE_OVERHEAD_CHARS: usize = 10;

fn chars_to_tokens(chars: usize) -> u64 {
    chars.div_ceil(CHARS_PER_TOKEN) as u64
}

/// Token count for a bare string.
#[must_use]
pub fn count_text_tokens(text: &str) -> u64 {
    chars_to_tokens(text.len())
}

/// Token count for one message, including role and framing overhead.
#[must_use]
pub fn count_message_tokens(message: &Message) -> u64 {
    let mut chars = message.role.as_str().len() + MESSAGE_OVERHEAD_CHARS;
    if let Some(content) = &message.content {
        chars += content.len();
    }
    for call in message.tool_calls.as_deref().unwrap_or_default() {
        chars += call.id.as_str().len();
        chars += call.tool_name.len();
        chars += serde_json::to_string(&call.parameters).map_or(0, |s| s.len());
    }
    if let Some(id) = &message.tool_call_id {
        chars += id.as_str().len();
    }
    chars_to_tokens(chars)
}

/// Token count for the tool schemas advertised to the model.
#[must_use]
pub fn count_tool_schema_tokens(tools: &[ToolSchema]) -> u64 {
    let chars: usize = tools
        .iter()
        .map(|t| serde_json::to_string(t).map_or(0, |s| s.len()))
        .sum();
    chars_to_tokens(chars)
}

/// Full usage snapshot for a ledger against a model's limits.
///
/// Pure function of its inputs: identical ledger, tools, and limits always
/// produce an identical snapshot.
#[must_use]
pub fn usage_snapshot(
    ledger: &MessageLedger,
    tools: &[ToolSchema],
    limits: ModelLimits,
) -> TokenUsageSnapshot {
    let mut snapshot = TokenUsageSnapshot {
        tool_definition_tokens: count_tool_schema_tokens(tools),
        max_tokens: limits.max_tokens,
        max_output_tokens: limits.max_output_tokens,
        ..TokenUsageSnapshot::default()
    };
    for message in ledger {
        let tokens = count_message_tokens(message);
        match message.role {
            Role::System => snapshot.system_tokens += tokens,
            Role::User => snapshot.user_tokens += tokens,
            Role::Assistant => snapshot.assistant_tokens += tokens,
            Role::Tool => snapshot.tool_result_tokens += tokens,
        }
    }
    snapshot.total_tokens = snapshot.system_tokens
        + snapshot.user_tokens
        + snapshot.assistant_tokens
        + snapshot.tool_definition_tokens
        + snapshot.tool_result_tokens;
    snapshot
}
