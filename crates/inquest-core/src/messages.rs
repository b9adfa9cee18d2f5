//! Conversation messages and roles.
//!
//! A [`Message`] is one entry in the ledger. Assistant messages may carry
//! tool call requests; tool-role messages must reference the request they
//! answer via `tool_call_id`. The same shape is used on the wire when a
//! client resubmits a conversation to resume a paused session.

use serde::{Deserialize, Serialize};

use crate::ids::ToolCallId;
use crate::tools::{ToolCallRequest, ToolCallResult};

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Investigation framing, injected once at position 0.
    System,
    /// The operator's question or follow-up.
    User,
    /// Model output: analysis text and/or tool call requests.
    Assistant,
    /// Output of a dispatched tool call.
    Tool,
}

impl Role {
    /// Lowercase wire name for this role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// One entry in the conversation ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author of this entry.
    pub role: Role,
    /// Text content. Absent on assistant messages that only request tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool call requests, in the order the model issued them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    /// For tool-role messages, the request this result answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<ToolCallId>,
}

impl Message {
    /// System message carrying the investigation framing.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// User message carrying the operator's question.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant message with text only.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant message carrying tool call requests (and optional text).
    #[must_use]
    pub fn assistant_with_tool_calls(
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Tool-role message folding a terminal result into the conversation.
    #[must_use]
    pub fn tool_result(result: &ToolCallResult) -> Self {
        Self {
            role: Role::Tool,
            content: Some(result.content_for_ledger()),
            tool_calls: None,
            tool_call_id: Some(result.tool_call_id.clone()),
        }
    }

    /// Whether this message carries at least one tool call request.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Ids of the tool calls this message requests, in issue order.
    #[must_use]
    pub fn tool_call_ids(&self) -> Vec<ToolCallId> {
        self.tool_calls
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|c| c.id.clone())
            .collect()
    }

    /// Text content, or empty string when absent.
    #[must_use]
    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
