//! Streaming wire protocol served to investigation clients.
//!
//! Every state transition of an investigation is serialized as exactly one
//! [`InvestigationEvent`] frame. Consumers observe a strictly ordered
//! sequence per session; the terminal frame is always `ai_answer_end` or
//! `error`, never silence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ToolCallId;
use crate::messages::Role;
use crate::tools::{ToolCallRequest, ToolCallResult, ToolResultStatus, TruncationRecord};
use crate::usage::TokenUsageSnapshot;

// ─────────────────────────────────────────────────────────────────────────────
// Error codes
// ─────────────────────────────────────────────────────────────────────────────

/// Numeric `error_code` values carried by terminal `error` frames.
pub mod codes {
    /// Unclassified internal failure.
    pub const GENERIC: u16 = 1000;
    /// The model provider failed after retries were exhausted.
    pub const PROVIDER: u16 = 2000;
    /// A protocol or ledger invariant was violated.
    pub const INVARIANT: u16 = 3000;
    /// The event backlog overflowed because the consumer stalled.
    pub const BACKLOG_OVERFLOW: u16 = 4000;
    /// The session was cancelled before reaching a terminal state.
    pub const CANCELLED: u16 = 4900;
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload fragments
// ─────────────────────────────────────────────────────────────────────────────

/// The `result` object nested inside a `tool_calling_result` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPayload {
    /// Execution status.
    pub status: ToolResultStatus,
    /// Output payload, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error message, present on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Parameters the call was invoked with.
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

impl From<&ToolCallResult> for ToolResultPayload {
    fn from(result: &ToolCallResult) -> Self {
        Self {
            status: result.status,
            data: result.data.clone(),
            error: result.error.clone(),
            params: result.params.clone(),
        }
    }
}

/// One entry of an `approval_required` frame's `pending_approvals` list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    /// The call awaiting a decision.
    pub tool_call_id: ToolCallId,
    /// Name of the sensitive tool.
    pub tool_name: String,
    /// Human-readable summary of what would be executed.
    pub description: String,
    /// Parameters the call would be invoked with.
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

/// Metadata block attached to several frame kinds.
///
/// All fields are optional; frames populate the subset that applies.
/// `truncations` must accompany any frame following a truncation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Full per-role usage breakdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsageSnapshot>,
    /// Total tokens currently in the conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    /// Model context window size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Tokens reserved for the next completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
    /// Token total before compaction ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_tokens: Option<u64>,
    /// Token total after compaction ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compacted_tokens: Option<u64>,
    /// Shrink operations applied since the previous frame carrying them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub truncations: Vec<TruncationRecord>,
}

impl EventMetadata {
    /// Metadata with no fields populated.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Metadata for a `token_count` frame.
    #[must_use]
    pub fn for_usage(usage: TokenUsageSnapshot) -> Self {
        Self {
            tokens: Some(usage.total_tokens),
            max_tokens: Some(usage.max_tokens),
            max_output_tokens: Some(usage.max_output_tokens),
            usage: Some(usage),
            ..Self::default()
        }
    }

    /// Metadata for a `conversation_history_compacted` frame.
    #[must_use]
    pub fn for_compaction(initial_tokens: u64, compacted_tokens: u64) -> Self {
        Self {
            initial_tokens: Some(initial_tokens),
            compacted_tokens: Some(compacted_tokens),
            ..Self::default()
        }
    }

    /// Attach truncation records to this metadata block.
    #[must_use]
    pub fn with_truncations(mut self, truncations: Vec<TruncationRecord>) -> Self {
        self.truncations = truncations;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// One frame of the investigation stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvestigationEvent {
    /// A tool call is about to execute. Emitted once per dispatched request.
    StartToolCalling {
        /// Name of the tool being invoked.
        tool_name: String,
        /// Id of the call.
        id: ToolCallId,
    },

    /// A tool call reached a status worth reporting (terminal or pending).
    ToolCallingResult {
        /// The call this result answers.
        tool_call_id: ToolCallId,
        /// Always `tool`.
        role: Role,
        /// Human-readable summary of what was executed.
        description: String,
        /// Name of the tool.
        name: String,
        /// The outcome itself.
        result: ToolResultPayload,
    },

    /// Assistant narration emitted before tool calls run.
    AiMessage {
        /// Assistant text, absent when the turn was tool calls only.
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        /// Model reasoning text when the provider surfaces it.
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
        /// Frame metadata.
        metadata: EventMetadata,
    },

    /// Sensitive calls await decisions; the stream pauses after this frame.
    ApprovalRequired {
        /// Always `true`.
        requires_approval: bool,
        /// Every call still pending, in request order.
        pending_approvals: Vec<PendingApproval>,
    },

    /// Usage accounting after a fold.
    TokenCount {
        /// Carries `usage`, `tokens`, `max_tokens`, `max_output_tokens`.
        metadata: EventMetadata,
    },

    /// The ledger was compacted to fit the context window.
    ConversationHistoryCompacted {
        /// Human-readable note about what was compacted.
        content: String,
        /// Number of messages in the compacted ledger.
        messages: usize,
        /// Carries `initial_tokens` and `compacted_tokens`.
        metadata: EventMetadata,
    },

    /// Terminal frame on success.
    AiAnswerEnd {
        /// Final free-form analysis, when the answer is plain text.
        #[serde(skip_serializing_if = "Option::is_none")]
        analysis: Option<String>,
        /// Final structured report, when the answer is a section mapping.
        #[serde(skip_serializing_if = "Option::is_none")]
        sections: Option<serde_json::Map<String, Value>>,
        /// Frame metadata.
        metadata: EventMetadata,
    },

    /// Terminal frame on failure.
    Error {
        /// What failed.
        description: String,
        /// Numeric code from [`codes`].
        error_code: u16,
        /// Underlying error message.
        msg: String,
        /// Always `false`.
        success: bool,
    },
}

impl InvestigationEvent {
    /// Frame announcing a dispatched call.
    #[must_use]
    pub fn start_tool_calling(request: &ToolCallRequest) -> Self {
        Self::StartToolCalling {
            tool_name: request.tool_name.clone(),
            id: request.id.clone(),
        }
    }

    /// Frame reporting a tool call outcome.
    #[must_use]
    pub fn tool_calling_result(result: &ToolCallResult) -> Self {
        Self::ToolCallingResult {
            tool_call_id: result.tool_call_id.clone(),
            role: Role::Tool,
            description: result.description.clone(),
            name: result.tool_name.clone(),
            result: ToolResultPayload::from(result),
        }
    }

    /// Frame carrying assistant narration.
    #[must_use]
    pub fn ai_message(
        content: Option<String>,
        reasoning: Option<String>,
        metadata: EventMetadata,
    ) -> Self {
        Self::AiMessage {
            content,
            reasoning,
            metadata,
        }
    }

    /// Frame pausing the stream on pending approvals.
    #[must_use]
    pub fn approval_required(pending_approvals: Vec<PendingApproval>) -> Self {
        Self::ApprovalRequired {
            requires_approval: true,
            pending_approvals,
        }
    }

    /// Frame carrying post-fold accounting.
    #[must_use]
    pub fn token_count(metadata: EventMetadata) -> Self {
        Self::TokenCount { metadata }
    }

    /// Frame announcing a compaction run.
    #[must_use]
    pub fn history_compacted(content: String, messages: usize, metadata: EventMetadata) -> Self {
        Self::ConversationHistoryCompacted {
            content,
            messages,
            metadata,
        }
    }

    /// Terminal frame with a plain-text analysis.
    #[must_use]
    pub fn answer_analysis(analysis: impl Into<String>, metadata: EventMetadata) -> Self {
        Self::AiAnswerEnd {
            analysis: Some(analysis.into()),
            sections: None,
            metadata,
        }
    }

    /// Terminal frame with a structured section mapping.
    #[must_use]
    pub fn answer_sections(
        sections: serde_json::Map<String, Value>,
        metadata: EventMetadata,
    ) -> Self {
        Self::AiAnswerEnd {
            analysis: None,
            sections: Some(sections),
            metadata,
        }
    }

    /// Terminal error frame.
    #[must_use]
    pub fn error(error_code: u16, description: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Error {
            description: description.into(),
            error_code,
            msg: msg.into(),
            success: false,
        }
    }

    /// Wire name of this frame kind (also used as the SSE event name).
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::StartToolCalling { .. } => "start_tool_calling",
            Self::ToolCallingResult { .. } => "tool_calling_result",
            Self::AiMessage { .. } => "ai_message",
            Self::ApprovalRequired { .. } => "approval_required",
            Self::TokenCount { .. } => "token_count",
            Self::ConversationHistoryCompacted { .. } => "conversation_history_compacted",
            Self::AiAnswerEnd { .. } => "ai_answer_end",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this frame ends the stream.
    ///
    /// `approval_required` pauses the stream but is not terminal: the
    /// investigation resumes when the client resubmits with decisions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AiAnswerEnd { .. } | Self::Error { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
