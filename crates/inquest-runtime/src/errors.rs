//! Runtime error types.
//!
//! Everything in this enum ends the investigation. Tool failures never
//! surface here; the dispatcher folds them into error results the model can
//! read. Each variant maps onto one stable numeric code carried by the
//! terminal `error` frame.

use inquest_core::events::codes;
use inquest_core::{LedgerError, ToolCallId};
use inquest_llm::ProviderError;

use crate::emitter::EmitError;

/// Errors that end an investigation run.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The model provider failed with no retry left.
    #[error("provider error: {0}")]
    Provider(ProviderError),

    /// A ledger invariant was violated.
    #[error("ledger invariant violated: {0}")]
    Ledger(#[from] LedgerError),

    /// A resume decision referenced a call that is not pending.
    #[error("decision references unknown tool_call_id {tool_call_id}")]
    UnknownDecision {
        /// The unmatched id.
        tool_call_id: ToolCallId,
    },

    /// A resubmitted conversation carries a pending call that does not
    /// belong to its final assistant message.
    #[error("pending tool call {tool_call_id} does not belong to the final assistant message")]
    StalePendingCall {
        /// The out-of-place id.
        tool_call_id: ToolCallId,
    },

    /// The bounded event backlog filled up because the consumer stalled.
    #[error("event backlog overflowed (capacity {capacity})")]
    BacklogOverflow {
        /// Configured backlog capacity.
        capacity: usize,
    },

    /// The session was cancelled before reaching a terminal state.
    #[error("investigation cancelled")]
    Cancelled,
}

impl RuntimeError {
    /// Wrap a provider error, normalizing provider-observed cancellation.
    #[must_use]
    pub fn from_provider(err: ProviderError) -> Self {
        match err {
            ProviderError::Cancelled => Self::Cancelled,
            other => Self::Provider(other),
        }
    }

    /// Numeric code for the terminal `error` frame.
    #[must_use]
    pub fn error_code(&self) -> u16 {
        match self {
            Self::Provider(ProviderError::Cancelled) | Self::Cancelled => codes::CANCELLED,
            Self::Provider(_) => codes::PROVIDER,
            Self::Ledger(_) | Self::UnknownDecision { .. } | Self::StalePendingCall { .. } => {
                codes::INVARIANT
            }
            Self::BacklogOverflow { .. } => codes::BACKLOG_OVERFLOW,
        }
    }

    /// Short human-readable description for the terminal frame.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Provider(ProviderError::Cancelled) | Self::Cancelled => {
                "Investigation was cancelled"
            }
            Self::Provider(_) => "Model provider request failed",
            Self::Ledger(_) | Self::UnknownDecision { .. } | Self::StalePendingCall { .. } => {
                "Conversation state is invalid"
            }
            Self::BacklogOverflow { .. } => "Event stream backlog overflowed",
        }
    }

    /// Category label for logs and metrics.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Provider(ProviderError::Cancelled) | Self::Cancelled => "cancelled",
            Self::Provider(_) => "provider",
            Self::Ledger(_) | Self::UnknownDecision { .. } | Self::StalePendingCall { .. } => {
                "invariant"
            }
            Self::BacklogOverflow { .. } => "backlog",
        }
    }
}

impl From<EmitError> for RuntimeError {
    fn from(err: EmitError) -> Self {
        match err {
            EmitError::Overflow { capacity } => Self::BacklogOverflow { capacity },
            // A dropped receiver means the client went away; treat it like
            // any other cancellation.
            EmitError::Closed => Self::Cancelled,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
