//! Approval gating for sensitive tool calls.
//!
//! A sensitive call never executes on first dispatch: it parks here as a
//! pending approval, the stream pauses, and the client resubmits the
//! conversation with one [`ToolDecision`] per pending call. Approved calls
//! are then dispatched for real; denied calls turn into synthetic error
//! results without side effects. A session that ends while approvals are
//! pending simply drops them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use inquest_core::{PendingApproval, ToolCallId, ToolCallRequest};

// ─────────────────────────────────────────────────────────────────────────────
// Decisions
// ─────────────────────────────────────────────────────────────────────────────

/// A client's verdict on one pending call, as submitted on resume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDecision {
    /// The pending call this verdict applies to.
    pub tool_call_id: ToolCallId,
    /// `true` to execute the call, `false` to deny it.
    pub approved: bool,
}

/// Resolved state of a previously pending call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// Execute the call.
    Approved,
    /// Synthesize an error result; nothing executes.
    Denied,
}

impl ToolDecision {
    /// The state this verdict moves the pending call into.
    #[must_use]
    pub fn decision(&self) -> ApprovalDecision {
        if self.approved {
            ApprovalDecision::Approved
        } else {
            ApprovalDecision::Denied
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gate
// ─────────────────────────────────────────────────────────────────────────────

/// Holds the calls of the current turn that await an explicit decision.
#[derive(Debug, Default)]
pub struct ApprovalGate {
    pending: Vec<PendingApproval>,
}

impl ApprovalGate {
    /// Empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a sensitive call until the client decides.
    pub fn submit(&mut self, request: &ToolCallRequest, description: impl Into<String>) {
        let entry = PendingApproval {
            tool_call_id: request.id.clone(),
            tool_name: request.tool_name.clone(),
            description: description.into(),
            params: request.parameters.clone(),
        };
        debug!(
            tool = %entry.tool_name,
            id = %entry.tool_call_id,
            "tool call awaiting approval"
        );
        self.pending.push(entry);
    }

    /// Pending approvals in request order.
    #[must_use]
    pub fn pending(&self) -> &[PendingApproval] {
        &self.pending
    }

    /// Whether any call is still awaiting a decision.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of calls awaiting a decision.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
