//! The per-investigation aggregate: ledger, approvals, truncations, usage.
//!
//! A session is owned by exactly one loop task for its whole life. New
//! sessions start from a system framing plus the operator's question;
//! resumed sessions are rebuilt from the conversation the client streamed
//! back, re-validated against every ledger invariant on the way in.

use std::collections::HashSet;

use inquest_core::{
    Message, MessageLedger, Role, SessionId, TokenUsageSnapshot, ToolCallRequest, TruncationRecord,
};

use crate::approval::ApprovalGate;
use crate::errors::RuntimeError;

/// Framing injected at ledger position 0 of every new investigation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an infrastructure troubleshooting assistant. \
    Investigate the operator's question using the available diagnostic tools: form a hypothesis, \
    gather evidence with targeted tool calls, and iterate until you can explain the problem. \
    Prefer small, specific tool calls over broad ones, and never invent tool output. When the \
    evidence is sufficient, answer in plain text with what is wrong, the evidence for it, and \
    the next remediation steps.";

/// State owned by one investigation.
#[derive(Debug)]
pub struct InvestigationSession {
    id: SessionId,
    model: String,
    ledger: MessageLedger,
    gate: ApprovalGate,
    truncations: Vec<TruncationRecord>,
    usage_history: Vec<TokenUsageSnapshot>,
}

impl InvestigationSession {
    /// Start a fresh investigation from the operator's question.
    pub fn new(
        model: impl Into<String>,
        system_prompt: &str,
        question: &str,
    ) -> Result<Self, RuntimeError> {
        let mut ledger = MessageLedger::new();
        ledger.append(Message::system(system_prompt))?;
        ledger.append(Message::user(question))?;
        Ok(Self {
            id: SessionId::new(),
            model: model.into(),
            ledger,
            gate: ApprovalGate::new(),
            truncations: Vec::new(),
            usage_history: Vec::new(),
        })
    }

    /// Rebuild a session from a client-resubmitted conversation.
    ///
    /// Every ledger invariant is re-checked; additionally, any tool call
    /// still unanswered must belong to the final assistant message that
    /// requested tools, otherwise the resubmission is malformed.
    pub fn resume(
        model: impl Into<String>,
        conversation: Vec<Message>,
    ) -> Result<Self, RuntimeError> {
        let ledger = MessageLedger::from_messages(conversation)?;

        let unanswered = ledger.unanswered_tool_call_ids();
        if !unanswered.is_empty() {
            let current: HashSet<_> = ledger
                .iter()
                .rev()
                .find(|message| message.has_tool_calls())
                .map(Message::tool_call_ids)
                .unwrap_or_default()
                .into_iter()
                .collect();
            if let Some(stale) = unanswered.iter().find(|id| !current.contains(*id)) {
                return Err(RuntimeError::StalePendingCall {
                    tool_call_id: stale.clone(),
                });
            }
        }

        Ok(Self {
            id: SessionId::new(),
            model: model.into(),
            ledger,
            gate: ApprovalGate::new(),
            truncations: Vec::new(),
            usage_history: Vec::new(),
        })
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Model this session talks to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The conversation ledger.
    #[must_use]
    pub fn ledger(&self) -> &MessageLedger {
        &self.ledger
    }

    /// Mutable ledger access for the owning loop task.
    pub fn ledger_mut(&mut self) -> &mut MessageLedger {
        &mut self.ledger
    }

    /// The approval gate for the current turn.
    #[must_use]
    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    /// Mutable gate access for the dispatcher.
    pub fn gate_mut(&mut self) -> &mut ApprovalGate {
        &mut self.gate
    }

    /// Tool calls requested but not yet answered, in issue order.
    ///
    /// Non-empty only right after a resume from an approval pause.
    #[must_use]
    pub fn pending_requests(&self) -> Vec<ToolCallRequest> {
        let unanswered: HashSet<_> = self.ledger.unanswered_tool_call_ids().into_iter().collect();
        if unanswered.is_empty() {
            return Vec::new();
        }
        self.ledger
            .iter()
            .rev()
            .find(|message| message.has_tool_calls())
            .and_then(|message| message.tool_calls.as_deref())
            .unwrap_or_default()
            .iter()
            .filter(|call| unanswered.contains(&call.id))
            .cloned()
            .collect()
    }

    /// Number of model calls already spent on this investigation.
    #[must_use]
    pub fn assistant_turns(&self) -> u32 {
        let turns = self
            .ledger
            .iter()
            .filter(|message| message.role == Role::Assistant)
            .count();
        u32::try_from(turns).unwrap_or(u32::MAX)
    }

    /// Record a shrink applied to one tool result.
    pub fn record_truncation(&mut self, record: TruncationRecord) {
        self.truncations.push(record);
    }

    /// All truncations applied so far, oldest first.
    #[must_use]
    pub fn truncations(&self) -> &[TruncationRecord] {
        &self.truncations
    }

    /// Record a post-fold usage snapshot.
    pub fn record_usage(&mut self, snapshot: TokenUsageSnapshot) {
        self.usage_history.push(snapshot);
    }

    /// Most recent usage snapshot, if any fold has happened.
    #[must_use]
    pub fn latest_usage(&self) -> Option<TokenUsageSnapshot> {
        self.usage_history.last().copied()
    }

    /// Every usage snapshot recorded so far, oldest first.
    #[must_use]
    pub fn usage_history(&self) -> &[TokenUsageSnapshot] {
        &self.usage_history
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
