//! Append-only conversation ledger with invariant enforcement.
//!
//! The ledger is the single source of truth for what the model has seen.
//! Two invariants hold at all times: the first message is role=system, and
//! every tool-role message answers a `tool_calls` entry of an earlier
//! assistant message. Both are checked on every [`MessageLedger::append`]
//! and on [`MessageLedger::replace`]; a violation is a programming error in
//! the caller, not a recoverable condition, so the session must terminate.

use std::collections::HashSet;

use thiserror::Error;

use crate::ids::ToolCallId;
use crate::messages::{Message, Role};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Invariant violation detected by the ledger. Always fatal to the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The first message of a ledger must be role=system.
    #[error("first ledger message must be role=system, got role={role}")]
    FirstMessageNotSystem {
        /// Role of the offending message.
        role: Role,
    },

    /// A system message appeared after position 0.
    #[error("system message at index {index}, only index 0 may be system")]
    SystemAfterFirst {
        /// Ledger index of the offending message.
        index: usize,
    },

    /// A tool-role message without a `tool_call_id` back-reference.
    #[error("tool message at index {index} has no tool_call_id")]
    MissingToolCallId {
        /// Ledger index of the offending message.
        index: usize,
    },

    /// A tool-role message whose id matches no earlier assistant request.
    #[error("tool result references unknown tool_call_id {tool_call_id}")]
    OrphanToolResult {
        /// The unmatched id.
        tool_call_id: ToolCallId,
    },

    /// A second tool-role message answering an already-answered request.
    #[error("duplicate tool result for tool_call_id {tool_call_id}")]
    DuplicateToolResult {
        /// The doubly-answered id.
        tool_call_id: ToolCallId,
    },

    /// `replace` was handed an empty sequence.
    #[error("ledger replacement must not be empty")]
    EmptyReplacement,
}

// ─────────────────────────────────────────────────────────────────────────────
// Ledger
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered, append-only log of conversation messages.
///
/// Mutated only by the single task owning its session; worker tasks hand
/// results back to that owner rather than writing here directly.
#[derive(Debug, Clone, Default)]
pub struct MessageLedger {
    messages: Vec<Message>,
    requested: HashSet<ToolCallId>,
    answered: HashSet<ToolCallId>,
}

impl MessageLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger seeded from an already-validated conversation.
    ///
    /// Used when a client resubmits a prior conversation to resume a paused
    /// investigation; the sequence is re-validated from scratch.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, LedgerError> {
        let mut ledger = Self::new();
        for message in messages {
            ledger.append(message)?;
        }
        Ok(ledger)
    }

    /// Append one message, enforcing ledger invariants.
    pub fn append(&mut self, message: Message) -> Result<(), LedgerError> {
        let index = self.messages.len();
        match message.role {
            Role::System => {
                if index != 0 {
                    return Err(LedgerError::SystemAfterFirst { index });
                }
            }
            Role::Tool => {
                if index == 0 {
                    return Err(LedgerError::FirstMessageNotSystem { role: message.role });
                }
                let id = message
                    .tool_call_id
                    .clone()
                    .ok_or(LedgerError::MissingToolCallId { index })?;
                if !self.requested.contains(&id) {
                    return Err(LedgerError::OrphanToolResult { tool_call_id: id });
                }
                if !self.answered.insert(id.clone()) {
                    return Err(LedgerError::DuplicateToolResult { tool_call_id: id });
                }
            }
            Role::User | Role::Assistant => {
                if index == 0 {
                    return Err(LedgerError::FirstMessageNotSystem { role: message.role });
                }
            }
        }
        for call in message.tool_calls.as_deref().unwrap_or_default() {
            let _ = self.requested.insert(call.id.clone());
        }
        self.messages.push(message);
        Ok(())
    }

    /// Immutable copy of the current sequence, for compaction or resumption.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Atomically swap in a compacted sequence.
    ///
    /// The replacement is validated in full before the swap; on error the
    /// ledger is left untouched.
    pub fn replace(&mut self, new_sequence: Vec<Message>) -> Result<(), LedgerError> {
        if new_sequence.is_empty() {
            return Err(LedgerError::EmptyReplacement);
        }
        let replacement = Self::from_messages(new_sequence)?;
        *self = replacement;
        Ok(())
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the ledger holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The messages in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Iterator over the messages in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// The most recently appended message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Ids requested by assistant messages that have no tool result yet.
    #[must_use]
    pub fn unanswered_tool_call_ids(&self) -> Vec<ToolCallId> {
        let mut pending = Vec::new();
        for message in &self.messages {
            for call in message.tool_calls.as_deref().unwrap_or_default() {
                if !self.answered.contains(&call.id) {
                    pending.push(call.id.clone());
                }
            }
        }
        pending
    }
}

impl<'a> IntoIterator for &'a MessageLedger {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolCallRequest;
    use assert_matches::assert_matches;

    fn call(id: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: ToolCallId::from(id),
            tool_name: "list_pods".into(),
            parameters: serde_json::Map::new(),
        }
    }

    fn tool_msg(id: &str, content: &str) -> Message {
        Message {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(ToolCallId::from(id)),
        }
    }

    fn seeded() -> MessageLedger {
        let mut ledger = MessageLedger::new();
        ledger.append(Message::system("framing")).unwrap();
        ledger.append(Message::user("question")).unwrap();
        ledger
    }

    // ── append invariants ──

    #[test]
    fn first_message_must_be_system() {
        let mut ledger = MessageLedger::new();
        let err = ledger.append(Message::user("hi")).unwrap_err();
        assert_matches!(err, LedgerError::FirstMessageNotSystem { role: Role::User });
        assert!(ledger.is_empty());
    }

    #[test]
    fn system_after_first_rejected() {
        let mut ledger = seeded();
        let err = ledger.append(Message::system("again")).unwrap_err();
        assert_matches!(err, LedgerError::SystemAfterFirst { index: 2 });
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn tool_result_requires_prior_request() {
        let mut ledger = seeded();
        let err = ledger.append(tool_msg("call_z", "output")).unwrap_err();
        assert_matches!(err, LedgerError::OrphanToolResult { .. });
    }

    #[test]
    fn tool_result_after_matching_request_accepted() {
        let mut ledger = seeded();
        ledger
            .append(Message::assistant_with_tool_calls(None, vec![call("call_a")]))
            .unwrap();
        ledger.append(tool_msg("call_a", "3 pods")).unwrap();
        assert_eq!(ledger.len(), 4);
        assert!(ledger.unanswered_tool_call_ids().is_empty());
    }

    #[test]
    fn tool_result_without_id_rejected() {
        let mut ledger = seeded();
        let bare = Message {
            role: Role::Tool,
            content: Some("output".into()),
            tool_calls: None,
            tool_call_id: None,
        };
        let err = ledger.append(bare).unwrap_err();
        assert_matches!(err, LedgerError::MissingToolCallId { index: 2 });
    }

    #[test]
    fn duplicate_tool_result_rejected() {
        let mut ledger = seeded();
        ledger
            .append(Message::assistant_with_tool_calls(None, vec![call("call_a")]))
            .unwrap();
        ledger.append(tool_msg("call_a", "first")).unwrap();
        let err = ledger.append(tool_msg("call_a", "second")).unwrap_err();
        assert_matches!(err, LedgerError::DuplicateToolResult { .. });
    }

    #[test]
    fn unanswered_ids_follow_request_order() {
        let mut ledger = seeded();
        ledger
            .append(Message::assistant_with_tool_calls(
                None,
                vec![call("call_a"), call("call_b"), call("call_c")],
            ))
            .unwrap();
        ledger.append(tool_msg("call_b", "done")).unwrap();
        let pending = ledger.unanswered_tool_call_ids();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].as_str(), "call_a");
        assert_eq!(pending[1].as_str(), "call_c");
    }

    // ── snapshot / replace ──

    #[test]
    fn snapshot_is_detached_copy() {
        let mut ledger = seeded();
        let snap = ledger.snapshot();
        ledger.append(Message::assistant("answer")).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn replace_swaps_in_valid_sequence() {
        let mut ledger = seeded();
        ledger
            .append(Message::assistant_with_tool_calls(None, vec![call("call_a")]))
            .unwrap();
        ledger.append(tool_msg("call_a", "very long output")).unwrap();

        let mut compacted = ledger.snapshot();
        compacted[3].content = Some("1 tool results omitted for space".into());
        ledger.replace(compacted).unwrap();

        assert_eq!(ledger.len(), 4);
        assert_eq!(
            ledger.messages()[3].content_str(),
            "1 tool results omitted for space"
        );
    }

    #[test]
    fn replace_rejects_empty_sequence() {
        let mut ledger = seeded();
        let err = ledger.replace(vec![]).unwrap_err();
        assert_matches!(err, LedgerError::EmptyReplacement);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn replace_rejects_invalid_head_and_keeps_state() {
        let mut ledger = seeded();
        let err = ledger
            .replace(vec![Message::user("no system first")])
            .unwrap_err();
        assert_matches!(err, LedgerError::FirstMessageNotSystem { role: Role::User });
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.messages()[0].role, Role::System);
    }

    #[test]
    fn from_messages_revalidates_resubmitted_conversation() {
        let wire = vec![
            Message::system("framing"),
            Message::user("question"),
            Message::assistant_with_tool_calls(None, vec![call("call_a")]),
            tool_msg("call_a", "output"),
        ];
        let ledger = MessageLedger::from_messages(wire).unwrap();
        assert_eq!(ledger.len(), 4);

        let bad = vec![Message::system("framing"), tool_msg("call_q", "orphan")];
        assert_matches!(
            MessageLedger::from_messages(bad).unwrap_err(),
            LedgerError::OrphanToolResult { .. }
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        // Random mix of valid operations: the invariants must hold at every
        // intermediate state, whatever the interleaving.
        proptest! {
            #[test]
            fn valid_operation_sequences_uphold_invariants(
                ops in proptest::collection::vec(0u8..4, 1..40)
            ) {
                let mut ledger = MessageLedger::new();
                ledger.append(Message::system("framing")).unwrap();
                let mut next_call = 0usize;
                let mut open_calls: Vec<String> = Vec::new();

                for op in ops {
                    match op {
                        0 => ledger.append(Message::user("follow-up")).unwrap(),
                        1 => ledger.append(Message::assistant("analysis")).unwrap(),
                        2 => {
                            let id = format!("call_{next_call}");
                            next_call += 1;
                            open_calls.push(id.clone());
                            ledger
                                .append(Message::assistant_with_tool_calls(
                                    None,
                                    vec![ToolCallRequest {
                                        id: ToolCallId::from(id.as_str()),
                                        tool_name: "probe".into(),
                                        parameters: serde_json::Map::new(),
                                    }],
                                ))
                                .unwrap();
                        }
                        _ => {
                            if let Some(id) = open_calls.pop() {
                                ledger
                                    .append(Message {
                                        role: Role::Tool,
                                        content: Some("out".into()),
                                        tool_calls: None,
                                        tool_call_id: Some(ToolCallId::from(id.as_str())),
                                    })
                                    .unwrap();
                            }
                        }
                    }

                    prop_assert_eq!(ledger.messages()[0].role, Role::System);
                    for (i, msg) in ledger.iter().enumerate() {
                        if msg.role == Role::Tool {
                            let id = msg.tool_call_id.as_ref().unwrap();
                            let requested_earlier = ledger.messages()[..i].iter().any(|m| {
                                m.tool_calls
                                    .as_deref()
                                    .unwrap_or_default()
                                    .iter()
                                    .any(|c| &c.id == id)
                            });
                            prop_assert!(requested_earlier);
                        }
                    }
                }
            }
        }
    }
}
