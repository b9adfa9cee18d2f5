//! Tool call types: requests, results, schemas, truncation records.
//!
//! A [`ToolCallRequest`] is the model's intent to invoke a capability. It is
//! consumed exactly once by the dispatcher and terminates in exactly one
//! [`ToolCallResult`], which stays owned by the dispatcher until it is folded
//! into the ledger as a tool-role message (immutable thereafter).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ToolCallId;

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// A model-issued request to invoke a named capability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique id for this call within the conversation.
    pub id: ToolCallId,
    /// Name of the capability to invoke (exact-match against the registry).
    pub tool_name: String,
    /// Key/value parameters as parsed from the model output.
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
}

impl ToolCallRequest {
    /// Create a request with a fresh id.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, parameters: serde_json::Map<String, Value>) -> Self {
        Self {
            id: ToolCallId::new(),
            tool_name: tool_name.into(),
            parameters,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal-or-pending status of a tool call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolResultStatus {
    /// The capability executed and produced data.
    Success,
    /// The capability failed, was unknown, or was denied approval.
    Error,
    /// The capability is sensitive and awaits an explicit decision.
    ApprovalRequired,
}

impl ToolResultStatus {
    /// Whether this status ends the call's lifecycle.
    ///
    /// `approval_required` is not terminal: the call is still pending a
    /// decision and must not be folded into the ledger.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::ApprovalRequired)
    }
}

/// Outcome of dispatching a [`ToolCallRequest`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Back-reference to the originating request.
    pub tool_call_id: ToolCallId,
    /// Name of the tool that was (or would have been) invoked.
    pub tool_name: String,
    /// Execution status.
    pub status: ToolResultStatus,
    /// Output payload (text or structured), present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error message, present when `status` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable summary of what was executed (e.g. the command line).
    pub description: String,
    /// The parameters the call was invoked with.
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

impl ToolCallResult {
    /// Successful result with a text payload.
    #[must_use]
    pub fn success(
        request: &ToolCallRequest,
        data: impl Into<Value>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: request.id.clone(),
            tool_name: request.tool_name.clone(),
            status: ToolResultStatus::Success,
            data: Some(data.into()),
            error: None,
            description: description.into(),
            params: request.parameters.clone(),
        }
    }

    /// Error result. The conversation continues; the model sees the message.
    #[must_use]
    pub fn error(request: &ToolCallRequest, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            tool_call_id: request.id.clone(),
            tool_name: request.tool_name.clone(),
            status: ToolResultStatus::Error,
            data: None,
            error: Some(message.clone()),
            description: message,
            params: request.parameters.clone(),
        }
    }

    /// Pending result for a sensitive call awaiting an explicit decision.
    #[must_use]
    pub fn approval_required(request: &ToolCallRequest, description: impl Into<String>) -> Self {
        Self {
            tool_call_id: request.id.clone(),
            tool_name: request.tool_name.clone(),
            status: ToolResultStatus::ApprovalRequired,
            data: None,
            error: None,
            description: description.into(),
            params: request.parameters.clone(),
        }
    }

    /// Text the model should see for this result when folded into the ledger.
    #[must_use]
    pub fn content_for_ledger(&self) -> String {
        match self.status {
            ToolResultStatus::Success => match &self.data {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            },
            ToolResultStatus::Error => self
                .error
                .clone()
                .unwrap_or_else(|| "tool execution failed".to_string()),
            ToolResultStatus::ApprovalRequired => {
                format!("{} is awaiting approval", self.tool_name)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Schemas
// ─────────────────────────────────────────────────────────────────────────────

/// JSON-Schema-compatible parameter definition for a tool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Top-level JSON Schema type.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property definitions (when type is `object`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Map<String, Value>>,
    /// Required property names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Catch-all for additional JSON Schema properties.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ParameterSchema {
    /// Empty `object` schema (a tool with no parameters).
    #[must_use]
    pub fn empty_object() -> Self {
        Self {
            schema_type: "object".into(),
            properties: None,
            required: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// A tool definition advertised to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name (unique identifier, exact-match dispatch key).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: ParameterSchema,
}

// ─────────────────────────────────────────────────────────────────────────────
// Truncation records
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata about one shrink operation applied to a tool result.
///
/// Indices are 0-based byte offsets into the original content:
/// `start_index` is always 0 (only prefixes are kept) and `end_index`
/// marks the cut point. One record per truncated result, kept on a side
/// list attached to the session, never inside the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationRecord {
    /// The tool call whose result was shrunk.
    pub tool_call_id: ToolCallId,
    /// Name of the tool that produced the oversized result.
    pub tool_name: String,
    /// Token count of the content before truncation.
    pub original_token_count: u64,
    /// Start of the kept range (always 0).
    pub start_index: usize,
    /// Cut point: byte length of the kept prefix.
    pub end_index: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
