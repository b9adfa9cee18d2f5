//! Wire types for the chat completions API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for an [`OpenAiProvider`](crate::OpenAiProvider).
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Model id sent with every request.
    pub model: String,
    /// Bearer API key.
    pub api_key: String,
    /// Base URL override; defaults to [`DEFAULT_BASE_URL`].
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    /// Config with defaults for everything but model and key.
    #[must_use]
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level chat completions request body.
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model id.
    pub model: String,
    /// Conversation, system message first.
    pub messages: Vec<ChatMessage>,
    /// Advertised tools, omitted when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ChatTool>,
    /// Output token cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Top-p sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Reasoning effort, for models that accept it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

/// One message on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user`, `assistant`, or `tool`.
    pub role: String,
    /// Text content; `null` on tool-call-only assistant turns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls on assistant messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    /// Back-reference on tool-role messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// One tool call entry, used in both requests and responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatToolCall {
    /// Call id (`call_…`).
    pub id: String,
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub call_type: String,
    /// The function being called.
    pub function: ChatFunctionCall,
}

/// Function name plus JSON-encoded arguments.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatFunctionCall {
    /// Tool name.
    pub name: String,
    /// Arguments as a JSON-encoded string.
    pub arguments: String,
}

/// Tool definition advertised to the model.
#[derive(Clone, Debug, Serialize)]
pub struct ChatTool {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub tool_type: String,
    /// The function definition.
    pub function: ChatFunction,
}

/// Function schema inside a [`ChatTool`].
#[derive(Clone, Debug, Serialize)]
pub struct ChatFunction {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the parameters.
    pub parameters: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level chat completions response body.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Completion choices; the first is the assistant turn.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Provider-reported usage.
    pub usage: Option<ChatUsage>,
}

/// One completion choice.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// The assistant message.
    pub message: ChatResponseMessage,
    /// Why generation stopped (`stop`, `tool_calls`, `length`).
    pub finish_reason: Option<String>,
}

/// Assistant message inside a response choice.
#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    /// Assistant text.
    pub content: Option<String>,
    /// Requested tool calls.
    pub tool_calls: Option<Vec<ChatToolCall>>,
    /// Reasoning text, surfaced by some compatible servers.
    pub reasoning_content: Option<String>,
}

/// Token usage block.
#[derive(Debug, Deserialize)]
pub struct ChatUsage {
    /// Tokens consumed by the prompt.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens generated.
    #[serde(default)]
    pub completion_tokens: u64,
    /// Sum of the two.
    #[serde(default)]
    pub total_tokens: u64,
}
