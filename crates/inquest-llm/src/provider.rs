//! Provider trait and error taxonomy.

use async_trait::async_trait;
use inquest_core::{Message, ToolSchema};
use serde::{Deserialize, Serialize};

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider returned a payload that does not fit the contract.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// Error description.
        message: String,
    },

    /// Authentication failed (expired token, invalid key).
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited by the provider.
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds (0 when the provider gave none).
        retry_after_ms: u64,
        /// Error description.
        message: String,
    },

    /// Provider returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Provider-specific error code.
        code: Option<String>,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// The request was cancelled.
    #[error("Request cancelled")]
    Cancelled,

    /// Provider-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ProviderError {
    /// Whether this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::RateLimited { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::Json(_)
            | Self::MalformedResponse { .. }
            | Self::Auth { .. }
            | Self::Cancelled
            | Self::Other { .. } => false,
        }
    }

    /// Extract retry-after delay in milliseconds, if available.
    #[must_use]
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }

    /// Error category string for logs and metrics labels.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) | Self::MalformedResponse { .. } => "parse",
            Self::Auth { .. } => "auth",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api { .. } => "api",
            Self::Cancelled => "cancelled",
            Self::Other { .. } => "unknown",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / response
// ─────────────────────────────────────────────────────────────────────────────

/// Sampling and generation options for one completion.
///
/// All fields are optional; providers use their defaults when unset.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Top-p sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Reasoning effort for models that accept it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

/// One completion request: the full conversation plus advertised tools.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    /// The conversation so far, system message first.
    pub messages: Vec<Message>,
    /// Tool schemas the model may call.
    pub tools: Vec<ToolSchema>,
    /// Generation options.
    pub options: CompletionOptions,
}

/// Token usage as reported by the provider for one completion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens generated.
    pub completion_tokens: u64,
    /// Sum of the two.
    pub total_tokens: u64,
}

/// One assistant turn returned by a provider.
#[derive(Clone, Debug)]
pub struct CompletionOutcome {
    /// The assistant message: text and/or tool call requests.
    pub message: Message,
    /// Reasoning text, when the provider surfaces it separately.
    pub reasoning: Option<String>,
    /// Provider-reported usage, when available.
    pub usage: Option<CompletionUsage>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Core model provider trait.
///
/// Implementors must be `Send + Sync` for use across async tasks. One call
/// produces one full assistant turn; streaming within a turn is a backend
/// concern that never crosses this boundary.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Current model id (e.g. `"gpt-4o"`).
    fn model(&self) -> &str;

    /// Request the next assistant turn.
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionOutcome>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
