//! Tool error types.
//!
//! Unified error enum for capability execution failures. Every variant maps
//! onto an `status=error` tool result at the dispatch boundary; none of them
//! terminate the investigation.

use thiserror::Error;

/// Errors that can occur while executing a capability.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Parameter validation failed.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// Command template could not be rendered with the supplied parameters.
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    /// Execution exceeded the configured timeout.
    #[error("timeout after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Execution was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// Subprocess exited with a non-zero code.
    #[error("command exited with code {exit_code}: {message}")]
    CommandFailed {
        /// The exit code.
        exit_code: i32,
        /// Stderr tail or other failure description.
        message: String,
    },

    /// Internal error (spawn failures and other catch-alls).
    #[error("{message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}
