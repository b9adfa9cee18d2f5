//! Capability trait and DI abstractions for the tool system.
//!
//! Defines [`ToolCapability`], the trait every diagnostic tool implements,
//! plus the [`ProcessRunner`] dependency-injection trait that command tools
//! use to reach the host. The runtime wires the real implementations in;
//! tests substitute scripted ones.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use inquest_core::{SessionId, ToolCallId, ToolSchema};

use crate::errors::ToolError;

// ─────────────────────────────────────────────────────────────────────────────
// Tool context
// ─────────────────────────────────────────────────────────────────────────────

/// Execution context passed to every capability invocation.
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Unique id of this tool call.
    pub tool_call_id: ToolCallId,
    /// Session the call belongs to.
    pub session_id: SessionId,
    /// Working directory for command execution.
    pub working_directory: String,
    /// Cancellation token for cooperative cancellation.
    pub cancellation: CancellationToken,
}

// ─────────────────────────────────────────────────────────────────────────────
// Capability trait
// ─────────────────────────────────────────────────────────────────────────────

/// Output of a successful capability execution.
///
/// The dispatcher owns the call identity, so a capability only produces the
/// payload and a human-readable description of what ran.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutput {
    /// Result payload handed back to the model.
    pub data: Value,
    /// Short description of what the capability did.
    pub description: String,
}

impl ToolOutput {
    /// Create an output from any JSON-convertible payload.
    #[must_use]
    pub fn new(data: impl Into<Value>, description: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            description: description.into(),
        }
    }
}

/// The core trait every diagnostic capability implements.
///
/// Each capability provides:
/// - **Schema** via [`schema()`](ToolCapability::schema), advertised to the model
/// - **Execution** via [`execute()`](ToolCapability::execute), invoked with the
///   model's parameters
/// - **Sensitivity** via [`sensitive()`](ToolCapability::sensitive), which
///   routes the call through the approval gate before execution
#[async_trait]
pub trait ToolCapability: Send + Sync {
    /// Capability name, the exact string matched against model tool calls.
    fn name(&self) -> &str;

    /// Whether invocations require an explicit approval decision.
    fn sensitive(&self) -> bool {
        false
    }

    /// Generate the schema advertised to the model.
    fn schema(&self) -> ToolSchema;

    /// Execute the capability with the model's parameters.
    async fn execute(
        &self,
        params: &serde_json::Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Process types
// ─────────────────────────────────────────────────────────────────────────────

/// Options for spawning a subprocess.
#[derive(Clone, Debug)]
pub struct ProcessOptions {
    /// Working directory.
    pub working_directory: String,
    /// Timeout in milliseconds.
    pub timeout_ms: u64,
    /// Cancellation token.
    pub cancellation: CancellationToken,
}

/// Output from a subprocess.
#[derive(Clone, Debug)]
pub struct ProcessOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code.
    pub exit_code: i32,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the process timed out.
    pub timed_out: bool,
    /// Whether the process was interrupted by cancellation.
    pub interrupted: bool,
}

/// Subprocess execution behind command tools.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a shell command.
    async fn run_command(
        &self,
        command: &str,
        opts: &ProcessOptions,
    ) -> Result<ProcessOutput, ToolError>;
}
