//! Command tool, the declarative capability behind config-defined toolsets.
//!
//! Each [`ToolDeclaration`] in settings becomes one [`CommandTool`]: the
//! model's parameters are rendered into the declared command template and the
//! rendered line runs through the injected [`ProcessRunner`]. Stdout becomes
//! the result payload; a non-zero exit, timeout, or cancellation becomes a
//! [`ToolError`] that the dispatcher folds as an error result.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tera::{Context, Tera};
use tracing::debug;

use inquest_core::ToolSchema;

use crate::errors::ToolError;
use crate::toolset::ToolDeclaration;
use crate::traits::{ProcessOptions, ProcessRunner, ToolCapability, ToolContext, ToolOutput};

/// Timeout applied when a declaration does not carry its own.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

/// A capability defined by a command template in settings.
pub struct CommandTool {
    declaration: ToolDeclaration,
    runner: Arc<dyn ProcessRunner>,
}

impl CommandTool {
    /// Create a command tool from its declaration and a process runner.
    pub fn new(declaration: ToolDeclaration, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            declaration,
            runner,
        }
    }

    fn check_required(&self, params: &serde_json::Map<String, Value>) -> Result<(), ToolError> {
        for name in self.declaration.parameters.required.iter().flatten() {
            if !params.contains_key(name) {
                return Err(ToolError::Validation {
                    message: format!("missing required parameter: {name}"),
                });
            }
        }
        Ok(())
    }

    fn render_command(&self, params: &serde_json::Map<String, Value>) -> Result<String, ToolError> {
        let context = Context::from_value(Value::Object(params.clone()))?;
        let rendered = Tera::one_off(&self.declaration.command_template, &context, false)?;
        Ok(rendered)
    }
}

#[async_trait]
impl ToolCapability for CommandTool {
    fn name(&self) -> &str {
        &self.declaration.name
    }

    fn sensitive(&self) -> bool {
        self.declaration.sensitive
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.declaration.name.clone(),
            description: self.declaration.description.clone(),
            parameters: self.declaration.parameters.clone(),
        }
    }

    async fn execute(
        &self,
        params: &serde_json::Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        self.check_required(params)?;
        let command = self.render_command(params)?;

        debug!(tool_name = %self.declaration.name, command, "running command tool");

        let timeout_ms = self
            .declaration
            .timeout_ms
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS);
        let opts = ProcessOptions {
            working_directory: ctx.working_directory.clone(),
            timeout_ms,
            cancellation: ctx.cancellation.clone(),
        };

        let output = self.runner.run_command(&command, &opts).await?;

        if output.timed_out {
            return Err(ToolError::Timeout { timeout_ms });
        }
        if output.interrupted {
            return Err(ToolError::Cancelled);
        }
        if output.exit_code != 0 {
            let message = if output.stderr.is_empty() {
                if output.stdout.is_empty() {
                    "no output".to_string()
                } else {
                    output.stdout
                }
            } else {
                output.stderr
            };
            return Err(ToolError::CommandFailed {
                exit_code: output.exit_code,
                message,
            });
        }

        Ok(ToolOutput::new(output.stdout, command))
    }
}
