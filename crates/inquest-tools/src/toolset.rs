//! Declarative toolset configuration.
//!
//! Settings carry named toolsets, each a list of [`ToolDeclaration`]s.
//! [`build_registry`] turns every declaration into a [`CommandTool`] backed
//! by one shared [`ProcessRunner`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use inquest_core::ParameterSchema;

use crate::command::CommandTool;
use crate::registry::ToolRegistry;
use crate::traits::ProcessRunner;

/// One declarative tool definition from settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Capability name advertised to the model.
    pub name: String,
    /// Human-readable description advertised to the model.
    pub description: String,
    /// Command template; parameters are substituted by name.
    pub command_template: String,
    /// JSON Schema for the parameters.
    #[serde(default = "ParameterSchema::empty_object")]
    pub parameters: ParameterSchema,
    /// Whether invocations require an explicit approval decision.
    #[serde(default)]
    pub sensitive: bool,
    /// Per-tool execution timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// A named group of tool declarations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Toolset {
    /// Toolset name (grouping only, not visible to the model).
    pub name: String,
    /// The declarations in this toolset.
    #[serde(default)]
    pub tools: Vec<ToolDeclaration>,
}

/// Build a registry from configured toolsets.
///
/// Declarations are registered in order; a later declaration with the same
/// name replaces an earlier one.
#[must_use]
pub fn build_registry(toolsets: &[Toolset], runner: Arc<dyn ProcessRunner>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for set in toolsets {
        for decl in &set.tools {
            if registry.contains(&decl.name) {
                warn!(
                    toolset = %set.name,
                    tool_name = %decl.name,
                    "duplicate tool name, later declaration wins"
                );
            }
            registry.register(Arc::new(CommandTool::new(
                decl.clone(),
                Arc::clone(&runner),
            )));
        }
    }
    registry
}
