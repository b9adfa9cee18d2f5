//! Tool registry, the central index of registered capabilities.
//!
//! The [`ToolRegistry`] maps capability names to their [`ToolCapability`]
//! implementations. The runtime builds the registry before a session starts
//! and shares it immutably afterwards; dispatch looks names up by exact
//! match and treats misses as per-call errors, never session failures.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use inquest_core::ToolSchema;

use crate::traits::ToolCapability;

/// Central registry mapping capability names to their implementations.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolCapability>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a capability. Overwrites any existing one with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolCapability>) {
        debug!(tool_name = tool.name(), "tool registered");
        let _ = self.tools.insert(tool.name().to_owned(), tool);
    }

    /// Look up a capability by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolCapability>> {
        self.tools.get(name).cloned()
    }

    /// Return all schemas advertised to the model, sorted by name so the
    /// token count of the definitions block is stable across turns.
    #[must_use]
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Return all capability names, sorted alphabetically.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether a capability with the given name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
