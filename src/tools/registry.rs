//! Tool registry: the fixed set of tools a conversation can call.

use std::collections::HashMap;
use std::sync::Arc;

use super::tool::Tool;
use super::types::ToolDefinition;
use crate::error::{ParleyError, Result};

/// Immutable mapping from tool name to tool.
///
/// Built once through [`ToolRegistryBuilder`] and shared as
/// `Arc<ToolRegistry>`; lookups need no locking.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.by_name
            .get(name)
            .map(|&idx| self.tools[idx].clone())
            .ok_or_else(|| ParleyError::UnknownTool(name.to_string()))
    }

    /// Name, description and schema of every tool, in registration order.
    pub fn list_for_model_context(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

/// Collects tools before freezing them into a [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistryBuilder {
    /// Register a tool. Fails on duplicate names, and on tools that can
    /// neither run nor be resolved by an approval decision.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<&mut Self> {
        let name = tool.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(ParleyError::DuplicateTool(name));
        }
        if !tool.has_executor() && !tool.requires_approval() {
            return Err(ParleyError::Configuration(format!(
                "tool '{name}' has no executor and does not require approval"
            )));
        }
        self.by_name.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(self)
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: self.tools,
            by_name: self.by_name,
        }
    }
}
