use crate::{Tool, ToolError, ToolOutput, ToolSpec};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry for managing tools.
///
/// The registry is responsible for:
/// - Registering tools under unique names
/// - Looking up tools by name
/// - Invoking tools
/// - Providing tool specifications to the LLM, in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if another tool already uses the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }

        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Get all registered tools in registration order.
    pub fn all(&self) -> Vec<&Arc<dyn Tool>> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Invoke a tool by name.
    pub async fn invoke(&self, name: &str, input: Value) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        tool.execute(input).await
    }

    /// Specifications of every registered tool, in registration order.
    pub fn list_specs(&self) -> Vec<ToolSpec> {
        self.all().into_iter().map(|tool| tool.spec()).collect()
    }
}
