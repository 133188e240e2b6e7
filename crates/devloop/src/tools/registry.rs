//! Tool registry: the closed set of capabilities known before the loop starts

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Tool, ToolError};

/// Registry of available tools, keyed by name
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Later registrations under the same name replace earlier ones.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get a tool by name, or an `UnknownTool` error naming what is available
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
            available: self.list_names().join(", "),
        })
    }

    /// List all registered tool names, sorted
    pub fn list_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Get all tools, sorted by name
    pub fn all_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolContext, ToolOutput};
    use async_trait::async_trait;
    use serde_json::Value;

    struct MockTool(&'static str);

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "A mock tool for testing"
        }

        fn input_shape(&self) -> &str {
            "text"
        }

        async fn execute(&self, _input: &Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::success("mock output"))
        }
    }

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool("mock"));

        assert_eq!(registry.list_names().len(), 1);
        assert!(registry.get("mock").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_lookup_unknown_names_available_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool("beta"));
        registry.register(MockTool("alpha"));

        match registry.lookup("deploy_to_mars") {
            Err(ToolError::UnknownTool { name, available }) => {
                assert_eq!(name, "deploy_to_mars");
                assert_eq!(available, "alpha, beta");
            }
            other => panic!("expected UnknownTool, got {:?}", other.map(|t| t.name().to_string())),
        }
    }

    #[test]
    fn test_registry_list_names_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool("write_file"));
        registry.register(MockTool("create_folder"));

        assert_eq!(registry.list_names(), vec!["create_folder", "write_file"]);
    }
}
