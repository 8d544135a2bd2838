//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the model act: evaluate an expression, look something
//! up, or hand back a final answer. The executor resolves them by name
//! through a [`ToolRegistry`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::model::ToolSpec;

/// The core Tool trait.
///
/// `execute` receives already-parsed, already-validated arguments and returns
/// the textual result the model will see.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator", "final_answer").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, ToolError>;

    /// Whether this tool's output is a final answer in its own right.
    ///
    /// When every call in a turn goes to a terminal tool and none fails, the
    /// session finishes with their output instead of asking the model again.
    fn is_terminal(&self) -> bool {
        false
    }

    /// Convert this tool into a ToolSpec for sending to the model.
    fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// Cloning is cheap: tools are reference-counted, so a derived agent can be
/// handed the same capabilities.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Remove a tool by name. Returns whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Look up a tool by name.
    pub fn use_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool specs, sorted by name so prompts are stable.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.to_spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
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
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
            _cancel: &CancellationToken,
        ) -> std::result::Result<String, ToolError> {
            Ok(arguments["text"].as_str().unwrap_or("").to_string())
        }
    }

    struct AnswerTool;

    #[async_trait]
    impl Tool for AnswerTool {
        fn name(&self) -> &str {
            "answer"
        }
        fn description(&self) -> &str {
            "Returns the final answer"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
            _cancel: &CancellationToken,
        ) -> std::result::Result<String, ToolError> {
            Ok("done".into())
        }
        fn is_terminal(&self) -> bool {
            true
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.use_tool("echo").is_some());
        assert!(registry.use_tool("nonexistent").is_none());
    }

    #[test]
    fn registry_specs_are_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(AnswerTool));
        let specs = registry.specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "answer");
        assert_eq!(specs[1].name, "echo");
        assert_eq!(registry.names(), vec!["answer", "echo"]);
    }

    #[test]
    fn registry_remove() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.remove("echo"));
        assert!(!registry.remove("echo"));
        assert!(registry.is_empty());
    }

    #[test]
    fn terminal_capability_defaults_off() {
        assert!(!EchoTool.is_terminal());
        assert!(AnswerTool.is_terminal());
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let tool = registry.use_tool("echo").unwrap();
        let out = tool
            .execute(serde_json::json!({"text": "hello world"}), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, "hello world");
    }
}
