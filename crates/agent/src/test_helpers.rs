//! Shared test tools.

use async_trait::async_trait;
use convoke_core::error::ToolError;
use convoke_core::tool::Tool;
use tokio_util::sync::CancellationToken;

/// Returns a fixed output under a chosen name.
pub struct NamedTool {
    name: String,
    output: String,
}

impl NamedTool {
    pub fn new(name: &str, output: &str) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
        }
    }
}

#[async_trait]
impl Tool for NamedTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Returns a fixed string"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _: serde_json::Value, _: &CancellationToken) -> Result<String, ToolError> {
        Ok(self.output.clone())
    }
}

/// Always fails.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "broken"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _: serde_json::Value, _: &CancellationToken) -> Result<String, ToolError> {
        Err(ToolError::Failed("disk on fire".into()))
    }
}

/// Takes far longer than any test waits.
pub struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }
    fn description(&self) -> &str {
        "Sleeps"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _: serde_json::Value, _: &CancellationToken) -> Result<String, ToolError> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok("finally".into())
    }
}

/// Returns its `text` argument.
pub struct ArgEchoTool;

#[async_trait]
impl Tool for ArgEchoTool {
    fn name(&self) -> &str {
        "arg_echo"
    }
    fn description(&self) -> &str {
        "Returns the text argument"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}})
    }
    async fn execute(&self, args: serde_json::Value, _: &CancellationToken) -> Result<String, ToolError> {
        Ok(args["text"].as_str().unwrap_or_default().to_string())
    }
}

/// Terminal tool returning its `answer` argument.
pub struct AnswerTool;

#[async_trait]
impl Tool for AnswerTool {
    fn name(&self) -> &str {
        "answer"
    }
    fn description(&self) -> &str {
        "Final answer"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"answer": {"type": "string"}}})
    }
    async fn execute(&self, args: serde_json::Value, _: &CancellationToken) -> Result<String, ToolError> {
        Ok(args["answer"].as_str().unwrap_or_default().to_string())
    }
    fn is_terminal(&self) -> bool {
        true
    }
}
