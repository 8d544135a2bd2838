//! Echo tool: returns its `text` argument unchanged.

use async_trait::async_trait;
use convoke_core::error::ToolError;
use convoke_core::tool::Tool;
use tokio_util::sync::CancellationToken;

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the given text unchanged."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to return" }
            },
            "required": ["text"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        match &arguments["text"] {
            serde_json::Value::String(s) => Ok(s.clone()),
            serde_json::Value::Null => Err(ToolError::Failed("missing 'text' argument".into())),
            other => Ok(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_strings_and_values() {
        let cancel = CancellationToken::new();
        let out = EchoTool
            .execute(serde_json::json!({"text": "hi"}), &cancel)
            .await
            .unwrap();
        assert_eq!(out, "hi");

        let out = EchoTool
            .execute(serde_json::json!({"text": 42}), &cancel)
            .await
            .unwrap();
        assert_eq!(out, "42");
    }

    #[tokio::test]
    async fn empty_text_is_empty_result() {
        let out = EchoTool
            .execute(serde_json::json!({"text": ""}), &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
