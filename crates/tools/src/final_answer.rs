//! Final answer tool: lets the model finish by calling a tool.
//!
//! This is a terminal tool: when every call in a turn targets terminal
//! tools and all succeed, the session returns their output directly.

use async_trait::async_trait;
use convoke_core::error::ToolError;
use convoke_core::tool::Tool;
use tokio_util::sync::CancellationToken;

pub struct FinalAnswerTool;

#[async_trait]
impl Tool for FinalAnswerTool {
    fn name(&self) -> &str {
        "final_answer"
    }

    fn description(&self) -> &str {
        "Deliver the final answer to the user. Call this once you are done."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "answer": { "type": "string", "description": "The complete answer" }
            },
            "required": ["answer"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        arguments["answer"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| ToolError::Failed("missing 'answer' argument".into()))
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_trimmed_answer() {
        let out = FinalAnswerTool
            .execute(
                serde_json::json!({"answer": "  Paris \n"}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out, "Paris");
        assert!(FinalAnswerTool.is_terminal());
    }

    #[tokio::test]
    async fn missing_answer_fails() {
        let err = FinalAnswerTool
            .execute(serde_json::json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed(_)));
    }
}
