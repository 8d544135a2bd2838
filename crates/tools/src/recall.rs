//! Recall tool: semantic search over the agent's vector store.

use async_trait::async_trait;
use convoke_core::error::ToolError;
use convoke_core::memory::VectorStore;
use convoke_core::tool::Tool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 20;

pub struct RecallTool {
    store: Arc<dyn VectorStore>,
}

impl RecallTool {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RecallTool {
    fn name(&self) -> &str {
        "recall"
    }

    fn description(&self) -> &str {
        "Search stored notes for text related to a query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to look for" },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results (default 5)",
                    "default": DEFAULT_LIMIT
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        let query = arguments["query"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::Failed("missing 'query' argument".into()))?;
        let limit = arguments["limit"]
            .as_u64()
            .map(|n| (n as usize).clamp(1, MAX_LIMIT))
            .unwrap_or(DEFAULT_LIMIT);

        let hits = tokio::select! {
            _ = cancel.cancelled() => return Err(ToolError::Cancelled("recall".into())),
            res = self.store.query(query, limit) => res.map_err(|e| ToolError::Failed(e.to_string()))?,
        };

        tracing::debug!(query, hits = hits.len(), "Recall search");

        let results: Vec<serde_json::Value> = hits
            .into_iter()
            .map(|h| serde_json::json!({"id": h.id, "text": h.text, "score": h.score}))
            .collect();
        Ok(serde_json::json!({ "query": query, "results": results }).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoke_memory::InMemoryVectorStore;

    #[tokio::test]
    async fn returns_json_results() {
        let store = Arc::new(InMemoryVectorStore::new());
        store.add("n1", "the deploy key rotates weekly").await.unwrap();
        store.add("n2", "lunch is at noon").await.unwrap();

        let tool = RecallTool::new(store);
        let out = tool
            .execute(
                serde_json::json!({"query": "deploy key"}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["results"][0]["id"], "n1");
    }

    #[tokio::test]
    async fn blank_query_fails() {
        let tool = RecallTool::new(Arc::new(InMemoryVectorStore::new()));
        let err = tool
            .execute(serde_json::json!({"query": "  "}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed(_)));
    }
}
