//! Memory traits: an agent's turn history and optional semantic recall.
//!
//! The session records exactly one [`Step`] per completed turn. The prompt
//! envelope reads the history back to replay the most recent exchange.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::MemoryError;
use crate::message::ToolCall;

/// One memory record per completed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// The user input that started the turn
    pub input: String,

    /// The model's textual output
    pub output: String,

    /// Tool calls issued during the turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Tool call ID → textual result, one per call that reached an outcome
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tool_results: HashMap<String, String>,

    /// When the step was recorded
    pub timestamp: DateTime<Utc>,
}

impl Step {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: String::new(),
            tool_calls: Vec::new(),
            tool_results: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Results in the order their calls were issued. Results without a
    /// matching call (should not happen) follow, sorted by ID.
    pub fn ordered_results(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = self
            .tool_calls
            .iter()
            .filter_map(|c| {
                self.tool_results
                    .get(&c.id)
                    .map(|r| (c.id.as_str(), r.as_str()))
            })
            .collect();
        let mut orphans: Vec<(&str, &str)> = self
            .tool_results
            .iter()
            .filter(|(id, _)| !self.tool_calls.iter().any(|c| &c.id == *id))
            .map(|(id, r)| (id.as_str(), r.as_str()))
            .collect();
        orphans.sort();
        out.extend(orphans);
        out
    }
}

/// Ordered storage of an agent's steps.
///
/// Implementations must tolerate concurrent readers while the owning
/// session writes; a reader may see a snapshot one step behind.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// All recorded steps, oldest first.
    async fn history(&self) -> std::result::Result<Vec<Step>, MemoryError>;

    /// Append a step.
    async fn add_step(&self, step: Step) -> std::result::Result<(), MemoryError>;

    /// Number of recorded steps.
    async fn len(&self) -> std::result::Result<usize, MemoryError> {
        Ok(self.history().await?.len())
    }

    /// Forget everything.
    async fn clear(&self) -> std::result::Result<(), MemoryError>;
}

/// A scored match from a [`VectorStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub score: f32,
}

/// Semantic recall attached to an agent. Optional; shared with derived agents.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, id: &str, text: &str) -> std::result::Result<(), MemoryError>;

    async fn query(&self, text: &str, limit: usize)
    -> std::result::Result<Vec<VectorHit>, MemoryError>;
}
