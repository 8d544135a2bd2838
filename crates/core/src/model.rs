//! ModelClient trait: the abstraction over language-model backends.
//!
//! A client receives the working message sequence plus the active tool
//! schemas and answers with a stream of fragments. The runtime never sees
//! the wire protocol; it only folds fragments into a [`Completion`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ModelError;
use crate::message::{ChatMessage, ToolCall};

/// A tool schema sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Token usage reported by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A single fragment of a streaming response.
///
/// Content deltas may arrive on any fragment. Tool calls, usage, the
/// resolved model name and the response identifier only arrive on the
/// terminal fragment (`done == true`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,

    /// Whether this is the final fragment
    #[serde(default)]
    pub done: bool,

    /// Tool calls requested by the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Usage info
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Which model actually responded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Provider-side conversation handle, when the provider links turns itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

impl StreamChunk {
    /// A content-only fragment.
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta: Some(text.into()),
            ..Self::default()
        }
    }

    /// An empty terminal fragment.
    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.usage = Some(Usage {
            input_tokens,
            output_tokens,
        });
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_response_id(mut self, id: impl Into<String>) -> Self {
        self.response_id = Some(id.into());
        self
    }
}

/// The folded result of one streamed model invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model_name: String,
}

/// The receiving half of a fragment stream. An `Err` item aborts the stream.
pub type ChunkReceiver = mpsc::Receiver<std::result::Result<StreamChunk, ModelError>>;

/// The core ModelClient trait.
///
/// Implementations usually spawn a background task that decodes the
/// provider's wire format and feeds the channel; the runtime consumes it on
/// the session's own task.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Start a streamed completion over `messages` with `tools` available.
    async fn stream(
        &self,
        cancel: &CancellationToken,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> std::result::Result<ChunkReceiver, ModelError>;
}
