//! Stream aggregation.
//!
//! A model client hands back a channel of fragments fed by a background
//! task. [`ChunkAggregator`] drains it into a single [`Completion`].

use std::sync::Arc;

use convoke_core::error::ModelError;
use convoke_core::event::{TraceEvent, TraceEventKind, Tracer};
use convoke_core::model::{ChunkReceiver, Completion};
use tracing::{debug, trace};

/// Single-consumer fragment collector for one model invocation.
pub struct ChunkAggregator {
    tracer: Arc<dyn Tracer>,
    agent_id: String,
    fallback_model: String,
}

impl ChunkAggregator {
    /// `fallback_model` names the completion when the stream never reports
    /// a resolved model.
    pub fn new(
        tracer: Arc<dyn Tracer>,
        agent_id: impl Into<String>,
        fallback_model: impl Into<String>,
    ) -> Self {
        Self {
            tracer,
            agent_id: agent_id.into(),
            fallback_model: fallback_model.into(),
        }
    }

    /// Drain `rx` until the producer closes it.
    ///
    /// Deltas are concatenated in arrival order. Tool calls, usage, model
    /// name and response ID are read only from fragments marked `done`;
    /// if several terminal fragments carry them the last one wins. An error fragment ends
    /// aggregation at once and is returned as-is.
    ///
    /// Returns the completion plus the provider response ID, empty when the
    /// provider did not assign one.
    pub async fn collect(&self, mut rx: ChunkReceiver) -> Result<(Completion, String), ModelError> {
        let mut completion = Completion::default();
        let mut response_id = String::new();
        let mut fragments = 0usize;

        while let Some(item) = rx.recv().await {
            let chunk = item?;
            fragments += 1;

            if let Some(delta) = chunk.delta.as_deref()
                && !delta.is_empty()
            {
                completion.content.push_str(delta);
                self.tracer.write(TraceEvent::new(
                    TraceEventKind::Token,
                    &self.agent_id,
                    serde_json::json!({ "delta": delta }),
                ));
            }

            if !chunk.done {
                continue;
            }
            trace!(fragments, "Terminal fragment received");
            if !chunk.tool_calls.is_empty() {
                completion.tool_calls = chunk.tool_calls;
            }
            if let Some(usage) = chunk.usage {
                completion.input_tokens = usage.input_tokens;
                completion.output_tokens = usage.output_tokens;
            }
            if let Some(model) = chunk.model.filter(|m| !m.is_empty()) {
                completion.model_name = model;
            }
            if let Some(id) = chunk.response_id.filter(|id| !id.is_empty()) {
                response_id = id;
            }
        }

        if completion.model_name.is_empty() {
            completion.model_name = self.fallback_model.clone();
        }

        debug!(
            fragments,
            chars = completion.content.len(),
            tool_calls = completion.tool_calls.len(),
            model = %completion.model_name,
            linked = !response_id.is_empty(),
            "Stream aggregated"
        );
        Ok((completion, response_id))
    }
}
