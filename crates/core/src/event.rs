//! Trace events: observability output of a conversation.
//!
//! The session and the executor emit typed events as they work. Events are
//! fire-and-forget: a tracer can never influence control flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Kinds of trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventKind {
    /// A model invocation is about to start
    ModelStart,
    /// An iteration of the conversation loop began
    StepStart,
    /// A tool call is about to run
    ToolStart,
    /// A tool call finished (success or error)
    ToolEnd,
    /// A content delta arrived from the model
    Token,
    /// The session produced its final answer
    Final,
    /// A summary record (e.g., history compaction)
    Summary,
}

/// A single observability event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TraceEventKind,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl TraceEvent {
    pub fn new(kind: TraceEventKind, agent_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            agent_id: agent_id.into(),
            data,
        }
    }
}

/// An event sink.
pub trait Tracer: Send + Sync {
    fn write(&self, event: TraceEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn write(&self, _event: TraceEvent) {}
}

/// A broadcast-based tracer.
///
/// Uses `tokio::sync::broadcast` for multi-consumer fan-out, so a UI and a
/// log shipper can both follow the same session.
pub struct BroadcastTracer {
    sender: broadcast::Sender<Arc<TraceEvent>>,
}

impl BroadcastTracer {
    /// Create a new tracer with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TraceEvent>> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastTracer {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Tracer for BroadcastTracer {
    fn write(&self, event: TraceEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }
}
