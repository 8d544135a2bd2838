//! A model client that replays canned responses.
//!
//! Each call to [`ModelClient::stream`] consumes the next scripted turn and
//! feeds its fragments through a channel from a background task, the same
//! way a network client would.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use convoke_core::error::ModelError;
use convoke_core::message::{ChatMessage, ToolCall};
use convoke_core::model::{ChunkReceiver, ModelClient, StreamChunk, ToolSpec};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One entry of a replay script: either a stream fragment or an error that
/// ends the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptFragment {
    Error { error: String },
    Chunk(StreamChunk),
}

impl From<ScriptFragment> for Result<StreamChunk, ModelError> {
    fn from(fragment: ScriptFragment) -> Self {
        match fragment {
            ScriptFragment::Error { error } => Err(ModelError::StreamInterrupted(error)),
            ScriptFragment::Chunk(chunk) => Ok(chunk),
        }
    }
}

type Turn = Vec<Result<StreamChunk, ModelError>>;

#[derive(Debug)]
pub struct ScriptedClient {
    name: String,
    turns: Mutex<VecDeque<Turn>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedClient {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            name: "scripted".into(),
            turns: Mutex::new(turns.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn from_script(script: Vec<Vec<ScriptFragment>>) -> Self {
        Self::new(
            script
                .into_iter()
                .map(|turn| turn.into_iter().map(Into::into).collect())
                .collect(),
        )
    }

    /// Parse a JSON array of turns, each an array of fragments.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let script: Vec<Vec<ScriptFragment>> = serde_json::from_str(json)?;
        Ok(Self::from_script(script))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of `stream` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Turns not yet consumed.
    pub fn remaining(&self) -> usize {
        self.turns.lock().len()
    }

    /// The message lists the client was invoked with, in call order.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().clone()
    }
}

/// A turn that answers with plain text.
pub fn text_turn(text: &str) -> Turn {
    vec![
        Ok(StreamChunk::delta(text)),
        Ok(StreamChunk::done().with_usage(10, 5)),
    ]
}

/// A turn that requests tool calls.
pub fn tool_turn(calls: Vec<ToolCall>) -> Turn {
    vec![Ok(StreamChunk::done().with_tool_calls(calls).with_usage(10, 5))]
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(
        &self,
        cancel: &CancellationToken,
        messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> Result<ChunkReceiver, ModelError> {
        if cancel.is_cancelled() {
            return Err(ModelError::Cancelled);
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().push(messages.to_vec());

        let Some(turn) = self.turns.lock().pop_front() else {
            return Err(ModelError::NotConfigured(format!(
                "script exhausted at call {call}"
            )));
        };

        let (tx, rx) = mpsc::channel(turn.len().max(1));
        tokio::spawn(async move {
            for fragment in turn {
                if tx.send(fragment).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}
