//! Duplicate tool-call detection.

use std::collections::VecDeque;

use convoke_core::message::ToolCall;

pub const GUARD_WINDOW: usize = 6;
pub const GUARD_THRESHOLD: usize = 3;

/// A tool call reduced to what makes it a repeat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolCallSignature {
    pub name: String,
    pub arguments: String,
}

impl From<&ToolCall> for ToolCallSignature {
    fn from(call: &ToolCall) -> Self {
        Self {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        }
    }
}

/// Sliding window over the last [`GUARD_WINDOW`] call signatures of a
/// session. Trips once any signature appears [`GUARD_THRESHOLD`] times.
#[derive(Debug, Default)]
pub struct DuplicateCallGuard {
    window: VecDeque<ToolCallSignature>,
}

impl DuplicateCallGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch of calls in order. Returns the loop-prevention message
    /// at the first call whose signature now fills the threshold; later calls
    /// in the batch are not recorded.
    pub fn observe(&mut self, calls: &[ToolCall]) -> Option<String> {
        for call in calls {
            if self.window.len() == GUARD_WINDOW {
                self.window.pop_front();
            }
            self.window.push_back(ToolCallSignature::from(call));
            let repeats = self.repeats(call);
            if repeats >= GUARD_THRESHOLD {
                tracing::debug!(tool = %call.name, repeats, "Repeated tool call detected");
                return Some(loop_message(&call.name));
            }
        }
        None
    }

    fn repeats(&self, call: &ToolCall) -> usize {
        self.window
            .iter()
            .filter(|s| s.name == call.name && s.arguments == call.arguments)
            .count()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

pub fn loop_message(tool_name: &str) -> String {
    format!(
        "Task completed. Detected repeated tool execution ({tool_name}), stopping to prevent infinite loop."
    )
}
