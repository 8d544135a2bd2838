//! Token counting.
//!
//! The runtime only needs a consistent estimate, not a provider-exact
//! count, so the default is a character heuristic: ~4 characters per token,
//! rounded up. A real tokenizer can be injected through [`TokenCounter`].

use convoke_core::message::ChatMessage;
use convoke_core::model::ToolSpec;

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> u64;
}

/// 1 token ≈ 4 bytes, rounded up.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> u64 {
        (text.len() as u64).div_ceil(4)
    }
}

/// Tokens for one message: its content plus, for every tool call, the
/// name and the raw argument payload.
pub fn count_message(counter: &dyn TokenCounter, message: &ChatMessage) -> u64 {
    counter.count(&message.content)
        + message
            .tool_calls
            .iter()
            .map(|tc| counter.count(&tc.name) + counter.count(&tc.arguments))
            .sum::<u64>()
}

pub fn count_messages(counter: &dyn TokenCounter, messages: &[ChatMessage]) -> u64 {
    messages.iter().map(|m| count_message(counter, m)).sum()
}

/// Tokens for one tool schema: name, description, and each top-level
/// parameter key with its serialized value.
pub fn count_tool_spec(counter: &dyn TokenCounter, spec: &ToolSpec) -> u64 {
    let params = match spec.parameters.as_object() {
        Some(map) => map
            .iter()
            .map(|(k, v)| counter.count(k) + counter.count(&v.to_string()))
            .sum(),
        None => counter.count(&spec.parameters.to_string()),
    };
    counter.count(&spec.name) + counter.count(&spec.description) + params
}

pub fn count_tool_specs(counter: &dyn TokenCounter, specs: &[ToolSpec]) -> u64 {
    specs.iter().map(|s| count_tool_spec(counter, s)).sum()
}
