//! Builds the ordered message list for one model invocation.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use convoke_core::memory::Step;
use convoke_core::message::ChatMessage;
use convoke_core::model::ToolSpec;
use tracing::debug;

use super::compaction::{CompactionPolicy, compact};
use super::sections::{Platform, is_sectionized, platform_guidance, sectionize};

/// Used when an agent has no prompt of its own.
pub const DEFAULT_PROMPT: &str = "You are a helpful assistant. Use the available tools \
when they help you answer accurately, and answer directly when they do not.";

/// Replayed tool results longer than this are cut.
pub const MAX_TOOL_RESULT_BYTES: usize = 2048;

/// Variable whose value fills the `<agents>` section.
pub const AGENTS_SECTION_VAR: &str = "AGENTS_SECTION";

/// Message builder for a session.
///
/// Holds what stays fixed for the session: the tool schemas, the template
/// variables, the platform and the compaction policy.
#[derive(Debug, Clone)]
pub struct PromptEnvelope {
    tools: Vec<ToolSpec>,
    vars: HashMap<String, String>,
    platform: Platform,
    compaction: CompactionPolicy,
    extras: BTreeMap<String, String>,
}

impl PromptEnvelope {
    pub fn new(tools: Vec<ToolSpec>) -> Self {
        Self {
            tools,
            vars: HashMap::new(),
            platform: Platform::current(),
            compaction: CompactionPolicy::disabled(),
            extras: BTreeMap::new(),
        }
    }

    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_compaction(mut self, policy: CompactionPolicy) -> Self {
        self.compaction = policy;
        self
    }

    /// Add an extra `<key>` section to the expanded prompt.
    pub fn with_section(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    /// Expand a base prompt into the sectioned system prompt.
    ///
    /// Blank prompts fall back to [`DEFAULT_PROMPT`]. Already-expanded
    /// prompts pass through untouched.
    pub fn expand_prompt(&self, prompt: &str) -> String {
        let base = match prompt.trim() {
            "" => DEFAULT_PROMPT,
            p => p,
        };
        let base = substitute_vars(base, &self.vars);
        if is_sectionized(&base) {
            return base.into_owned();
        }

        let guidance = platform_guidance(self.platform, &self.tools);
        sectionize(
            &base,
            &self.tools,
            self.vars.get(AGENTS_SECTION_VAR).map(String::as_str),
            Some(&guidance),
            &self.extras,
        )
    }

    /// The message list for a new turn.
    ///
    /// Order: system prompt, an optional compaction summary, a replay of the
    /// most recent retained step, then `input` as the final user message.
    pub fn build(&self, prompt: &str, input: &str, history: &[Step]) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.expand_prompt(prompt))];

        let compacted = compact(history, self.compaction);
        if let Some(summary) = compacted.summary {
            messages.push(ChatMessage::system(summary));
        }

        if let Some(last) = compacted.retained.last() {
            replay_step(last, &mut messages);
        }

        messages.push(ChatMessage::user(input));

        debug!(
            messages = messages.len(),
            history = history.len(),
            replayed = compacted.retained.len().min(1),
            "Built prompt envelope"
        );
        messages
    }
}

fn replay_step(step: &Step, out: &mut Vec<ChatMessage>) {
    let input = step.input.trim();
    if !input.is_empty() {
        out.push(ChatMessage::user(input));
    }

    if !step.output.trim().is_empty() || !step.tool_calls.is_empty() {
        out.push(ChatMessage::assistant_with_tools(
            step.output.clone(),
            step.tool_calls.clone(),
        ));
    }

    for (id, result) in step.ordered_results() {
        out.push(ChatMessage::tool_result(id, truncate_result(result)));
    }
}

/// Cut a tool result to [`MAX_TOOL_RESULT_BYTES`] on a char boundary,
/// noting the original size.
pub fn truncate_result(result: &str) -> Cow<'_, str> {
    if result.len() <= MAX_TOOL_RESULT_BYTES {
        return Cow::Borrowed(result);
    }
    let mut cut = MAX_TOOL_RESULT_BYTES;
    while !result.is_char_boundary(cut) {
        cut -= 1;
    }
    Cow::Owned(format!(
        "{}...\n[TRUNCATED: originally {} bytes]",
        &result[..cut],
        result.len()
    ))
}

/// Replace `{{name}}` placeholders with values from `vars`.
pub fn substitute_vars<'a>(text: &'a str, vars: &HashMap<String, String>) -> Cow<'a, str> {
    if vars.is_empty() || !text.contains("{{") {
        return Cow::Borrowed(text);
    }
    let mut out = text.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{{{key}}}}}");
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, value);
        }
    }
    Cow::Owned(out)
}

/// Apply [`substitute_vars`] to every string inside a JSON value.
pub fn substitute_value(value: &mut serde_json::Value, vars: &HashMap<String, String>) {
    if vars.is_empty() {
        return;
    }
    match value {
        serde_json::Value::String(s) => {
            if let Cow::Owned(replaced) = substitute_vars(s, vars) {
                *s = replaced;
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                substitute_value(item, vars);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values_mut() {
                substitute_value(item, vars);
            }
        }
        _ => {}
    }
}
