//! History compaction.
//!
//! Long histories are folded into one summary line so the envelope only
//! replays the retained tail.

use std::collections::HashMap;

use convoke_core::memory::Step;

/// When and how much history to compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    /// Compact once history holds more than this many steps; 0 disables
    pub after: usize,
    /// Steps kept verbatim; at least 1
    pub keep: usize,
}

impl CompactionPolicy {
    pub fn new(after: usize, keep: usize) -> Self {
        Self {
            after,
            keep: keep.max(1),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0, 1)
    }

    /// Whether a history of `len` steps would be folded.
    pub fn applies_to(&self, len: usize) -> bool {
        self.after > 0 && len > self.after && self.keep < len
    }
}

/// The outcome of compacting a history slice.
#[derive(Debug, PartialEq)]
pub struct Compacted<'a> {
    /// Summary system text, present when older steps were folded away
    pub summary: Option<String>,
    /// Steps retained verbatim, oldest first
    pub retained: &'a [Step],
}

pub fn compact(history: &[Step], policy: CompactionPolicy) -> Compacted<'_> {
    if !policy.applies_to(history.len()) {
        return Compacted {
            summary: None,
            retained: history,
        };
    }

    let cut = history.len() - policy.keep;
    let (older, retained) = history.split_at(cut);
    Compacted {
        summary: Some(summarize(older)),
        retained,
    }
}

/// `[HISTORY COMPACTED] Earlier N steps summarized (M tool calls). Top tools: ...`
pub fn summarize(steps: &[Step]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut calls = 0usize;
    for step in steps {
        for call in &step.tool_calls {
            *counts.entry(call.name.as_str()).or_default() += 1;
            calls += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let top = if ranked.is_empty() {
        "none".to_string()
    } else {
        ranked
            .iter()
            .take(5)
            .map(|(name, n)| format!("{name} x{n}"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "[HISTORY COMPACTED] Earlier {} steps summarized ({calls} tool calls). Top tools: {top}. Recent context retained.",
        steps.len()
    )
}
