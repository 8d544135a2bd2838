//! Context budget management.
//!
//! Keeps the working message sequence, plus the cost of the tool schemas,
//! under the active model's budget window. Trimming blanks middle messages
//! oldest-first; the system prompt (first) and the newest message (last)
//! are never touched.

use std::collections::HashSet;
use std::sync::Arc;

use convoke_config::RuntimeConfig;
use convoke_core::message::{ChatMessage, Role};
use convoke_core::model::ToolSpec;
use convoke_telemetry::PricingTable;
use serde::Serialize;
use tracing::debug;

use super::token::{TokenCounter, count_message, count_messages, count_tool_specs};

/// Ceiling used when the pricing table has no context window for a model.
pub const DEFAULT_CONTEXT_LIMIT: u64 = 120_000;
/// Hard cap applied to any model whose name contains "claude".
pub const CLAUDE_CONTEXT_CAP: u64 = 60_000;
pub const MIN_OUTPUT_RESERVE: u64 = 256;

/// The resolved token window for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetWindow {
    /// Maximum tokens the request may occupy
    pub ceiling: u64,
    /// Tokens held back for the model's answer
    pub reserve: u64,
    /// `ceiling - reserve`: what messages plus tool schemas must fit in
    pub target: u64,
}

impl BudgetWindow {
    /// Resolve the window for `model`.
    ///
    /// An explicit ceiling from config is used as-is. Otherwise the pricing
    /// table's context limit (120k when unknown) is scaled to 85% headroom,
    /// falling back to `limit - 2000` and then `limit - 1000` when that
    /// leaves less than 4000 and 2000 tokens respectively. Claude models are
    /// always capped at 60k.
    pub fn resolve(model: &str, config: &RuntimeConfig, pricing: &PricingTable) -> Self {
        let mut ceiling = match config.context_max_tokens() {
            Some(explicit) => explicit,
            None => {
                let limit = match pricing.context_limit(model) {
                    0 => DEFAULT_CONTEXT_LIMIT,
                    l => l,
                };
                headroom(limit)
            }
        };

        if model.to_lowercase().contains("claude") && ceiling > CLAUDE_CONTEXT_CAP {
            ceiling = CLAUDE_CONTEXT_CAP;
        }

        Self::with_reserve(ceiling, config.context_reserve_output())
    }

    /// Build a window from a ceiling and a requested output reserve.
    pub fn with_reserve(ceiling: u64, reserve: u64) -> Self {
        let reserve = reserve.max(MIN_OUTPUT_RESERVE);
        let mut target = ceiling.saturating_sub(reserve);
        if target < 1000 {
            target = ceiling.saturating_sub(500);
        }
        Self {
            ceiling,
            reserve,
            target,
        }
    }

    /// A window with an exact target and no reserve arithmetic.
    pub fn with_target(target: u64) -> Self {
        Self {
            ceiling: target,
            reserve: 0,
            target,
        }
    }
}

fn headroom(limit: u64) -> u64 {
    let mut h = limit * 85 / 100;
    if h < 4000 {
        h = limit.saturating_sub(2000);
    }
    if h < 2000 {
        h = limit.saturating_sub(1000);
    }
    if h == 0 { limit } else { h }
}

/// Trims message sequences to fit a [`BudgetWindow`].
#[derive(Clone)]
pub struct ContextBudgetManager {
    window: BudgetWindow,
    counter: Arc<dyn TokenCounter>,
}

impl ContextBudgetManager {
    pub fn new(window: BudgetWindow, counter: Arc<dyn TokenCounter>) -> Self {
        Self { window, counter }
    }

    pub fn window(&self) -> BudgetWindow {
        self.window
    }

    pub fn counter(&self) -> &dyn TokenCounter {
        self.counter.as_ref()
    }

    /// Tokens the request would occupy.
    pub fn measure(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> u64 {
        count_messages(self.counter.as_ref(), messages) + count_tool_specs(self.counter.as_ref(), tools)
    }

    /// Fit `messages` into the window.
    ///
    /// Returns the input unchanged when it already fits or has fewer than
    /// two messages. Otherwise blanks middle messages oldest-first until the
    /// total is within target, then drops middle messages left empty
    /// (system messages excepted) along with tool results answering calls
    /// of the assistant messages blanked in this pass.
    pub fn trim(&self, mut messages: Vec<ChatMessage>, tools: &[ToolSpec]) -> Vec<ChatMessage> {
        let target = self.window.target;
        let mut total = self.measure(&messages, tools);
        if total <= target || messages.len() < 2 {
            return messages;
        }

        let before = total;
        let last = messages.len() - 1;
        let mut blanked = 0usize;
        let mut dropped_calls: HashSet<String> = HashSet::new();
        for msg in &mut messages[1..last] {
            if total <= target {
                break;
            }
            let cost = count_message(self.counter.as_ref(), msg);
            dropped_calls.extend(msg.tool_calls.iter().map(|tc| tc.id.clone()));
            msg.blank();
            total = total.saturating_sub(cost);
            blanked += 1;
        }

        let Some(newest) = messages.pop() else {
            return messages;
        };
        let mut iter = messages.into_iter();
        let Some(first) = iter.next() else {
            return vec![newest];
        };

        let middle: Vec<ChatMessage> = iter
            .filter(|m| m.role == Role::System || !m.is_blank())
            .filter(|m| match (&m.role, &m.tool_call_id) {
                (Role::Tool, Some(id)) => !dropped_calls.contains(id),
                _ => true,
            })
            .collect();

        let mut out = Vec::with_capacity(middle.len() + 2);
        out.push(first);
        out.extend(middle);
        out.push(newest);

        debug!(
            before,
            after = self.measure(&out, tools),
            target,
            blanked,
            kept = out.len(),
            "Trimmed context to budget"
        );
        out
    }
}

impl std::fmt::Debug for ContextBudgetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBudgetManager")
            .field("window", &self.window)
            .finish()
    }
}
