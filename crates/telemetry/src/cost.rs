//! Per-agent cost accumulator with token and dollar budgets.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::pricing::PricingTable;

/// Token usage accumulated for one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub calls: u64,
}

impl ModelUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Point-in-time view of a tracker, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSnapshot {
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub budget_tokens: u64,
    pub budget_usd: f64,
    pub over_budget: bool,
    pub by_model: HashMap<String, ModelUsage>,
}

/// Accumulates model usage for a single agent.
///
/// Written only by the owning session after each completion; safe to read
/// from other tasks at any time.
#[derive(Debug)]
pub struct CostTracker {
    pricing: Arc<PricingTable>,
    usage: RwLock<HashMap<String, ModelUsage>>,
    /// 0 = unlimited
    budget_tokens: u64,
    /// 0 = unlimited
    budget_usd: f64,
}

impl CostTracker {
    pub fn new(pricing: Arc<PricingTable>) -> Self {
        Self {
            pricing,
            usage: RwLock::new(HashMap::new()),
            budget_tokens: 0,
            budget_usd: 0.0,
        }
    }

    pub fn with_budget(mut self, budget_tokens: u64, budget_usd: f64) -> Self {
        self.budget_tokens = budget_tokens;
        self.budget_usd = budget_usd.max(0.0);
        self
    }

    /// A zeroed tracker with the same pricing and limits.
    pub fn fresh(&self) -> Self {
        Self {
            pricing: Arc::clone(&self.pricing),
            usage: RwLock::new(HashMap::new()),
            budget_tokens: self.budget_tokens,
            budget_usd: self.budget_usd,
        }
    }

    pub fn pricing(&self) -> &Arc<PricingTable> {
        &self.pricing
    }

    /// Record one completion. Returns whether the tracker is now over budget.
    pub fn add_model_usage(&self, model: &str, input_tokens: u64, output_tokens: u64) -> bool {
        {
            let mut usage = self.usage.write();
            let entry = usage.entry(model.to_string()).or_default();
            entry.input_tokens += input_tokens;
            entry.output_tokens += output_tokens;
            entry.calls += 1;
        }
        tracing::debug!(
            model,
            input_tokens,
            output_tokens,
            total_tokens = self.total_tokens(),
            "Recorded model usage"
        );
        self.over_budget()
    }

    pub fn total_tokens(&self) -> u64 {
        self.usage.read().values().map(ModelUsage::total_tokens).sum()
    }

    /// Total spend across models, priced through the pricing table.
    pub fn total_cost(&self) -> f64 {
        self.usage
            .read()
            .iter()
            .map(|(model, u)| {
                self.pricing
                    .compute_cost(model, u.input_tokens, u.output_tokens)
            })
            .sum()
    }

    /// True once either configured limit is exceeded.
    pub fn over_budget(&self) -> bool {
        (self.budget_tokens > 0 && self.total_tokens() > self.budget_tokens)
            || (self.budget_usd > 0.0 && self.total_cost() > self.budget_usd)
    }

    pub fn usage_for(&self, model: &str) -> Option<ModelUsage> {
        self.usage.read().get(model).copied()
    }

    pub fn snapshot(&self) -> CostSnapshot {
        CostSnapshot {
            total_tokens: self.total_tokens(),
            total_cost_usd: self.total_cost(),
            budget_tokens: self.budget_tokens,
            budget_usd: self.budget_usd,
            over_budget: self.over_budget(),
            by_model: self.usage.read().clone(),
        }
    }
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new(Arc::new(PricingTable::with_defaults()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::ModelPricing;

    fn tracker() -> CostTracker {
        let table = PricingTable::empty();
        table.set("m", ModelPricing::new(1.0, 2.0));
        CostTracker::new(Arc::new(table))
    }

    #[test]
    fn accumulates_per_model() {
        let t = tracker();
        t.add_model_usage("m", 100, 50);
        t.add_model_usage("m", 10, 5);
        t.add_model_usage("other", 1, 1);

        let m = t.usage_for("m").unwrap();
        assert_eq!(m.input_tokens, 110);
        assert_eq!(m.output_tokens, 55);
        assert_eq!(m.calls, 2);
        assert_eq!(t.total_tokens(), 167);
    }

    #[test]
    fn cost_uses_pricing_table() {
        let t = tracker();
        t.add_model_usage("m", 1_000_000, 1_000_000);
        // 1.0 + 2.0
        assert!((t.total_cost() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn unlimited_by_default() {
        let t = tracker();
        assert!(!t.add_model_usage("m", 10_000_000, 10_000_000));
    }

    #[test]
    fn token_budget_trips() {
        let t = tracker().with_budget(100, 0.0);
        assert!(!t.add_model_usage("m", 60, 40));
        assert!(t.add_model_usage("m", 1, 0));
        assert!(t.over_budget());
    }

    #[test]
    fn dollar_budget_trips() {
        let t = tracker().with_budget(0, 1.0);
        assert!(!t.add_model_usage("m", 500_000, 0));
        assert!(t.add_model_usage("m", 600_000, 0));
    }

    #[test]
    fn fresh_keeps_limits_drops_usage() {
        let t = tracker().with_budget(100, 0.0);
        t.add_model_usage("m", 200, 0);
        let child = t.fresh();
        assert_eq!(child.total_tokens(), 0);
        assert!(!child.over_budget());
        assert!(child.add_model_usage("m", 101, 0));
    }

    #[test]
    fn snapshot_reports_state() {
        let t = tracker().with_budget(10, 0.0);
        t.add_model_usage("m", 20, 0);
        let snap = t.snapshot();
        assert!(snap.over_budget);
        assert_eq!(snap.total_tokens, 20);
        assert_eq!(snap.by_model.len(), 1);
    }
}
