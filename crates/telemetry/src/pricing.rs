//! Built-in pricing table for common LLM models.
//!
//! Prices are in USD per 1 million tokens. Each model has an input and
//! output price plus its context window. Custom entries can be added at
//! runtime from TOML config.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-million-token pricing and context window for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
    /// Context window in tokens. Zero when unknown.
    #[serde(default)]
    pub context_limit: u64,
}

impl ModelPricing {
    /// Create a new pricing entry.
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
            context_limit: 0,
        }
    }

    pub fn with_context(mut self, context_limit: u64) -> Self {
        self.context_limit = context_limit;
        self
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

const PROVIDER_PREFIXES: [&str; 6] = [
    "openai",
    "anthropic",
    "google",
    "mistral",
    "deepseek",
    "meta-llama",
];

/// Thread-safe pricing table with built-in defaults and custom overrides.
///
/// Injected into the runtime as a read-mostly service; the budget manager
/// asks it for context windows and the cost tracker for prices.
pub struct PricingTable {
    prices: RwLock<HashMap<String, ModelPricing>>,
}

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();

        // ── Anthropic ──────────────────────────────────────────────
        for (name, inp, out) in [
            ("anthropic/claude-sonnet-4", 3.0, 15.0),
            ("anthropic/claude-opus-4", 15.0, 75.0),
            ("anthropic/claude-3.5-sonnet", 3.0, 15.0),
            ("anthropic/claude-3.5-haiku", 0.8, 4.0),
            ("anthropic/claude-3-haiku", 0.25, 1.25),
        ] {
            prices.insert(name.into(), ModelPricing::new(inp, out).with_context(200_000));
        }

        // ── OpenAI ─────────────────────────────────────────────────
        prices.insert(
            "openai/gpt-4o".into(),
            ModelPricing::new(2.5, 10.0).with_context(128_000),
        );
        prices.insert(
            "openai/gpt-4o-mini".into(),
            ModelPricing::new(0.15, 0.6).with_context(128_000),
        );
        prices.insert(
            "openai/gpt-4-turbo".into(),
            ModelPricing::new(10.0, 30.0).with_context(128_000),
        );
        prices.insert(
            "openai/gpt-4.1".into(),
            ModelPricing::new(2.0, 8.0).with_context(1_047_576),
        );
        prices.insert(
            "openai/o1".into(),
            ModelPricing::new(15.0, 60.0).with_context(200_000),
        );
        prices.insert(
            "openai/o3-mini".into(),
            ModelPricing::new(1.1, 4.4).with_context(200_000),
        );

        // ── Google ─────────────────────────────────────────────────
        prices.insert(
            "google/gemini-2.0-flash".into(),
            ModelPricing::new(0.1, 0.4).with_context(1_048_576),
        );
        prices.insert(
            "google/gemini-1.5-pro".into(),
            ModelPricing::new(1.25, 5.0).with_context(2_097_152),
        );

        // ── Meta (via OpenRouter) ──────────────────────────────────
        prices.insert(
            "meta-llama/llama-3.1-70b".into(),
            ModelPricing::new(0.52, 0.75).with_context(131_072),
        );
        prices.insert(
            "meta-llama/llama-3.1-8b".into(),
            ModelPricing::new(0.055, 0.055).with_context(131_072),
        );

        // ── Mistral ────────────────────────────────────────────────
        prices.insert(
            "mistral/mistral-large".into(),
            ModelPricing::new(2.0, 6.0).with_context(128_000),
        );
        prices.insert(
            "mistral/mistral-small".into(),
            ModelPricing::new(0.2, 0.6).with_context(32_000),
        );

        // ── DeepSeek ───────────────────────────────────────────────
        prices.insert(
            "deepseek/deepseek-v3".into(),
            ModelPricing::new(0.27, 1.1).with_context(64_000),
        );
        prices.insert(
            "deepseek/deepseek-r1".into(),
            ModelPricing::new(0.55, 2.19).with_context(64_000),
        );

        Self {
            prices: RwLock::new(prices),
        }
    }

    /// Create an empty pricing table.
    pub fn empty() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    /// Exact-name lookup.
    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        self.prices.read().get(model).cloned()
    }

    /// Add or update pricing for a model.
    pub fn set(&self, model: impl Into<String>, pricing: ModelPricing) {
        self.prices.write().insert(model.into(), pricing);
    }

    /// Flexible lookup: exact match, then with a provider prefix
    /// (`gpt-4o` → `openai/gpt-4o`), then the longest table entry whose
    /// bare name prefixes the model (`gpt-4o-mini-2024-07-18` → `gpt-4o-mini`).
    pub fn resolve(&self, model: &str) -> Option<ModelPricing> {
        let prices = self.prices.read();

        if let Some(p) = prices.get(model) {
            return Some(p.clone());
        }

        for prefix in PROVIDER_PREFIXES {
            if let Some(p) = prices.get(&format!("{prefix}/{model}")) {
                return Some(p.clone());
            }
        }

        let model_lower = model.to_lowercase();
        let bare_model = model_lower.rsplit('/').next().unwrap_or(&model_lower);

        let mut best: Option<(usize, &ModelPricing)> = None;
        for (key, pricing) in prices.iter() {
            let bare_key = key.rsplit('/').next().unwrap_or(key).to_lowercase();
            if bare_model.starts_with(&bare_key) && best.is_none_or(|(len, _)| bare_key.len() > len) {
                best = Some((bare_key.len(), pricing));
            }
        }
        best.map(|(_, p)| p.clone())
    }

    /// Compute cost for a model call, returning 0.0 if the model is unknown.
    pub fn compute_cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.resolve(model)
            .map(|p| p.cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }

    /// Context window for a model.
    ///
    /// Unknown models fall back by family: names containing `gpt-4` get
    /// 128k, `claude` gets 200k. Anything else returns 0, meaning the caller
    /// should apply its own default.
    pub fn context_limit(&self, model: &str) -> u64 {
        if let Some(limit) = self.resolve(model).map(|p| p.context_limit).filter(|l| *l > 0) {
            return limit;
        }
        let lower = model.to_lowercase();
        if lower.contains("gpt-4") {
            128_000
        } else if lower.contains("claude") {
            200_000
        } else {
            0
        }
    }

    /// List all known model names.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.prices.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of models in the pricing table.
    pub fn len(&self) -> usize {
        self.prices.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for PricingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricingTable")
            .field("models", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_models() {
        let table = PricingTable::with_defaults();
        assert!(table.len() >= 15);
        assert!(!table.is_empty());
    }

    #[test]
    fn known_model_cost() {
        let table = PricingTable::with_defaults();

        // Claude Sonnet 4: $3/M input, $15/M output
        let cost = table.compute_cost("anthropic/claude-sonnet-4", 1000, 500);
        // (1000 * 3.0 + 500 * 15.0) / 1M = 0.0105
        assert!((cost - 0.0105).abs() < 1e-10);
    }

    #[test]
    fn unknown_model_returns_zero() {
        let table = PricingTable::with_defaults();
        let cost = table.compute_cost("unknown/model-xyz", 1000, 500);
        assert!((cost - 0.0).abs() < 1e-10);
    }

    #[test]
    fn bare_and_versioned_names_resolve() {
        let table = PricingTable::with_defaults();
        assert_eq!(
            table.resolve("gpt-4o").map(|p| p.input_per_m),
            Some(2.5)
        );
        // Longest prefix wins: gpt-4o-mini, not gpt-4o
        assert_eq!(
            table.resolve("gpt-4o-mini-2024-07-18").map(|p| p.input_per_m),
            Some(0.15)
        );
    }

    #[test]
    fn context_limits_from_table() {
        let table = PricingTable::with_defaults();
        assert_eq!(table.context_limit("gpt-4o"), 128_000);
        assert_eq!(table.context_limit("anthropic/claude-sonnet-4"), 200_000);
        assert_eq!(table.context_limit("deepseek-v3"), 64_000);
    }

    #[test]
    fn context_limit_family_fallbacks() {
        let table = PricingTable::empty();
        assert_eq!(table.context_limit("gpt-4-0613"), 128_000);
        assert_eq!(table.context_limit("my-claude-proxy"), 200_000);
        assert_eq!(table.context_limit("tiny-local"), 0);
    }

    #[test]
    fn custom_pricing() {
        let table = PricingTable::empty();
        assert!(table.is_empty());

        table.set("custom/model", ModelPricing::new(1.0, 2.0).with_context(4096));
        assert_eq!(table.len(), 1);

        let cost = table.compute_cost("custom/model", 1_000_000, 1_000_000);
        assert!((cost - 3.0).abs() < 1e-10);
        assert_eq!(table.context_limit("custom/model"), 4096);
    }

    #[test]
    fn list_models_sorted() {
        let table = PricingTable::with_defaults();
        let models = table.models();
        assert!(models.contains(&"openai/gpt-4o".to_string()));
        assert!(models.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn set_overrides_existing() {
        let table = PricingTable::with_defaults();
        let old = table.compute_cost("openai/gpt-4o", 1_000_000, 0);
        assert!((old - 2.5).abs() < 1e-10);

        table.set("openai/gpt-4o", ModelPricing::new(5.0, 20.0));
        let new_cost = table.compute_cost("openai/gpt-4o", 1_000_000, 0);
        assert!((new_cost - 5.0).abs() < 1e-10);
    }
}
