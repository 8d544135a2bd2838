//! Cost tracking, model pricing, and trace sinks for Convoke.
//!
//! Every completion a session receives is priced through the
//! [`PricingTable`] and accumulated in the agent's [`CostTracker`]; the same
//! table tells the context budget manager how large a model's window is.

pub mod cost;
pub mod pricing;
pub mod trace;

pub use cost::{CostSnapshot, CostTracker, ModelUsage};
pub use pricing::{ModelPricing, PricingTable};
pub use trace::{CollectingTracer, JsonlTracer};
