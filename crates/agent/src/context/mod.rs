//! Context construction for a conversation session.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`PromptEnvelope`] | System prompt, last-step replay, new input |
//! | [`ContextBudgetManager`] | Keeps messages plus tool schemas under the window |
//! | [`compaction`] | Folds long histories into a summary line |
//! | [`sections`] | Sectioned system prompt and platform guidance |
//! | [`token`] | Token estimates |

pub mod budget;
pub mod compaction;
pub mod envelope;
pub mod sections;
pub mod token;

pub use budget::{BudgetWindow, ContextBudgetManager};
pub use compaction::CompactionPolicy;
pub use envelope::{DEFAULT_PROMPT, PromptEnvelope, substitute_value, substitute_vars};
pub use sections::Platform;
pub use token::{HeuristicCounter, TokenCounter};
