//! The conversation runtime: the core of Convoke.
//!
//! An [`Agent`] answers one input per [`Agent::run`] call by driving a
//! [`ConversationSession`]:
//!
//! 1. **Prepare**: build the message list with [`PromptEnvelope`] and fit
//!    it under the model's window with [`ContextBudgetManager`]
//! 2. **Invoke**: stream a completion and fold it with [`ChunkAggregator`]
//! 3. **Act**: run requested tools through [`ToolExecutor`], guarded
//!    against repeated calls by [`DuplicateCallGuard`]
//! 4. **Loop** until the model answers in text, a terminal tool answers,
//!    or a session limit (iterations, errors, budget, cancellation) is hit
//!
//! Every turn is recorded as a `Step` in the agent's memory store.

pub mod agent;
pub mod context;
pub mod execution;
pub mod plan;
pub mod scripted;
pub mod session;
pub mod stream;
pub mod validator;

#[cfg(test)]
mod test_helpers;

pub use agent::{Agent, AgentBuilder, pricing_table};
pub use context::{
    BudgetWindow, CompactionPolicy, ContextBudgetManager, DEFAULT_PROMPT, HeuristicCounter,
    Platform, PromptEnvelope, TokenCounter,
};
pub use execution::{
    DuplicateCallGuard, ExecutionOutcome, NoopNotifier, StderrNotifier, ToolExecutor,
    ToolNotifier, redact_secrets, sanitize_for_log,
};
pub use plan::{KeywordPlanPolicy, NeverFollowUp, PLAN_FOLLOW_UP, PlanFollowUpPolicy};
pub use scripted::{ScriptFragment, ScriptedClient};
pub use session::{ConversationSession, SessionState};
pub use stream::ChunkAggregator;
pub use validator::OutputValidator;
