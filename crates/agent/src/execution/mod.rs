//! Tool execution for a conversation turn.

pub mod executor;
pub mod guard;
pub mod notifier;
pub mod redact;

pub use executor::{ExecutionOutcome, ToolExecutor, normalize_result};
pub use guard::{DuplicateCallGuard, ToolCallSignature};
pub use notifier::{NoopNotifier, StderrNotifier, ToolNotifier};
pub use redact::{redact_secrets, sanitize_for_log};
