//! Error types for the Convoke domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] unifies them.

use thiserror::Error;

/// The top-level error type for all Convoke operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model client errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Payload validation ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Session control ---
    #[error("{0}")]
    Session(#[from] SessionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The session-control condition behind this error, if any.
    pub fn session(&self) -> Option<&SessionError> {
        match self {
            Error::Session(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Session(SessionError::Cancelled))
            || matches!(self, Error::Model(ModelError::Cancelled))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures reported by a model client, either when opening a stream or
/// as an error fragment in the middle of one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Model client not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Model request cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Unknown tool '{name}'. Available tools: {available:?}")]
    UnknownTool { name: String, available: Vec<String> },

    #[error("Invalid tool arguments for '{tool_name}': {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    /// Raised by a tool implementation; the message is the tool's own words.
    #[error("{0}")]
    Failed(String),

    /// A tool failure that aborted the whole batch. `message` is already formatted.
    #[error("{message}")]
    ExecutionFailed { tool_name: String, message: String },

    #[error("Tool '{tool_name}' produced invalid response: {reason}")]
    InvalidResponse { tool_name: String, reason: String },

    #[error("Tool call cancelled: {0}")]
    Cancelled(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Rejections from the payload validator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{what} too large ({size} bytes, limit {limit})")]
    TooLarge {
        what: &'static str,
        size: usize,
        limit: usize,
    },

    #[error("disallowed key in tool args: {0}")]
    DisallowedKey(String),

    #[error("disallowed JSON root type: {0}")]
    DisallowedRootType(&'static str),

    #[error("potential echo pattern detected in agent output")]
    EchoPattern,

    #[error("arguments are not serializable: {0}")]
    NotSerializable(String),
}

/// Terminal conditions of a conversation session. Each is a distinct
/// variant so callers can branch on the reason a session stopped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("iteration cap reached ({0})")]
    IterationCapExceeded(u32),

    #[error("session cancelled")]
    Cancelled,

    #[error("too many consecutive errors ({0}), stopping execution")]
    TooManyConsecutiveErrors(u32),

    #[error("cost or token budget exceeded (tokens={tokens} cost=${cost:.4})")]
    BudgetExceeded { tokens: u64, cost: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_displays_correctly() {
        let err = Error::Model(ModelError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn unknown_tool_lists_available_names() {
        let err = ToolError::UnknownTool {
            name: "nope".into(),
            available: vec!["calculator".into(), "echo".into()],
        };
        let text = err.to_string();
        assert!(text.contains("Unknown tool 'nope'"));
        assert!(text.contains("calculator"));
        assert!(text.contains("echo"));
    }

    #[test]
    fn session_errors_are_identifiable() {
        let err: Error = SessionError::IterationCapExceeded(4).into();
        assert_eq!(err.session(), Some(&SessionError::IterationCapExceeded(4)));
        assert_eq!(err.to_string(), "iteration cap reached (4)");

        let err: Error = SessionError::Cancelled.into();
        assert!(err.is_cancelled());
    }

    #[test]
    fn budget_error_formats_cost() {
        let err = SessionError::BudgetExceeded {
            tokens: 1200,
            cost: 0.5,
        };
        assert_eq!(
            err.to_string(),
            "cost or token budget exceeded (tokens=1200 cost=$0.5000)"
        );
    }
}
