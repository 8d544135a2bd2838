//! Agent policy types.

use serde::{Deserialize, Serialize};

/// How tool failures are treated during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    /// Surface tool errors to the model as ordinary tool results instead of
    /// aborting the turn
    #[serde(default = "default_treat_errors_as_results")]
    pub treat_errors_as_results: bool,

    /// Consecutive turns with soft failures tolerated before giving up
    #[serde(default = "default_max_error_retries")]
    pub max_error_retries: u32,

    /// Append tool name, arguments and a suggestion to error messages
    #[serde(default = "default_include_error_context")]
    pub include_error_context: bool,
}

fn default_treat_errors_as_results() -> bool {
    true
}
fn default_max_error_retries() -> u32 {
    3
}
fn default_include_error_context() -> bool {
    true
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            treat_errors_as_results: default_treat_errors_as_results(),
            max_error_retries: default_max_error_retries(),
            include_error_context: default_include_error_context(),
        }
    }
}

impl ErrorHandlingConfig {
    /// Abort on the first tool failure.
    pub fn strict() -> Self {
        Self {
            treat_errors_as_results: false,
            ..Self::default()
        }
    }
}
