//! Payload checks at the tool and output boundaries.

use convoke_core::error::ValidationError;

pub const DEFAULT_MAX_SIZE: usize = 10 * 1024 * 1024;
pub const DISALLOWED_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

const ECHO_BLOCK: usize = 5;

/// Size, shape and repetition checks for tool arguments, tool responses
/// and the agent's final output.
#[derive(Debug, Clone)]
pub struct OutputValidator {
    pub max_size: usize,
    pub disallowed_keys: Vec<String>,
}

impl Default for OutputValidator {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            disallowed_keys: DISALLOWED_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl OutputValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Rejects denylisted top-level keys (case-insensitive) and payloads
    /// whose serialized form exceeds the size limit.
    pub fn validate_tool_args(
        &self,
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), ValidationError> {
        if let Some(key) = args.keys().find(|k| {
            self.disallowed_keys
                .iter()
                .any(|d| d.eq_ignore_ascii_case(k))
        }) {
            return Err(ValidationError::DisallowedKey(key.clone()));
        }

        let size = serde_json::to_vec(args)
            .map_err(|e| ValidationError::NotSerializable(e.to_string()))?
            .len();
        self.check_size("tool args", size)
    }

    /// Plain text passes. Text that parses as JSON must have an object or
    /// array at the root.
    pub fn validate_tool_response(&self, response: &str) -> Result<(), ValidationError> {
        self.check_size("tool response", response.len())?;

        let Ok(parsed) = serde_json::from_str::<serde_json::Value>(response) else {
            return Ok(());
        };
        match parsed {
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => Ok(()),
            other => Err(ValidationError::DisallowedRootType(json_type(&other))),
        }
    }

    /// Size check plus the echo heuristic: at least ten lines whose last
    /// five repeat the five before them.
    pub fn validate_agent_output(&self, output: &str) -> Result<(), ValidationError> {
        self.check_size("agent output", output.len())?;
        if has_echo_pattern(output) {
            return Err(ValidationError::EchoPattern);
        }
        Ok(())
    }

    fn check_size(&self, what: &'static str, size: usize) -> Result<(), ValidationError> {
        if size > self.max_size {
            return Err(ValidationError::TooLarge {
                what,
                size,
                limit: self.max_size,
            });
        }
        Ok(())
    }
}

fn has_echo_pattern(output: &str) -> bool {
    let lines: Vec<&str> = output.split('\n').collect();
    if lines.len() < ECHO_BLOCK * 2 {
        return false;
    }
    let n = lines.len();
    lines[n - ECHO_BLOCK..] == lines[n - ECHO_BLOCK * 2..n - ECHO_BLOCK]
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
