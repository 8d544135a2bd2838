//! Replay scripts.
//!
//! A script is a JSON array of turns. Each turn is the list of fragments
//! one model invocation streams back:
//!
//! ```json
//! [
//!   [{"done": true, "tool_calls": [{"id": "c1", "name": "calculator",
//!     "arguments": "{\"expression\": \"2+2\"}"}]}],
//!   [{"delta": "It is "}, {"delta": "4."}, {"done": true,
//!     "usage": {"input_tokens": 40, "output_tokens": 4}}]
//! ]
//! ```
//!
//! `{"error": "..."}` in place of a fragment ends that turn's stream with
//! an error.

use std::path::{Path, PathBuf};

use convoke_agent::{ScriptFragment, ScriptedClient};

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Failed to read script at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse script: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Script has no turns")]
    Empty,

    #[error("Turn {0} has no fragments")]
    EmptyTurn(usize),
}

/// Parse and check a script. Turn numbers in errors are 1-based.
pub fn parse_script(json: &str) -> Result<Vec<Vec<ScriptFragment>>, ScriptError> {
    let turns: Vec<Vec<ScriptFragment>> = serde_json::from_str(json)?;
    if turns.is_empty() {
        return Err(ScriptError::Empty);
    }
    if let Some(i) = turns.iter().position(Vec::is_empty) {
        return Err(ScriptError::EmptyTurn(i + 1));
    }
    Ok(turns)
}

pub fn load_script(path: &Path) -> Result<ScriptedClient, ScriptError> {
    let json = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let turns = parse_script(&json)?;
    tracing::debug!(path = %path.display(), turns = turns.len(), "Loaded replay script");
    Ok(ScriptedClient::from_script(turns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_scripts_and_turns() {
        assert!(matches!(parse_script("[]"), Err(ScriptError::Empty)));
        assert!(matches!(
            parse_script(r#"[[{"delta": "a"}], []]"#),
            Err(ScriptError::EmptyTurn(2))
        ));
    }

    #[test]
    fn error_fragments_parse() {
        let turns = parse_script(r#"[[{"delta": "a"}, {"error": "boom"}]]"#).unwrap();
        assert_eq!(
            turns[0][1],
            ScriptFragment::Error {
                error: "boom".into()
            }
        );
    }
}
