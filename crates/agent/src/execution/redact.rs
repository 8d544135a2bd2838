//! Secret scrubbing for log output.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Logged text is cut to this many characters.
pub const MAX_LOGGED_CHARS: usize = 400;

// Most specific first; the generic `key=` form keeps its prefix.
static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"AKIA[0-9A-Z]{16}", "[REDACTED]"),
        (r"sk_(?:live|test)_[a-zA-Z0-9]+", "[REDACTED]"),
        (r"sk-[a-zA-Z0-9_\-]{20,}", "[REDACTED]"),
        (r"gh[pos]_[a-zA-Z0-9]{20,}", "[REDACTED]"),
        (r"Bearer [a-zA-Z0-9._\-]+", "Bearer [REDACTED]"),
        (
            r"(?i)((?:api_key|key|token|secret|password)=)[^\s&]{8,}",
            "${1}[REDACTED]",
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
        Ok(re) => Some((re, replacement)),
        Err(e) => {
            tracing::error!(pattern, error = %e, "Secret pattern failed to compile");
            None
        }
    })
    .collect()
});

pub fn redact_secrets(input: &str) -> String {
    let mut out = input.to_string();
    for (re, replacement) in SECRET_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *replacement).into_owned();
        }
    }
    out
}

/// Redact, then cap at [`MAX_LOGGED_CHARS`] characters.
pub fn sanitize_for_log(input: &str) -> String {
    let redacted = redact_secrets(input);
    match redacted.char_indices().nth(MAX_LOGGED_CHARS) {
        Some((cut, _)) => format!("{}…", &redacted[..cut]),
        None => redacted,
    }
}
