//! Human-readable tool progress lines.

/// Receives progress for each tool call. Separate from tracing: this is
/// what an interactive user watches scroll by.
pub trait ToolNotifier: Send + Sync {
    fn start(&self, agent_id: &str, tool: &str, summary: &str);
    fn success(&self, agent_id: &str, tool: &str);
    fn failure(&self, agent_id: &str, tool: &str, error: &str);
}

/// Prints progress to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl ToolNotifier for StderrNotifier {
    fn start(&self, agent_id: &str, tool: &str, summary: &str) {
        let id = short_id(agent_id);
        if summary.is_empty() {
            eprintln!("🔧 {id}: {tool}");
        } else {
            eprintln!("🔧 {id}: {tool} {summary}");
        }
    }

    fn success(&self, agent_id: &str, tool: &str) {
        eprintln!("✅ {}: {tool} completed", short_id(agent_id));
    }

    fn failure(&self, agent_id: &str, tool: &str, error: &str) {
        eprintln!("❌ {}: {tool} failed: {error}", short_id(agent_id));
    }
}

/// Used when a UI owns the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ToolNotifier for NoopNotifier {
    fn start(&self, _: &str, _: &str, _: &str) {}
    fn success(&self, _: &str, _: &str) {}
    fn failure(&self, _: &str, _: &str, _: &str) {}
}

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((cut, _)) => &id[..cut],
        None => id,
    }
}

const SUMMARY_KEYS: [&str; 6] = ["path", "command", "query", "url", "expression", "text"];
const SUMMARY_MAX_CHARS: usize = 60;

/// A short description of what a call is about: the first string-valued
/// argument among the usual suspects, cut to 60 characters.
pub fn arg_summary(args: &serde_json::Map<String, serde_json::Value>) -> String {
    let Some(value) = SUMMARY_KEYS
        .iter()
        .find_map(|k| args.get(*k).and_then(|v| v.as_str()))
    else {
        return String::new();
    };
    let value = value.trim();
    match value.char_indices().nth(SUMMARY_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &value[..cut]),
        None => value.to_string(),
    }
}
