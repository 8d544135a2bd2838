//! System prompt sections and platform guidance.
//!
//! The expanded system prompt is wrapped in a `<convoke>` block holding
//! `<prompt>`, `<agents>`, `<tools>` and any extra named sections. The
//! wrapper doubles as the marker that a prompt was already expanded.

use std::collections::BTreeMap;

use convoke_core::model::ToolSpec;

pub const WRAPPER_OPEN: &str = "<convoke>";
pub const WRAPPER_CLOSE: &str = "</convoke>";

const SHELL_TOOLS: [&str; 5] = ["bash", "sh", "shell", "powershell", "cmd"];
const FILE_TOOLS: [&str; 8] = [
    "read_lines",
    "edit_range",
    "insert_at",
    "search_replace",
    "fileinfo",
    "view",
    "create",
    "file_read",
];
const WEB_TOOLS: [&str; 6] = [
    "web_search",
    "read_webpage",
    "api",
    "download",
    "fetch",
    "http_request",
];
const COMMANDS: [&str; 8] = ["list", "view", "write", "run", "search", "find", "cwd", "env"];

/// The operating system a session runs on, for command guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            _ => Platform::Other,
        }
    }

    pub fn header(&self) -> &'static str {
        match self {
            Platform::Linux => "PLATFORM: Linux with Unix shell",
            Platform::MacOs => "PLATFORM: macOS with Unix shell",
            Platform::Windows => "PLATFORM: Windows with PowerShell",
            Platform::Other => "PLATFORM: Unknown OS",
        }
    }

    fn command_example(&self, command: &str) -> Option<&'static str> {
        let windows = *self == Platform::Windows;
        let example = match (command, windows) {
            ("list", true) => r#"List files: powershell {"command": "Get-ChildItem -Name"}"#,
            ("list", false) => r#"List files: bash {"command": "ls -la"}"#,
            ("view", true) => r#"View file: powershell {"command": "Get-Content file.txt"}"#,
            ("view", false) => r#"View file: bash {"command": "cat file.txt"}"#,
            ("write", true) => r#"Write file: powershell {"command": "Set-Content file.txt 'text'"}"#,
            ("write", false) => r#"Write file: bash {"command": "printf 'text' > file.txt"}"#,
            ("run", true) => r#"Run program: powershell {"command": "& ./program.exe"}"#,
            ("run", false) => r#"Run program: bash {"command": "./program"}"#,
            ("search", true) => r#"Search text: powershell {"command": "Select-String -Pattern 'x' -Path *.rs"}"#,
            ("search", false) => r#"Search text: bash {"command": "grep -rn 'x' ."}"#,
            ("find", true) => r#"Find files: powershell {"command": "Get-ChildItem -Recurse -Filter *.rs"}"#,
            ("find", false) => r#"Find files: bash {"command": "find . -name '*.rs'"}"#,
            ("cwd", true) => r#"Current directory: powershell {"command": "Get-Location"}"#,
            ("cwd", false) => r#"Current directory: bash {"command": "pwd"}"#,
            ("env", true) => r#"Environment: powershell {"command": "Get-ChildItem Env:"}"#,
            ("env", false) => r#"Environment: bash {"command": "env"}"#,
            _ => return None,
        };
        Some(example)
    }
}

/// Tool-usage guidance for the `<tools>` section: the platform header,
/// registered tools grouped by kind, and shell command examples when a
/// shell tool is available.
pub fn platform_guidance(platform: Platform, tools: &[ToolSpec]) -> String {
    let mut out = String::from(platform.header());
    out.push_str("\n\n");

    let describe = |spec: &ToolSpec| format!("- {}: {}\n", spec.name, spec.description.trim());
    let (mut files, mut web, mut other) = (String::new(), String::new(), String::new());
    for spec in tools {
        let name = spec.name.as_str();
        if FILE_TOOLS.contains(&name) {
            files.push_str(&describe(spec));
        } else if WEB_TOOLS.contains(&name) {
            web.push_str(&describe(spec));
        } else if !SHELL_TOOLS.contains(&name) {
            other.push_str(&describe(spec));
        }
    }

    if !(files.is_empty() && web.is_empty() && other.is_empty()) {
        out.push_str("PREFERRED TOOLS (use these first):\n");
        for (title, body) in [
            ("File operations", &files),
            ("Web and network", &web),
            ("Other tools", &other),
        ] {
            if !body.is_empty() {
                out.push_str(&format!("\n{title}:\n{body}"));
            }
        }
        out.push('\n');
    }

    if tools.iter().any(|t| SHELL_TOOLS.contains(&t.name.as_str())) {
        out.push_str("SYSTEM COMMANDS (fallback for system operations):\n");
        for cmd in COMMANDS {
            if let Some(example) = platform.command_example(cmd) {
                out.push_str("- ");
                out.push_str(example);
                out.push('\n');
            }
        }
    }

    out
}

pub fn is_sectionized(prompt: &str) -> bool {
    prompt.contains(WRAPPER_OPEN)
}

/// Wrap `base` into the sectioned layout.
///
/// `agents` fills `<agents>` (rendered empty when absent), `guidance`
/// leads the `<tools>` section ahead of the sorted tool list, and
/// `extras` become `<key>` blocks in key order. A prompt that already
/// carries the wrapper is returned unchanged.
pub fn sectionize(
    base: &str,
    tools: &[ToolSpec],
    agents: Option<&str>,
    guidance: Option<&str>,
    extras: &BTreeMap<String, String>,
) -> String {
    if is_sectionized(base) {
        return base.to_string();
    }

    let mut body = String::new();
    body.push_str("<prompt>\n");
    body.push_str(base.trim());
    body.push_str("\n</prompt>\n");

    match agents.map(str::trim).filter(|a| !a.is_empty()) {
        Some(a) => body.push_str(&format!("<agents>\n{a}\n</agents>\n")),
        None => body.push_str("<agents>\n</agents>\n"),
    }

    body.push_str("<tools>\n");
    if let Some(g) = guidance.map(str::trim).filter(|g| !g.is_empty()) {
        body.push_str(g);
        body.push_str("\n\n");
    }
    let mut sorted: Vec<&ToolSpec> = tools.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    for spec in sorted {
        let desc = spec.description.trim();
        if desc.is_empty() {
            body.push_str(&format!("- {}\n", spec.name));
        } else {
            body.push_str(&format!("- {}: {desc}\n", spec.name));
        }
    }
    body.push_str("</tools>\n");

    for (key, value) in extras {
        body.push_str(&format!("<{key}>\n{}\n</{key}>\n", value.trim()));
    }

    format!("{WRAPPER_OPEN}\n{body}{WRAPPER_CLOSE}")
}
