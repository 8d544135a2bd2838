//! Configuration loading, validation, and management for Convoke.
//!
//! Loads configuration from `~/.convoke/config.toml`. Runtime knobs in
//! [`RuntimeConfig`] are resolved at the point of use: an explicit value
//! from the file wins, then a `CONVOKE_*` environment variable, then a
//! documented default. Nothing is cached process-wide.

use convoke_core::ErrorHandlingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The root configuration structure.
///
/// Maps directly to `~/.convoke/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Agent behavior
    #[serde(default)]
    pub agent: AgentConfig,

    /// Context, history and budget knobs
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Cost tracking and budget configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_model() -> String {
    "gpt-4o".into()
}

/// Agent behavior settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// System prompt; the built-in default is used when absent or blank
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Tool failure policy
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,

    /// Template variables substituted into the prompt and tool arguments
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub vars: HashMap<String, String>,
}

/// Where environment lookups go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EnvSource {
    /// Read the process environment on every lookup
    #[default]
    Process,
    /// A fixed map, for tests and embedding
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    pub fn fixed<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        EnvSource::Fixed(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    fn get(&self, key: &str) -> Option<String> {
        match self {
            EnvSource::Process => std::env::var(key).ok(),
            EnvSource::Fixed(map) => map.get(key).cloned(),
        }
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    }
}

pub const ENV_CONTEXT_MAX_TOKENS: &str = "CONVOKE_CONTEXT_MAX_TOKENS";
pub const ENV_CONTEXT_RESERVE_OUTPUT: &str = "CONVOKE_CONTEXT_RESERVE_OUTPUT";
pub const ENV_HISTORY_COMPACT_AFTER: &str = "CONVOKE_HISTORY_COMPACT_AFTER";
pub const ENV_HISTORY_KEEP: &str = "CONVOKE_HISTORY_KEEP";
pub const ENV_PLAN_HEURISTIC: &str = "CONVOKE_PLAN_HEURISTIC";
pub const ENV_STOP_ON_BUDGET: &str = "CONVOKE_STOP_ON_BUDGET";
pub const ENV_TUI_MODE: &str = "CONVOKE_TUI_MODE";
pub const ENV_MAX_ITERATIONS: &str = "CONVOKE_MAX_ITERATIONS";

pub const DEFAULT_RESERVE_OUTPUT: u64 = 1024;
pub const DEFAULT_HISTORY_KEEP: usize = 8;

/// Runtime knobs for a conversation session.
///
/// Every field is optional. Accessors resolve the effective value on each
/// call so a changed environment is picked up by the next session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Context ceiling override in tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_max_tokens: Option<u64>,

    /// Tokens reserved for the model's output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_reserve_output: Option<u64>,

    /// Compact history once it holds more than this many steps (0 = never)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_compact_after: Option<usize>,

    /// Steps kept verbatim when compacting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_keep: Option<usize>,

    /// Push the model to act when it answers with a plan instead of tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_heuristic: Option<bool>,

    /// Fail the session once the cost tracker is over budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_on_budget: Option<bool>,

    /// Suppress human-readable tool progress lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_tool_progress: Option<bool>,

    /// Hard cap on loop iterations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    #[serde(skip)]
    pub env: EnvSource,
}

impl RuntimeConfig {
    /// A config that reads nothing from the process environment.
    pub fn isolated() -> Self {
        Self {
            env: EnvSource::Fixed(HashMap::new()),
            ..Self::default()
        }
    }

    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    fn number<T: FromStr + Copy>(&self, explicit: Option<T>, key: &str) -> Option<T> {
        if explicit.is_some() {
            return explicit;
        }
        let raw = self.env.get(key)?;
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring unparseable environment value");
                None
            }
        }
    }

    fn flag(&self, explicit: Option<bool>, key: &str) -> bool {
        explicit
            .or_else(|| self.env.get(key).and_then(|v| parse_bool(&v)))
            .unwrap_or(false)
    }

    /// Explicit context ceiling, if any. Zero means unset.
    pub fn context_max_tokens(&self) -> Option<u64> {
        self.number(self.context_max_tokens, ENV_CONTEXT_MAX_TOKENS)
            .filter(|v| *v > 0)
    }

    /// Output reserve. Defaults to 1024; values of zero or below are ignored.
    pub fn context_reserve_output(&self) -> u64 {
        self.number(self.context_reserve_output, ENV_CONTEXT_RESERVE_OUTPUT)
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_RESERVE_OUTPUT)
    }

    pub fn history_compact_after(&self) -> usize {
        self.number(self.history_compact_after, ENV_HISTORY_COMPACT_AFTER)
            .unwrap_or(0)
    }

    /// Steps retained by compaction. At least one.
    pub fn history_keep(&self) -> usize {
        self.number(self.history_keep, ENV_HISTORY_KEEP)
            .unwrap_or(DEFAULT_HISTORY_KEEP)
            .max(1)
    }

    pub fn plan_heuristic(&self) -> bool {
        self.flag(self.plan_heuristic, ENV_PLAN_HEURISTIC)
    }

    pub fn stop_on_budget(&self) -> bool {
        self.flag(self.stop_on_budget, ENV_STOP_ON_BUDGET)
    }

    pub fn quiet_tool_progress(&self) -> bool {
        self.flag(self.quiet_tool_progress, ENV_TUI_MODE)
    }

    /// Iteration cap; `None` means unbounded (the guards still terminate).
    pub fn max_iterations(&self) -> Option<u32> {
        self.number(self.max_iterations, ENV_MAX_ITERATIONS)
            .filter(|v| *v > 0)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Cost tracking and budget configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Token budget across a tracker's lifetime (0 = unlimited)
    #[serde(default)]
    pub budget_tokens: u64,

    /// Dollar budget across a tracker's lifetime (0 = unlimited)
    #[serde(default)]
    pub budget_usd: f64,

    /// Custom model pricing overrides (model name → pricing)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_pricing: HashMap<String, PricingOverrideConfig>,
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
    /// Context window in tokens (0 = unknown)
    #[serde(default)]
    pub context_limit: u64,
}

impl AppConfig {
    /// Load configuration from the default path (~/.convoke/config.toml).
    ///
    /// `CONVOKE_MODEL` overrides the default model.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(model) = std::env::var("CONVOKE_MODEL") {
            if !model.trim().is_empty() {
                config.default_model = model;
            }
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".convoke")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "default_model must not be empty".into(),
            ));
        }

        if self.telemetry.budget_usd < 0.0 {
            return Err(ConfigError::ValidationError(
                "telemetry.budget_usd must be >= 0".into(),
            ));
        }

        if let Some(reserve) = self.runtime.context_reserve_output {
            if let Some(max) = self.runtime.context_max_tokens {
                if max > 0 && reserve >= max {
                    return Err(ConfigError::ValidationError(format!(
                        "runtime.context_reserve_output ({reserve}) must be below runtime.context_max_tokens ({max})"
                    )));
                }
            }
        }

        for (model, price) in &self.telemetry.custom_pricing {
            if price.input_per_m < 0.0 || price.output_per_m < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "custom pricing for '{model}' must not be negative"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            agent: AgentConfig::default(),
            runtime: RuntimeConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
