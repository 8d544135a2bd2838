pub mod budget;
pub mod config_cmd;
pub mod pricing;
pub mod replay;

use std::path::Path;

use convoke_config::{AppConfig, ConfigError};

/// Load from `path` when given, else from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
}
