//! Command handlers -- one module per subcommand

pub mod config;
pub mod latest;
pub mod scan;

use std::path::{Path, PathBuf};

use rumble_core::config::RumbleConfig;

use crate::cli::DEFAULT_CONFIG_PATH;
use crate::error::CliError;

/// Label used as the config source when no file was read.
pub const DEFAULTS_SOURCE: &str = "(defaults)";

/// Effective configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: RumbleConfig,
    pub source: String,
}

/// Environment-backed lookup passed to `RumbleConfig::apply_overrides`.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Resolve which config file to read.
///
/// An explicit `--config` always wins. Otherwise `./rumble.toml` is used
/// when it exists, and `None` means built-in defaults.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.is_file().then_some(default)
        }
    }
}

/// Load the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Core` when the file cannot be read, parsed or validated.
pub async fn load_config<F>(explicit: Option<&Path>, lookup: F) -> Result<LoadedConfig, CliError>
where
    F: Fn(&str) -> Option<String>,
{
    match resolve_config_path(explicit) {
        Some(path) => {
            let config = RumbleConfig::load(&path, lookup).await?;
            Ok(LoadedConfig {
                config,
                source: path.display().to_string(),
            })
        }
        None => {
            let mut config = RumbleConfig::default();
            config.apply_overrides(lookup);
            config.validate()?;
            Ok(LoadedConfig {
                config,
                source: DEFAULTS_SOURCE.to_owned(),
            })
        }
    }
}
