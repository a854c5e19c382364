//! Subcommand implementations and shared helpers.

pub mod ask;
pub mod classify;
pub mod stats;
pub mod tiers;

use std::path::{Path, PathBuf};

use polyroute_types::RouterConfig;
use tracing::debug;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "POLYROUTE_CONFIG";

/// Config file looked for in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "polyroute.json";

/// Resolve which config file to read, if any.
///
/// Precedence:
/// 1. `--config` flag
/// 2. `$POLYROUTE_CONFIG`
/// 3. `./polyroute.json`, if it exists
pub fn discover_config_path(config_override: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = config_override {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

/// Load the router configuration.
///
/// An explicitly named file must exist. Without one, defaults are used.
pub fn load_config(config_override: Option<&Path>) -> anyhow::Result<RouterConfig> {
    match discover_config_path(config_override) {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            debug!(path = %path.display(), "loading config");
            Ok(RouterConfig::load(&path)?)
        }
        None => {
            debug!("no config file found, using defaults");
            Ok(RouterConfig::default())
        }
    }
}
