//! Router configuration schema.
//!
//! The config file is JSON. All fields accept `snake_case` and `camelCase`
//! via `#[serde(alias)]`, unknown fields are ignored for forward
//! compatibility, and every section has a default so an empty object
//! (`{}`) is a valid configuration.
//!
//! Credentials are never read from the file: a backend exists only when its
//! vendor API key is present in the environment.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default per-request transport timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Top-level router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Per-backend overrides keyed by backend id (`"groq"`, `"openrouter_0"`, ...).
    #[serde(default)]
    pub backends: HashMap<String, BackendOverride>,

    /// Transport timeout applied to every backend without its own override.
    #[serde(default = "default_timeout_secs", alias = "timeoutSecs")]
    pub timeout_secs: u64,

    /// Session context store bounds.
    #[serde(default)]
    pub sessions: SessionStoreConfig,

    /// Usage log settings.
    #[serde(default)]
    pub usage: UsageConfig,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            backends: HashMap::new(),
            timeout_secs: default_timeout_secs(),
            sessions: SessionStoreConfig::default(),
            usage: UsageConfig::default(),
        }
    }
}

impl RouterConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Reject values that would produce an unusable router.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout {
                backend: "default".to_string(),
            });
        }
        for (id, overrides) in &self.backends {
            if overrides.rpm == Some(0) {
                return Err(ConfigError::InvalidRpm {
                    backend: id.clone(),
                });
            }
            if overrides.timeout_secs == Some(0) {
                return Err(ConfigError::InvalidTimeout {
                    backend: id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Overrides for one backend, if any were configured.
    pub fn backend(&self, id: &str) -> Option<&BackendOverride> {
        self.backends.get(id)
    }

    /// Effective RPM ceiling for a backend: override, else the vendor default.
    pub fn rpm_for(&self, id: &str, default: NonZeroU32) -> NonZeroU32 {
        self.backend(id)
            .and_then(|b| b.rpm)
            .and_then(NonZeroU32::new)
            .unwrap_or(default)
    }

    /// Effective transport timeout for a backend, in seconds.
    pub fn timeout_for(&self, id: &str) -> u64 {
        self.backend(id)
            .and_then(|b| b.timeout_secs)
            .unwrap_or(self.timeout_secs)
    }
}

/// Optional per-backend settings layered over the vendor defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BackendOverride {
    /// Target model name.
    #[serde(default)]
    pub model: Option<String>,

    /// Requests-per-minute ceiling. Must be positive.
    #[serde(default)]
    pub rpm: Option<u32>,

    /// OpenAI-compatible base URL.
    #[serde(default, alias = "baseUrl")]
    pub base_url: Option<String>,

    /// Transport timeout in seconds.
    #[serde(default, alias = "timeoutSecs")]
    pub timeout_secs: Option<u64>,
}

/// Bounds for the in-memory session context store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionStoreConfig {
    /// Maximum tracked sessions before the least recently used is evicted.
    #[serde(default = "default_max_sessions", alias = "maxEntries")]
    pub max_entries: usize,

    /// Sessions idle for longer than this are swept. 0 disables the sweep.
    #[serde(default = "default_idle_ttl_secs", alias = "idleTtlSecs")]
    pub idle_ttl_secs: u64,
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_idle_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_sessions(),
            idle_ttl_secs: default_idle_ttl_secs(),
        }
    }
}

/// Durable usage log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageConfig {
    /// Whether attempts are written to the usage database.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SQLite database file.
    #[serde(default = "default_database_path", alias = "databasePath")]
    pub database_path: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("api_stats.db")
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: default_database_path(),
        }
    }
}
