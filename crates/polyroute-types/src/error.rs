//! Configuration error type.
//!
//! [`ConfigError`] is fatal and raised at startup only. Every other failure
//! inside the router (backend errors, rate-limit denials, persistence
//! failures) is absorbed and never reaches the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration or constructing the router.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// No backend has a credential, so there is nothing to route to.
    #[error("no backends configured: set at least one provider API key")]
    NoBackends,

    /// Two backends were registered under the same identifier.
    #[error("duplicate backend id: {0}")]
    DuplicateBackend(String),

    /// A requests-per-minute ceiling of zero was configured.
    #[error("invalid rpm for backend {backend}: must be a positive integer")]
    InvalidRpm {
        /// Backend the override belongs to.
        backend: String,
    },

    /// A transport timeout of zero was configured.
    #[error("invalid timeout for backend {backend}: must be at least 1 second")]
    InvalidTimeout {
        /// Backend the override belongs to, or `default` for the top-level
        /// `timeout_secs`.
        backend: String,
    },

    /// A backend could not be constructed (e.g. the HTTP client failed to build).
    #[error("backend {backend}: {reason}")]
    Backend {
        /// Backend identifier.
        backend: String,
        /// What went wrong.
        reason: String,
    },

    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A convenience type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
