//! Router wiring from configuration.
//!
//! Turns a [`RouterConfig`] plus the process environment into a ready
//! [`FailoverRouter`]: discovers backends from credentials, builds one
//! HTTP adapter per backend, sizes the session store and opens the usage
//! database.
//!
//! # Usage
//!
//! ```rust,ignore
//! use polyroute_core::bootstrap;
//! use polyroute_types::RouterConfig;
//!
//! let ctx = bootstrap::bootstrap(&RouterConfig::default()).await?;
//! let answer = ctx.router.generate_response("chat-1", "hi").await;
//! ```

use std::sync::Arc;

use polyroute_llm::{registry, Backend, BackendSpec, OpenAiCompatBackend};
use polyroute_types::config::UsageConfig;
use polyroute_types::{ConfigError, RouterConfig};
use tracing::{info, warn};

use crate::router::FailoverRouter;
use crate::session::SessionStore;
use crate::usage::{NoopUsageRecorder, SqliteUsageRecorder, UsageSink};

/// A wired router and the usage database behind it, if one is open.
pub struct RouterContext {
    pub router: FailoverRouter,
    pub usage_db: Option<Arc<SqliteUsageRecorder>>,
}

/// Build a router from `config` and backend credentials in the environment.
pub async fn bootstrap(config: &RouterConfig) -> Result<RouterContext, ConfigError> {
    bootstrap_with_specs(config, registry::discover_from_env(config)).await
}

/// Build a router from `config` over already-resolved backend specs.
pub async fn bootstrap_with_specs(
    config: &RouterConfig,
    specs: Vec<BackendSpec>,
) -> Result<RouterContext, ConfigError> {
    config.validate()?;
    let backends = build_backends(specs)?;
    let count = backends.len();

    let usage_db = open_usage(&config.usage).await;
    let sink: Arc<dyn UsageSink> = match &usage_db {
        Some(db) => Arc::clone(db) as Arc<dyn UsageSink>,
        None => Arc::new(NoopUsageRecorder),
    };

    let router = FailoverRouter::new(backends)?
        .with_session_store(SessionStore::from_config(&config.sessions))
        .with_usage(sink);

    info!(
        backends = count,
        usage_log = usage_db.is_some(),
        "router initialised"
    );
    Ok(RouterContext { router, usage_db })
}

/// One HTTP adapter per spec, in the same order.
pub fn build_backends(specs: Vec<BackendSpec>) -> Result<Vec<Arc<dyn Backend>>, ConfigError> {
    specs
        .into_iter()
        .map(|spec| {
            let backend = spec.id.to_string();
            OpenAiCompatBackend::new(spec)
                .map(|b| Arc::new(b) as Arc<dyn Backend>)
                .map_err(|e| ConfigError::Backend {
                    backend,
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Open the usage database if enabled. A database that cannot be opened
/// downgrades to no usage log rather than failing startup.
pub async fn open_usage(config: &UsageConfig) -> Option<Arc<SqliteUsageRecorder>> {
    if !config.enabled {
        return None;
    }
    match SqliteUsageRecorder::open(&config.database_path).await {
        Ok(db) => Some(Arc::new(db)),
        Err(e) => {
            warn!(
                path = %config.database_path.display(),
                error = %e,
                "usage database unavailable, continuing without usage log"
            );
            None
        }
    }
}
