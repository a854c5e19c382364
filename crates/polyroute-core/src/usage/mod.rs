//! Usage recording.
//!
//! Every dispatch attempt the router makes becomes a [`UsageRecord`], and
//! every routed call ends with a [`SessionSummary`] upsert. Recording is
//! best-effort: a [`UsageSink`] never fails the call it observes.
//!
//! - [`SqliteUsageRecorder`]: durable log in a SQLite file
//! - [`MemoryUsageRecorder`]: in-process log, for tests and dry runs
//! - [`NoopUsageRecorder`]: discards everything

mod memory;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polyroute_types::BackendId;
use serde::Serialize;
use thiserror::Error;

use crate::session::{SessionContext, SessionStatus};

pub use memory::MemoryUsageRecorder;
pub use sqlite::SqliteUsageRecorder;

/// One dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    /// Backend the attempt went to.
    pub backend: BackendId,
    /// Whether the backend returned text.
    pub success: bool,
    /// Session the attempt served.
    pub session_id: String,
    /// Wall-clock latency in seconds; 0 for failed attempts.
    pub latency_secs: f64,
    /// Tier label, e.g. `"simple"` or `"simple->medium"`.
    pub tier: String,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    /// A successful attempt finishing now.
    pub fn success(
        backend: &BackendId,
        session_id: &str,
        latency_secs: f64,
        tier: impl Into<String>,
    ) -> Self {
        Self {
            backend: backend.clone(),
            success: true,
            session_id: session_id.to_string(),
            latency_secs,
            tier: tier.into(),
            timestamp: Utc::now(),
        }
    }

    /// A failed attempt finishing now.
    pub fn failure(backend: &BackendId, session_id: &str, tier: impl Into<String>) -> Self {
        Self {
            backend: backend.clone(),
            success: false,
            session_id: session_id.to_string(),
            latency_secs: 0.0,
            tier: tier.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Latest routing state of one session, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub last_backend: Option<BackendId>,
    pub last_tier: Option<String>,
    pub switch_count: u64,
    #[serde(flatten)]
    pub status: SessionStatus,
    pub last_used: DateTime<Utc>,
}

impl SessionSummary {
    /// Summary of `ctx` for `session_id`.
    pub fn from_context(session_id: &str, ctx: &SessionContext) -> Self {
        Self {
            session_id: session_id.to_string(),
            last_backend: ctx.last_backend.clone(),
            last_tier: ctx.last_tier.clone(),
            switch_count: ctx.switch_count,
            status: ctx.status,
            last_used: ctx.last_used,
        }
    }
}

/// Per-backend aggregates over the attempt log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendStats {
    pub backend: String,
    /// Attempts recorded.
    pub calls: u64,
    /// Attempts that returned text.
    pub successes: u64,
    /// Mean latency over all attempts (failures count as 0).
    pub avg_latency_secs: f64,
}

impl BackendStats {
    /// Successes as a percentage of calls.
    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.successes as f64 * 100.0 / self.calls as f64
        }
    }
}

/// Errors from the durable usage store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Opening the database or running a statement failed.
    #[error("usage database error: {source}")]
    Database {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    pub(crate) fn database<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StorageError::Database {
            source: Box::new(err),
        }
    }
}

/// A convenience type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Destination for usage events. Implementations swallow their own errors.
#[async_trait]
pub trait UsageSink: Send + Sync {
    /// Append one attempt.
    async fn record_attempt(&self, record: &UsageRecord);

    /// Insert or replace the summary for one session.
    async fn record_session(&self, summary: &SessionSummary);
}

/// Sink that discards every event. Used when the usage log is disabled.
pub struct NoopUsageRecorder;

#[async_trait]
impl UsageSink for NoopUsageRecorder {
    async fn record_attempt(&self, _record: &UsageRecord) {}

    async fn record_session(&self, _summary: &SessionSummary) {}
}
