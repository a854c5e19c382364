//! In-process usage log.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BackendStats, SessionSummary, UsageRecord, UsageSink};

/// Keeps every event in memory. Never fails.
#[derive(Debug, Default)]
pub struct MemoryUsageRecorder {
    attempts: Mutex<Vec<UsageRecord>>,
    sessions: Mutex<HashMap<String, SessionSummary>>,
}

impl MemoryUsageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All attempts, in recording order.
    pub fn attempts(&self) -> Vec<UsageRecord> {
        self.attempts.lock().clone()
    }

    /// Latest summary for `session_id`.
    pub fn session(&self, session_id: &str) -> Option<SessionSummary> {
        self.sessions.lock().get(session_id).cloned()
    }

    /// Per-backend aggregates, busiest backend first.
    pub fn stats(&self) -> Vec<BackendStats> {
        let attempts = self.attempts.lock();
        let mut by_backend: HashMap<&str, (u64, u64, f64)> = HashMap::new();
        for a in attempts.iter() {
            let entry = by_backend.entry(a.backend.as_str()).or_default();
            entry.0 += 1;
            entry.1 += u64::from(a.success);
            entry.2 += a.latency_secs;
        }
        let mut stats: Vec<BackendStats> = by_backend
            .into_iter()
            .map(|(backend, (calls, successes, total))| BackendStats {
                backend: backend.to_string(),
                calls,
                successes,
                avg_latency_secs: total / calls as f64,
            })
            .collect();
        stats.sort_by(|a, b| b.calls.cmp(&a.calls).then_with(|| a.backend.cmp(&b.backend)));
        stats
    }
}

#[async_trait]
impl UsageSink for MemoryUsageRecorder {
    async fn record_attempt(&self, record: &UsageRecord) {
        self.attempts.lock().push(record.clone());
    }

    async fn record_session(&self, summary: &SessionSummary) {
        self.sessions
            .lock()
            .insert(summary.session_id.clone(), summary.clone());
    }
}
