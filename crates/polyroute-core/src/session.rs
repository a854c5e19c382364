//! Per-session routing context.
//!
//! The router remembers, for every session id, which backend last answered,
//! under which tier label, how many times the answering backend has changed,
//! and whether the last call ran out of backends. Nothing else about the
//! conversation is kept.
//!
//! # Eviction
//!
//! The store is bounded two ways:
//! - **Capacity**: past `max_entries`, the least recently updated session is
//!   evicted (LRU via a monotonic access counter).
//! - **Idle TTL**: sessions untouched for `idle_ttl` are swept. The sweep
//!   runs every [`SWEEP_INTERVAL`] updates and on demand via
//!   [`SessionStore::evict_expired`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use polyroute_types::config::SessionStoreConfig;
use polyroute_types::{BackendId, Tier};
use serde::Serialize;
use tracing::debug;

/// Updates between automatic idle sweeps.
pub const SWEEP_INTERVAL: u64 = 256;

/// Outcome of the most recent routed call for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    /// The last call was answered.
    Active,
    /// The last call exhausted every backend.
    #[serde(rename = "all_exhausted")]
    Exhausted {
        /// Tier the query was classified into.
        failed_tier: Tier,
    },
}

impl SessionStatus {
    /// Label stored in the `sessions.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Exhausted { .. } => "all_exhausted",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the router knows about one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionContext {
    /// Backend that produced the last successful answer.
    pub last_backend: Option<BackendId>,
    /// Tier label of that answer (`"medium"` or `"medium->complex"`).
    pub last_tier: Option<String>,
    /// Times the answering backend changed, counting the first answer.
    pub switch_count: u64,
    /// Wall-clock time of the last update.
    pub last_used: DateTime<Utc>,
    /// Outcome of the last call.
    #[serde(flatten)]
    pub status: SessionStatus,
}

impl SessionContext {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            last_backend: None,
            last_tier: None,
            switch_count: 0,
            last_used: now,
            status: SessionStatus::Active,
        }
    }
}

struct Entry {
    ctx: SessionContext,
    touched: Instant,
    order: u64,
}

/// Bounded concurrent map of session id -> [`SessionContext`].
pub struct SessionStore {
    entries: DashMap<String, Entry>,
    max_entries: usize,
    idle_ttl: Option<Duration>,
    access_counter: AtomicU64,
}

impl SessionStore {
    /// Create a store holding at most `max_entries` sessions (minimum 1).
    /// An `idle_ttl` of `None` disables the idle sweep.
    pub fn new(max_entries: usize, idle_ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            idle_ttl,
            access_counter: AtomicU64::new(0),
        }
    }

    /// Create a store from the `sessions` config section.
    pub fn from_config(config: &SessionStoreConfig) -> Self {
        let ttl = (config.idle_ttl_secs > 0).then(|| Duration::from_secs(config.idle_ttl_secs));
        Self::new(config.max_entries, ttl)
    }

    /// Snapshot of a session's context.
    pub fn get(&self, session_id: &str) -> Option<SessionContext> {
        self.entries.get(session_id).map(|e| e.ctx.clone())
    }

    /// Record a successful answer from `backend` under `tier_label`.
    ///
    /// The switch counter moves only when `backend` differs from the
    /// previously recorded one. Returns the updated context.
    pub fn record_success(
        &self,
        session_id: &str,
        backend: &BackendId,
        tier_label: &str,
    ) -> SessionContext {
        self.update(session_id, |ctx| {
            if ctx.last_backend.as_ref() != Some(backend) {
                ctx.switch_count += 1;
                ctx.last_backend = Some(backend.clone());
            }
            ctx.last_tier = Some(tier_label.to_string());
            ctx.status = SessionStatus::Active;
        })
    }

    /// Mark a session as having exhausted every backend for `failed_tier`.
    /// The last backend, tier label and switch counter are kept.
    pub fn record_exhausted(&self, session_id: &str, failed_tier: Tier) -> SessionContext {
        self.update(session_id, |ctx| {
            ctx.status = SessionStatus::Exhausted { failed_tier };
        })
    }

    /// Remove sessions idle since before `now - idle_ttl`. Returns how many
    /// were removed.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let Some(ttl) = self.idle_ttl else {
            return 0;
        };
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.touched) < ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "swept idle sessions");
        }
        removed
    }

    /// Number of tracked sessions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no sessions are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn update<F>(&self, session_id: &str, apply: F) -> SessionContext
    where
        F: FnOnce(&mut SessionContext),
    {
        let order = self.access_counter.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();

        // The entry guard must drop before eviction walks the map.
        let snapshot = {
            let mut entry = self
                .entries
                .entry(session_id.to_string())
                .or_insert_with(|| Entry {
                    ctx: SessionContext::fresh(Utc::now()),
                    touched: now,
                    order,
                });
            entry.order = order;
            entry.touched = now;
            entry.ctx.last_used = Utc::now();
            apply(&mut entry.ctx);
            entry.ctx.clone()
        };

        self.enforce_capacity(session_id);
        if order > 0 && order % SWEEP_INTERVAL == 0 {
            self.evict_expired(now);
        }
        snapshot
    }

    fn enforce_capacity(&self, keep: &str) {
        while self.entries.len() > self.max_entries {
            let oldest = self
                .entries
                .iter()
                .filter(|e| e.key() != keep)
                .min_by_key(|e| e.order)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    debug!(session = %key, "evicted least recently used session");
                }
                None => break,
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::from_config(&SessionStoreConfig::default())
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("len", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .field("idle_ttl", &self.idle_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> BackendId {
        BackendId::from(s)
    }

    #[test]
    fn first_success_counts_as_switch() {
        let store = SessionStore::default();
        assert!(store.get("chat-1").is_none());

        let ctx = store.record_success("chat-1", &id("groq"), "complex");
        assert_eq!(ctx.last_backend, Some(id("groq")));
        assert_eq!(ctx.last_tier.as_deref(), Some("complex"));
        assert_eq!(ctx.switch_count, 1);
        assert_eq!(ctx.status, SessionStatus::Active);
    }

    #[test]
    fn status_serializes_with_stored_label() {
        let store = SessionStore::default();
        store.record_success("s", &id("groq"), "simple");
        let ctx = store.record_exhausted("s", Tier::Medium);

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["status"], "all_exhausted");
        assert_eq!(json["status"], ctx.status.as_str());
        assert_eq!(json["failed_tier"], "medium");

        let active = serde_json::to_value(SessionStatus::Active).unwrap();
        assert_eq!(active["status"], "active");
    }

    #[test]
    fn repeat_backend_keeps_counter() {
        let store = SessionStore::default();
        store.record_success("s", &id("gemini"), "medium");
        store.record_success("s", &id("gemini"), "medium");
        let ctx = store.record_success("s", &id("gemini"), "simple->medium");
        assert_eq!(ctx.switch_count, 1);
        assert_eq!(ctx.last_tier.as_deref(), Some("simple->medium"));
    }

    #[test]
    fn changing_backend_increments_once_per_change() {
        let store = SessionStore::default();
        store.record_success("s", &id("gemini"), "medium");
        store.record_success("s", &id("groq"), "medium");
        store.record_success("s", &id("groq"), "medium");
        let ctx = store.record_success("s", &id("gemini"), "medium");
        assert_eq!(ctx.switch_count, 3);
    }

    #[test]
    fn exhaustion_keeps_previous_fields() {
        let store = SessionStore::default();
        store.record_success("s", &id("deepseek"), "complex");
        let ctx = store.record_exhausted("s", Tier::Simple);
        assert_eq!(ctx.last_backend, Some(id("deepseek")));
        assert_eq!(ctx.switch_count, 1);
        assert_eq!(
            ctx.status,
            SessionStatus::Exhausted {
                failed_tier: Tier::Simple
            }
        );
        assert_eq!(ctx.status.as_str(), "all_exhausted");

        let ctx = store.record_success("s", &id("deepseek"), "simple");
        assert_eq!(ctx.status, SessionStatus::Active);
        assert_eq!(ctx.switch_count, 1);
    }

    #[test]
    fn exhaustion_on_fresh_session() {
        let store = SessionStore::default();
        let ctx = store.record_exhausted("new", Tier::Medium);
        assert!(ctx.last_backend.is_none());
        assert_eq!(ctx.switch_count, 0);
    }

    #[test]
    fn sessions_are_independent() {
        let store = SessionStore::default();
        store.record_success("a", &id("groq"), "complex");
        store.record_success("b", &id("gemini"), "medium");
        assert_eq!(store.get("a").unwrap().last_backend, Some(id("groq")));
        assert_eq!(store.get("b").unwrap().last_backend, Some(id("gemini")));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn capacity_evicts_least_recently_updated() {
        let store = SessionStore::new(2, None);
        store.record_success("a", &id("groq"), "simple");
        store.record_success("b", &id("groq"), "simple");
        store.record_success("a", &id("groq"), "simple");
        store.record_success("c", &id("groq"), "simple");

        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let store = SessionStore::new(0, None);
        store.record_success("a", &id("groq"), "simple");
        store.record_success("b", &id("groq"), "simple");
        assert_eq!(store.len(), 1);
        assert!(store.get("b").is_some());
    }

    #[test]
    fn idle_sessions_are_swept() {
        let store = SessionStore::new(10, Some(Duration::from_secs(60)));
        store.record_success("old", &id("groq"), "simple");

        assert_eq!(store.evict_expired(Instant::now()), 0);
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(store.evict_expired(later), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn sweep_disabled_without_ttl() {
        let config = SessionStoreConfig {
            max_entries: 10,
            idle_ttl_secs: 0,
        };
        let store = SessionStore::from_config(&config);
        store.record_success("s", &id("groq"), "simple");
        let far = Instant::now() + Duration::from_secs(365 * 24 * 3600);
        assert_eq!(store.evict_expired(far), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn status_serializes_with_tag() {
        let json = serde_json::to_value(SessionStatus::Exhausted {
            failed_tier: Tier::Complex,
        })
        .unwrap();
        assert_eq!(json["status"], "all_exhausted");
        assert_eq!(json["failed_tier"], "complex");
    }
}
