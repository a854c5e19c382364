//! Tiered failover router.
//!
//! A call moves through these states:
//!
//! ```text
//! Classifying -> DispatchingTier(t) -> DispatchingFallback(t') -> Succeeded
//!                                                               \-> Exhausted
//! ```
//!
//! The query is classified, then the classified tier's priority list is
//! walked. Each candidate must pass its rate limiter before it is sent the
//! query; the first backend to return text wins. If the list runs out, the
//! other two tiers are walked in fixed order with attempts labelled
//! `"{origin}->{fallback}"`. A per-call tried set keeps any backend from
//! being sent the same query twice. When everything is spent the caller
//! gets [`EXHAUSTED_MESSAGE`] and no backend id.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use polyroute_llm::Backend;
use polyroute_types::{BackendId, ConfigError, Tier};
use tracing::{debug, info, warn};

use crate::classifier;
use crate::rate_limiter::RateLimiter;
use crate::session::{SessionContext, SessionStore};
use crate::tier_table::TierTable;
use crate::usage::{NoopUsageRecorder, SessionSummary, UsageRecord, UsageSink};

/// Text returned when every backend failed or was rate limited.
pub const EXHAUSTED_MESSAGE: &str =
    "🤖 All AI services are temporarily busy. Please try again in 30 seconds!";

/// Result of one routed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Generated text, or [`EXHAUSTED_MESSAGE`].
    pub text: String,
    /// Backend that produced `text`; `None` on exhaustion.
    pub backend: Option<BackendId>,
}

impl Generation {
    fn exhausted() -> Self {
        Self {
            text: EXHAUSTED_MESSAGE.to_string(),
            backend: None,
        }
    }

    /// Returns `true` if no backend produced an answer.
    pub fn is_exhausted(&self) -> bool {
        self.backend.is_none()
    }
}

/// Routes queries across a fixed set of backends.
pub struct FailoverRouter {
    backends: HashMap<BackendId, Arc<dyn Backend>>,
    /// Backend ids in configuration order.
    order: Vec<BackendId>,
    tiers: TierTable,
    limiter: RateLimiter,
    sessions: SessionStore,
    usage: Arc<dyn UsageSink>,
}

impl FailoverRouter {
    /// Build a router over `backends`, given in configuration order.
    ///
    /// Fails if the set is empty or two backends share an id.
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Result<Self, ConfigError> {
        if backends.is_empty() {
            return Err(ConfigError::NoBackends);
        }

        let mut order = Vec::with_capacity(backends.len());
        let mut map: HashMap<BackendId, Arc<dyn Backend>> = HashMap::with_capacity(backends.len());
        for backend in backends {
            let id = backend.id().clone();
            if map.contains_key(&id) {
                return Err(ConfigError::DuplicateBackend(id.to_string()));
            }
            order.push(id.clone());
            map.insert(id, backend);
        }

        let tiers = TierTable::build(&order);
        let limiter = RateLimiter::new(order.iter().map(|id| (id.clone(), map[id].rpm())));

        debug!(
            backends = ?order.iter().map(BackendId::as_str).collect::<Vec<_>>(),
            "failover router ready"
        );

        Ok(Self {
            backends: map,
            order,
            tiers,
            limiter,
            sessions: SessionStore::default(),
            usage: Arc::new(NoopUsageRecorder),
        })
    }

    /// Set the usage sink (builder pattern).
    pub fn with_usage(mut self, usage: Arc<dyn UsageSink>) -> Self {
        self.usage = usage;
        self
    }

    /// Replace the session store (builder pattern).
    pub fn with_session_store(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    /// Use a rate-limit window other than 60 seconds (builder pattern).
    /// Clears any recorded attempts.
    pub fn with_rate_window(mut self, window: Duration) -> Self {
        self.limiter = RateLimiter::new(
            self.order
                .iter()
                .map(|id| (id.clone(), self.backends[id].rpm())),
        )
        .with_window(window);
        self
    }

    /// Configured backend ids, in configuration order.
    pub fn backend_ids(&self) -> &[BackendId] {
        &self.order
    }

    /// The tier priority table.
    pub fn tier_table(&self) -> &TierTable {
        &self.tiers
    }

    /// The per-backend rate limiter.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Snapshot of one session's routing context.
    pub fn session(&self, session_id: &str) -> Option<SessionContext> {
        self.sessions.get(session_id)
    }

    /// The session store.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer `query` for `session_id` using the first backend that can.
    ///
    /// Never fails: backend errors and rate limits are absorbed by
    /// failover, and total exhaustion is reported through
    /// [`Generation::is_exhausted`].
    pub async fn generate_response(&self, session_id: &str, query: &str) -> Generation {
        let classification = classifier::analyze(query);
        let tier = classification.tier;
        debug!(
            session = %session_id,
            tier = %tier,
            words = classification.word_count,
            keyword = ?classification.matched,
            "classified query"
        );

        let mut tried: HashSet<&BackendId> = HashSet::with_capacity(self.order.len());

        if let Some(found) = self
            .dispatch_tier(session_id, query, tier, tier.as_str(), &mut tried)
            .await
        {
            return found;
        }

        for fallback in tier.fallbacks() {
            let label = tier.fallback_label(fallback);
            debug!(session = %session_id, tier = %label, "falling back to another tier");
            if let Some(found) = self
                .dispatch_tier(session_id, query, fallback, &label, &mut tried)
                .await
            {
                return found;
            }
        }

        warn!(
            session = %session_id,
            tier = %tier,
            attempted = tried.len(),
            "all backends exhausted"
        );
        let ctx = self.sessions.record_exhausted(session_id, tier);
        self.usage
            .record_session(&SessionSummary::from_context(session_id, &ctx))
            .await;
        Generation::exhausted()
    }

    /// Walk `list_tier`'s priorities, recording attempts under `label`.
    async fn dispatch_tier<'a>(
        &'a self,
        session_id: &str,
        query: &str,
        list_tier: Tier,
        label: &str,
        tried: &mut HashSet<&'a BackendId>,
    ) -> Option<Generation> {
        for id in self.tiers.priorities(list_tier) {
            if tried.contains(id) {
                continue;
            }
            let Some(backend) = self.backends.get(id) else {
                continue;
            };
            if !self.limiter.try_acquire(id, Instant::now()) {
                debug!(backend = %id, tier = %label, "rate limit reached, skipping");
                continue;
            }
            tried.insert(id);

            let started = Instant::now();
            match backend.send(query).await {
                Ok(text) => {
                    let elapsed = started.elapsed();
                    let ctx = self.sessions.record_success(session_id, id, label);
                    self.usage
                        .record_attempt(&UsageRecord::success(
                            id,
                            session_id,
                            elapsed.as_secs_f64(),
                            label,
                        ))
                        .await;
                    self.usage
                        .record_session(&SessionSummary::from_context(session_id, &ctx))
                        .await;
                    info!(
                        backend = %id,
                        tier = %label,
                        session = %session_id,
                        elapsed_ms = elapsed.as_millis() as u64,
                        switches = ctx.switch_count,
                        "response generated"
                    );
                    return Some(Generation {
                        text,
                        backend: Some(id.clone()),
                    });
                }
                Err(e) => {
                    warn!(
                        backend = %id,
                        tier = %label,
                        session = %session_id,
                        error = %e,
                        "backend failed, trying next"
                    );
                    self.usage
                        .record_attempt(&UsageRecord::failure(id, session_id, label))
                        .await;
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for FailoverRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverRouter")
            .field("backends", &self.order)
            .field("limiter", &self.limiter)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
