//! # polyroute-core
//!
//! Routing engine for polyroute.
//!
//! Takes a free-text query and a session id, classifies the query into a
//! [`Tier`](polyroute_types::Tier), walks that tier's backend priority list
//! (then the other tiers) under per-backend rate limits, and records every
//! attempt in a usage log.
//!
//! - [`classifier`]: text -> tier heuristic
//! - [`rate_limiter`]: per-backend sliding-window admission
//! - [`tier_table`]: tier -> ordered backend ids, built once at startup
//! - [`session`]: bounded per-session context store
//! - [`usage`]: attempt log and session summaries (SQLite or no-op)
//! - [`router`]: the failover state machine
//! - [`bootstrap`]: wires all of the above from config and environment

pub mod bootstrap;
pub mod classifier;
pub mod rate_limiter;
pub mod router;
pub mod session;
pub mod tier_table;
pub mod usage;

pub use router::{EXHAUSTED_MESSAGE, FailoverRouter, Generation};
