//! # polyroute-types
//!
//! Core type definitions for the polyroute LLM router.
//!
//! This crate is the foundation of the dependency graph -- all other
//! polyroute crates depend on it. It contains:
//!
//! - **[`tier`]** -- the [`Tier`] complexity classification
//! - **[`backend`]** -- [`BackendId`] and the [`Vendor`] catalogue
//! - **[`config`]** -- the [`RouterConfig`] file schema
//! - **[`error`]** -- [`ConfigError`], the only error that crosses the router boundary
//! - **[`secret`]** -- [`SecretString`] for API credentials

pub mod backend;
pub mod config;
pub mod error;
pub mod secret;
pub mod tier;

pub use backend::{BackendId, Vendor};
pub use config::RouterConfig;
pub use error::{ConfigError, Result};
pub use secret::SecretString;
pub use tier::Tier;
