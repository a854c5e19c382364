//! Backend adapters for polyroute.
//!
//! This crate turns "send text, get text" into a call against one LLM
//! vendor. The router depends only on the [`Backend`] trait and never
//! branches on vendor identity.
//!
//! # Architecture
//!
//! - [`Backend`] trait: the uniform capability every vendor implements
//! - [`OpenAiCompatBackend`]: the implementation used for every vendor,
//!   speaking the OpenAI chat completions format
//! - [`BackendSpec`]: resolved settings for one backend (id, vendor,
//!   model, endpoint, credential, RPM ceiling, timeout)
//! - [`registry`]: discovers which backends exist from credentials in the
//!   environment plus config-file overrides
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use polyroute_llm::{registry, Backend, OpenAiCompatBackend};
//! use polyroute_types::RouterConfig;
//!
//! let specs = registry::discover_from_env(&RouterConfig::default());
//! let backend = OpenAiCompatBackend::new(specs[0].clone())?;
//! let text = backend.send("What is Rust?").await?;
//! ```

pub mod backend;
pub mod error;
pub mod openai_compat;
pub mod registry;
pub mod types;

pub use backend::Backend;
pub use error::{BackendError, Result};
pub use openai_compat::OpenAiCompatBackend;
pub use registry::BackendSpec;
pub use types::{ChatMessage, ChatRequest, ChatResponse};
