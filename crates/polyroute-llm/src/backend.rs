//! The [`Backend`] capability trait.

use std::num::NonZeroU32;

use async_trait::async_trait;
use polyroute_types::BackendId;

use crate::error::Result;

/// One configured vendor+model pair that can turn a prompt into text.
///
/// Implementations must be safe to call concurrently from many sessions
/// and must not retry internally: all retry and failover policy lives in
/// the router.
///
/// # Example
///
/// ```rust,ignore
/// use polyroute_llm::Backend;
///
/// async fn ask(backend: &dyn Backend) -> polyroute_llm::Result<String> {
///     backend.send("What is the capital of France?").await
/// }
/// ```
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable identifier, unique within the process.
    fn id(&self) -> &BackendId;

    /// Target model name.
    fn model(&self) -> &str;

    /// Requests-per-minute ceiling used by the router's rate limiter.
    fn rpm(&self) -> NonZeroU32;

    /// Send a single user message and return the generated text.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`](crate::error::BackendError) on transport
    /// failure, timeout, authentication failure, vendor rate limiting,
    /// a malformed body, or an empty response.
    async fn send(&self, text: &str) -> Result<String>;
}
