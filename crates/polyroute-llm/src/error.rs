//! Backend error types for polyroute-llm.
//!
//! Every failure of a single backend call is a [`BackendError`]. The router
//! treats all variants the same way (log a failed attempt, try the next
//! backend); the variants exist for logs and tests.

use thiserror::Error;

/// Errors that can occur when calling a backend.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BackendError {
    /// The vendor returned a non-success HTTP status.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The vendor rejected the credential (HTTP 401/403).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The vendor is throttling us (HTTP 429).
    #[error("rate limited by vendor{}", retry_after_ms.map(|ms| format!(": retry after {ms}ms")).unwrap_or_default())]
    RateLimited {
        /// Vendor-suggested wait, if it sent one.
        retry_after_ms: Option<u64>,
    },

    /// The transport timeout elapsed.
    #[error("timeout")]
    Timeout,

    /// The response parsed but carried no text.
    #[error("empty response")]
    EmptyResponse,

    /// The response body could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A transport-level error from reqwest.
    #[error("http error: {0}")]
    Http(reqwest::Error),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Http(err)
        }
    }
}

/// A convenience type alias for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
