//! OpenAI-compatible backend implementation.
//!
//! [`OpenAiCompatBackend`] serves every vendor the router knows about. Groq,
//! OpenRouter, Gemini (through its OpenAI endpoint) and DeepSeek all accept
//! the same chat completions request; only the base URL, credential, model
//! and a few extra headers differ, and those live in [`BackendSpec`].

use std::num::NonZeroU32;

use async_trait::async_trait;
use polyroute_types::BackendId;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::{BackendError, Result};
use crate::registry::BackendSpec;
use crate::types::{ChatRequest, ChatResponse};

/// A backend speaking the OpenAI chat completions API.
pub struct OpenAiCompatBackend {
    spec: BackendSpec,
    http: reqwest::Client,
}

impl OpenAiCompatBackend {
    /// Create a backend from resolved settings.
    ///
    /// The spec's timeout becomes the HTTP client's whole-request timeout.
    pub fn new(spec: BackendSpec) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(spec.timeout).build()?;
        Ok(Self { spec, http })
    }

    /// Returns the resolved settings.
    pub fn spec(&self) -> &BackendSpec {
        &self.spec
    }

    fn completions_url(&self) -> String {
        let base = self.spec.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    fn build_request(&self, text: &str) -> ChatRequest {
        ChatRequest::single(&self.spec.model, text).with_max_tokens(self.spec.max_tokens)
    }
}

#[async_trait]
impl Backend for OpenAiCompatBackend {
    fn id(&self) -> &BackendId {
        &self.spec.id
    }

    fn model(&self) -> &str {
        &self.spec.model
    }

    fn rpm(&self) -> NonZeroU32 {
        self.spec.rpm
    }

    async fn send(&self, text: &str) -> Result<String> {
        let request = self.build_request(text);

        debug!(
            backend = %self.spec.id,
            model = %request.model,
            chars = text.len(),
            "sending chat completion request"
        );

        let mut req = self
            .http
            .post(self.completions_url())
            .bearer_auth(self.spec.api_key.expose());

        for (k, v) in &self.spec.headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req.json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_ms = parse_retry_after_header(&response);
                let body = response.text().await.unwrap_or_default();
                let retry_after_ms = retry_after_ms.or_else(|| parse_retry_after_ms(&body));
                warn!(
                    backend = %self.spec.id,
                    retry_after_ms = ?retry_after_ms,
                    "rate limited by vendor"
                );
                return Err(BackendError::RateLimited { retry_after_ms });
            }

            let body = response.text().await.unwrap_or_default();
            let detail = extract_error_message(&body).unwrap_or(body);

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(BackendError::AuthFailed(detail));
            }

            return Err(BackendError::RequestFailed(format!("HTTP {status}: {detail}")));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            BackendError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;

        debug!(
            backend = %self.spec.id,
            model = chat_response.model.as_deref().unwrap_or(&self.spec.model),
            choices = chat_response.choices.len(),
            "chat completion response received"
        );

        chat_response
            .text()
            .map(str::to_string)
            .ok_or(BackendError::EmptyResponse)
    }
}

impl std::fmt::Debug for OpenAiCompatBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatBackend")
            .field("id", &self.spec.id)
            .field("model", &self.spec.model)
            .field("base_url", &self.spec.base_url)
            .field("api_key", &self.spec.api_key)
            .finish()
    }
}

/// Extract a human-readable message from a JSON error body.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("error").and_then(|v| {
        // {"error": {"message": "..."}}
        v.get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            // {"error": "..."}
            .or_else(|| v.as_str().map(String::from))
    })
}

/// Numeric `Retry-After` (seconds, possibly fractional) in milliseconds.
fn parse_retry_after_header(response: &reqwest::Response) -> Option<u64> {
    let value = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?;
    let secs = value.trim().parse::<f64>().ok()?;
    Some((secs * 1000.0).max(0.0) as u64)
}

/// `retry_after_ms` or `retry_after` (seconds) from a JSON error body.
fn parse_retry_after_ms(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("retry_after_ms")
        .and_then(|v| v.as_u64())
        .or_else(|| {
            value
                .get("retry_after")
                .and_then(|v| v.as_f64())
                .map(|secs| (secs * 1000.0) as u64)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyroute_types::{RouterConfig, SecretString, Vendor};

    fn spec(vendor: Vendor, id: &str, base_url: &str) -> BackendSpec {
        let mut spec = BackendSpec::for_vendor(
            vendor,
            BackendId::from(id),
            SecretString::new("sk-secret-key"),
            &RouterConfig::default(),
        );
        spec.base_url = base_url.into();
        spec
    }

    #[test]
    fn exposes_spec_through_trait() {
        let backend =
            OpenAiCompatBackend::new(spec(Vendor::Groq, "groq", "https://api.example.com/v1"))
                .unwrap();
        assert_eq!(backend.id().as_str(), "groq");
        assert_eq!(backend.model(), Vendor::Groq.default_model());
        assert_eq!(backend.rpm().get(), 50);
    }

    #[test]
    fn completions_url_strips_trailing_slash() {
        let backend =
            OpenAiCompatBackend::new(spec(Vendor::Groq, "groq", "https://api.example.com/v1/"))
                .unwrap();
        assert_eq!(
            backend.completions_url(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn request_carries_vendor_max_tokens() {
        let groq =
            OpenAiCompatBackend::new(spec(Vendor::Groq, "groq", "http://x")).unwrap();
        assert_eq!(groq.build_request("hi").max_tokens, Some(1000));

        let gemini =
            OpenAiCompatBackend::new(spec(Vendor::Gemini, "gemini", "http://x")).unwrap();
        let req = gemini.build_request("hi");
        assert_eq!(req.max_tokens, None);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
        assert_eq!(req.messages[0].content, "hi");
    }

    #[test]
    fn debug_never_leaks_api_key() {
        let backend =
            OpenAiCompatBackend::new(spec(Vendor::DeepSeek, "deepseek", "http://x")).unwrap();
        let output = format!("{backend:?}");
        assert!(!output.contains("sk-secret-key"));
        assert!(output.contains("[REDACTED]"));
    }

    #[test]
    fn error_message_from_nested_and_flat_bodies() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"bad key"}}"#).as_deref(),
            Some("bad key")
        );
        assert_eq!(
            extract_error_message(r#"{"error":"quota"}"#).as_deref(),
            Some("quota")
        );
        assert_eq!(extract_error_message("<html>"), None);
    }

    #[test]
    fn retry_after_from_body() {
        assert_eq!(parse_retry_after_ms(r#"{"retry_after_ms": 2500}"#), Some(2500));
        assert_eq!(parse_retry_after_ms(r#"{"retry_after": 3.5}"#), Some(3500));
        assert_eq!(parse_retry_after_ms(r#"{"error": "slow down"}"#), None);
        assert_eq!(parse_retry_after_ms("not json"), None);
    }
}
