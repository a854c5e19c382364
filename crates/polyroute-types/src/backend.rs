//! Backend identifiers and the vendor catalogue.
//!
//! A [`BackendId`] names one configured vendor+model pair (e.g. `"groq"`,
//! `"openrouter_0"`). Identifiers are unique within a process and are the
//! only way the router refers to a backend.

use std::borrow::Borrow;
use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Prefix shared by every OpenRouter backend (`openrouter_0`, `openrouter_1`, ...).
pub const OPENROUTER_PREFIX: &str = "openrouter_";

/// Stable identifier of a configured backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    /// Create an identifier from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier of the `index`-th OpenRouter model backend.
    pub fn openrouter(index: usize) -> Self {
        Self(format!("{OPENROUTER_PREFIX}{index}"))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for `openrouter_N` identifiers.
    pub fn is_openrouter(&self) -> bool {
        self.0.starts_with(OPENROUTER_PREFIX)
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BackendId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for BackendId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for BackendId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for BackendId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// An LLM vendor the router knows how to reach.
///
/// Every vendor is reached through its OpenAI-compatible chat completions
/// endpoint; the variant only selects defaults (URL, model, credentials,
/// rate ceiling, extra headers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// Groq cloud.
    Groq,
    /// OpenRouter aggregator (one backend per configured model).
    OpenRouter,
    /// Google Gemini via its OpenAI-compatible endpoint.
    Gemini,
    /// DeepSeek.
    DeepSeek,
}

impl Vendor {
    /// Vendors in configuration order.
    pub const ALL: [Vendor; 4] = [
        Vendor::Groq,
        Vendor::OpenRouter,
        Vendor::Gemini,
        Vendor::DeepSeek,
    ];

    /// Short vendor name.
    pub fn name(self) -> &'static str {
        match self {
            Vendor::Groq => "groq",
            Vendor::OpenRouter => "openrouter",
            Vendor::Gemini => "gemini",
            Vendor::DeepSeek => "deepseek",
        }
    }

    /// Environment variable holding the vendor credential.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Vendor::Groq => "GROQ_API_KEY",
            Vendor::OpenRouter => "OPENROUTER_API_KEY",
            Vendor::Gemini => "GOOGLE_API_KEY",
            Vendor::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    /// Default OpenAI-compatible base URL.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Vendor::Groq => "https://api.groq.com/openai/v1",
            Vendor::OpenRouter => "https://openrouter.ai/api/v1",
            Vendor::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            Vendor::DeepSeek => "https://api.deepseek.com",
        }
    }

    /// Default model. OpenRouter models come from `OPENROUTER_MODELS`.
    pub fn default_model(self) -> &'static str {
        match self {
            Vendor::Groq => "llama-3.3-70b-versatile",
            Vendor::OpenRouter => "tngtech/deepseek-r1t2-chimera:free",
            Vendor::Gemini => "gemini-2.0-flash-exp",
            Vendor::DeepSeek => "deepseek-chat",
        }
    }

    /// Default requests-per-minute ceiling.
    pub fn default_rpm(self) -> NonZeroU32 {
        let rpm = match self {
            Vendor::Groq => 50,
            Vendor::OpenRouter => 30,
            Vendor::Gemini => 12,
            Vendor::DeepSeek => 50,
        };
        NonZeroU32::new(rpm).unwrap_or(NonZeroU32::MIN)
    }

    /// Completion cap sent with each request, if the vendor gets one.
    pub fn max_tokens(self) -> Option<u32> {
        match self {
            Vendor::Groq | Vendor::DeepSeek => Some(1000),
            Vendor::OpenRouter | Vendor::Gemini => None,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn openrouter_ids() {
        let id = BackendId::openrouter(2);
        assert_eq!(id.as_str(), "openrouter_2");
        assert!(id.is_openrouter());
        assert!(!BackendId::from("groq").is_openrouter());
    }

    #[test]
    fn borrow_allows_str_lookup() {
        let mut map: HashMap<BackendId, u32> = HashMap::new();
        map.insert(BackendId::from("gemini"), 12);
        assert_eq!(map.get("gemini"), Some(&12));
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&BackendId::from("deepseek")).unwrap();
        assert_eq!(json, "\"deepseek\"");
    }

    #[test]
    fn vendor_defaults() {
        assert_eq!(Vendor::Gemini.default_rpm().get(), 12);
        assert_eq!(Vendor::OpenRouter.default_rpm().get(), 30);
        assert_eq!(Vendor::Groq.max_tokens(), Some(1000));
        assert_eq!(Vendor::Gemini.max_tokens(), None);
        for vendor in Vendor::ALL {
            assert!(vendor.api_key_env().ends_with("_API_KEY"));
            assert!(vendor.default_base_url().starts_with("https://"));
        }
    }
}
