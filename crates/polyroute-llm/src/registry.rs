//! Backend discovery from credentials and config overrides.
//!
//! A backend exists only when its vendor credential is present. Discovery
//! walks the vendors in a fixed order (Groq, every OpenRouter model,
//! Gemini, DeepSeek) and produces one [`BackendSpec`] per backend, layering
//! config-file overrides over the vendor defaults.
//!
//! | Variable              | Effect                                              |
//! |-----------------------|-----------------------------------------------------|
//! | `GROQ_API_KEY`        | enables `groq`                                      |
//! | `OPENROUTER_API_KEY`  | enables `openrouter_0..N`                           |
//! | `OPENROUTER_MODELS`   | comma-separated models, one backend each            |
//! | `GOOGLE_API_KEY`      | enables `gemini`                                    |
//! | `DEEPSEEK_API_KEY`    | enables `deepseek`                                  |
//! | `DEEPSEEK_BASE_URL`   | DeepSeek endpoint (default `https://api.deepseek.com`) |

use std::num::NonZeroU32;
use std::time::Duration;

use polyroute_types::{BackendId, RouterConfig, SecretString, Vendor};
use tracing::debug;

/// Comma-separated OpenRouter model list.
pub const OPENROUTER_MODELS_ENV: &str = "OPENROUTER_MODELS";

/// DeepSeek endpoint override.
pub const DEEPSEEK_BASE_URL_ENV: &str = "DEEPSEEK_BASE_URL";

/// Attribution headers OpenRouter asks clients to send.
const OPENROUTER_REFERER: &str = "https://github.com/polyroute/polyroute";
const OPENROUTER_TITLE: &str = "polyroute";

/// Fully resolved settings for one backend.
#[derive(Debug, Clone)]
pub struct BackendSpec {
    /// Unique backend identifier.
    pub id: BackendId,
    /// Vendor the backend talks to.
    pub vendor: Vendor,
    /// Target model name.
    pub model: String,
    /// OpenAI-compatible base URL (without `/chat/completions`).
    pub base_url: String,
    /// Vendor credential.
    pub api_key: SecretString,
    /// Requests-per-minute ceiling.
    pub rpm: NonZeroU32,
    /// Transport timeout for one request.
    pub timeout: Duration,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Completion cap, if the vendor gets one.
    pub max_tokens: Option<u32>,
}

impl BackendSpec {
    /// Build a spec from vendor defaults, then apply the config overrides
    /// registered under `id`.
    pub fn for_vendor(
        vendor: Vendor,
        id: BackendId,
        api_key: SecretString,
        config: &RouterConfig,
    ) -> Self {
        let overrides = config.backend(id.as_str());
        let headers = match vendor {
            Vendor::OpenRouter => vec![
                ("HTTP-Referer".to_string(), OPENROUTER_REFERER.to_string()),
                ("X-Title".to_string(), OPENROUTER_TITLE.to_string()),
            ],
            _ => Vec::new(),
        };

        Self {
            model: overrides
                .and_then(|o| o.model.clone())
                .unwrap_or_else(|| vendor.default_model().to_string()),
            base_url: overrides
                .and_then(|o| o.base_url.clone())
                .unwrap_or_else(|| vendor.default_base_url().to_string()),
            rpm: config.rpm_for(id.as_str(), vendor.default_rpm()),
            timeout: Duration::from_secs(config.timeout_for(id.as_str())),
            max_tokens: vendor.max_tokens(),
            headers,
            api_key,
            vendor,
            id,
        }
    }
}

/// Discover configured backends using `lookup` to read credentials.
///
/// `lookup` has the shape of `std::env::var(..).ok()`; tests pass a map.
/// Returns an empty list when no credential is present; the router turns
/// that into a configuration error.
pub fn discover<F>(config: &RouterConfig, lookup: F) -> Vec<BackendSpec>
where
    F: Fn(&str) -> Option<String>,
{
    let mut specs = Vec::new();

    for vendor in Vendor::ALL {
        let Some(api_key) = SecretString::from_lookup(lookup(vendor.api_key_env())) else {
            debug!(vendor = %vendor, env = vendor.api_key_env(), "credential absent, backend disabled");
            continue;
        };

        match vendor {
            Vendor::OpenRouter => {
                let models = openrouter_models(lookup(OPENROUTER_MODELS_ENV));
                for (index, model) in models.into_iter().enumerate() {
                    let id = BackendId::openrouter(index);
                    let mut spec = BackendSpec::for_vendor(vendor, id, api_key.clone(), config);
                    if config.backend(spec.id.as_str()).and_then(|o| o.model.as_ref()).is_none() {
                        spec.model = model;
                    }
                    specs.push(spec);
                }
            }
            Vendor::DeepSeek => {
                let id = BackendId::from(vendor.name());
                let mut spec = BackendSpec::for_vendor(vendor, id, api_key, config);
                let base_overridden = config
                    .backend(spec.id.as_str())
                    .and_then(|o| o.base_url.as_ref())
                    .is_some();
                if !base_overridden
                    && let Some(url) = lookup(DEEPSEEK_BASE_URL_ENV).filter(|u| !u.trim().is_empty())
                {
                    spec.base_url = url.trim().to_string();
                }
                specs.push(spec);
            }
            Vendor::Groq | Vendor::Gemini => {
                let id = BackendId::from(vendor.name());
                specs.push(BackendSpec::for_vendor(vendor, id, api_key, config));
            }
        }
    }

    debug!(
        backends = ?specs.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
        "backend discovery complete"
    );
    specs
}

/// Discover configured backends from the process environment.
pub fn discover_from_env(config: &RouterConfig) -> Vec<BackendSpec> {
    discover(config, |key| std::env::var(key).ok())
}

/// Split `OPENROUTER_MODELS`, falling back to the vendor default model.
fn openrouter_models(raw: Option<String>) -> Vec<String> {
    let models: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();
    if models.is_empty() {
        vec![Vendor::OpenRouter.default_model().to_string()]
    } else {
        models
    }
}
