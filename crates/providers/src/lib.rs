//! Generation backends for FinSight.
//!
//! All providers implement the `finsight_core::Provider` trait.
//! The router selects the correct provider based on configuration.

pub mod gemini;
pub mod openai_compat;
pub mod router;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};

use finsight_core::ProviderError;
use std::time::Duration;
use tracing::warn;

/// Transport ceiling for a single HTTP exchange. Per-call deadlines are
/// applied by the caller and are normally shorter.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

pub(crate) fn network_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Map a non-success HTTP status (and its body) to a provider error.
pub(crate) fn status_error(provider: &str, status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        // Gemini rejects a bad key with 400 INVALID_ARGUMENT.
        400 if body.contains("API_KEY_INVALID") => {
            ProviderError::AuthenticationFailed("API key not valid".into())
        }
        _ => {
            warn!(provider, status, body = %body, "Provider returned error");
            ProviderError::ApiError {
                status_code: status,
                message: body,
            }
        }
    }
}
