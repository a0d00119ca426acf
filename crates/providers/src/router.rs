//! Provider router: selects the generation backend based on config.

use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;
use finsight_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes generation requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build providers from configuration.
///
/// Credentials are not bound here; each request carries its own key. An
/// OpenAI-compatible backend with no known endpoint and no `api_url` is
/// skipped, so `default()` may come back empty.
pub fn build_from_config(config: &finsight_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        if let Some(provider) = build_one(name, provider_config.api_url.as_deref()) {
            router.register(name.clone(), provider);
        }
    }

    if router.get(&config.default_provider).is_none()
        && let Some(provider) = build_one(&config.default_provider, None)
    {
        router.register(config.default_provider.clone(), provider);
    }

    debug!(providers = ?router.list(), default = %config.default_provider, "Provider router ready");
    router
}

fn build_one(name: &str, api_url: Option<&str>) -> Option<Arc<dyn Provider>> {
    match (name, api_url) {
        ("gemini", Some(url)) => Some(Arc::new(GeminiProvider::new().with_base_url(url))),
        ("gemini", None) => Some(Arc::new(GeminiProvider::new())),
        ("openai", None) => Some(Arc::new(OpenAiCompatProvider::openai())),
        ("openrouter", None) => Some(Arc::new(OpenAiCompatProvider::openrouter())),
        (_, Some(url)) => Some(Arc::new(OpenAiCompatProvider::new(name, url))),
        (_, None) => {
            warn!(provider = name, "No api_url configured for provider; skipping");
            None
        }
    }
}
