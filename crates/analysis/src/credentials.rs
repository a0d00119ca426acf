//! API key lookup.
//!
//! A [`CredentialChain`] is an ordered list of sources; the first one that
//! yields a non-blank value wins. A key supplied by the caller for a single
//! call always outranks the chain.

use finsight_core::ApiKey;

/// Environment variables consulted by the standard chain, in order.
pub const ENV_KEYS: [&str; 4] = ["FINSIGHT_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

/// Something that may be able to produce an API key.
pub trait CredentialSource: Send + Sync {
    fn fetch(&self) -> Option<String>;
}

impl<F> CredentialSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn fetch(&self) -> Option<String> {
        self()
    }
}

/// Reads one environment variable by its literal name.
#[derive(Debug, Clone, Copy)]
pub struct EnvVar(pub &'static str);

impl CredentialSource for EnvVar {
    fn fetch(&self) -> Option<String> {
        std::env::var(self.0).ok()
    }
}

/// A value fixed at construction (e.g. from the configuration file).
#[derive(Clone)]
pub struct Fixed(Option<String>);

impl Fixed {
    pub fn new(value: Option<String>) -> Self {
        Self(value)
    }
}

impl CredentialSource for Fixed {
    fn fetch(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Ordered credential sources.
#[derive(Default)]
pub struct CredentialChain {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl std::fmt::Debug for CredentialChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialChain")
            .field("sources", &self.sources.len())
            .finish()
    }
}

impl CredentialChain {
    /// An empty chain. Only caller-supplied keys will resolve.
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment variables in [`ENV_KEYS`] order, then `config_key`.
    pub fn standard(config_key: Option<String>) -> Self {
        let mut chain = Self::new();
        for name in ENV_KEYS {
            chain = chain.with(EnvVar(name));
        }
        chain.with(Fixed::new(config_key))
    }

    /// Append a source at the lowest priority.
    pub fn with(mut self, source: impl CredentialSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Resolve a key: `explicit` first, then each source in order.
    pub fn resolve(&self, explicit: Option<&str>) -> Option<ApiKey> {
        explicit
            .and_then(non_blank)
            .or_else(|| self.sources.iter().find_map(|s| s.fetch().as_deref().and_then(non_blank)))
            .map(ApiKey::new)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn explicit_key_wins() {
        let chain = CredentialChain::new().with(|| Some("from-source".to_string()));
        let key = chain.resolve(Some("  typed-in  ")).unwrap();
        assert_eq!(key.expose(), "typed-in");
    }

    #[test]
    fn first_non_blank_source_wins() {
        let chain = CredentialChain::new()
            .with(|| None::<String>)
            .with(|| Some("   ".to_string()))
            .with(|| Some("second".to_string()))
            .with(|| Some("third".to_string()));
        assert_eq!(chain.resolve(Some("")).unwrap().expose(), "second");
    }

    #[test]
    fn sources_after_a_hit_are_not_consulted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let chain = CredentialChain::new()
            .with(|| Some("k".to_string()))
            .with(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Some("never".to_string())
            });
        chain.resolve(None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_chain_resolves_nothing() {
        assert!(CredentialChain::new().resolve(None).is_none());
    }

    #[test]
    fn standard_chain_has_env_then_config_sources() {
        let chain = CredentialChain::standard(Some("from-config".into()));
        assert_eq!(chain.len(), ENV_KEYS.len() + 1);
    }

    #[test]
    fn unset_env_var_falls_through_to_config() {
        let chain = CredentialChain::new()
            .with(EnvVar("FINSIGHT_UNSET_TEST_KEY_7F3A"))
            .with(Fixed::new(Some("from-config".into())));
        assert_eq!(chain.resolve(None).unwrap().expose(), "from-config");
    }

    #[test]
    fn debug_does_not_leak_keys() {
        let chain = CredentialChain::new().with(Fixed::new(Some("secret".into())));
        assert!(!format!("{chain:?}").contains("secret"));
    }
}
