//! Configuration loading, validation, and management for FinSight.
//!
//! Loads configuration from `~/.finsight/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! API keys are deliberately *not* read from the environment here: the
//! credential chain in `finsight-analysis` owns that lookup order, and only
//! consults this file's `api_key` as its last source.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.finsight/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default generation provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature; kept low so repeated analyses agree
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max output tokens per response (unset = backend default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Deadline for a single generation call, in seconds (0 = no deadline)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Default report language (ISO code)
    #[serde(default = "default_language")]
    pub language: String,

    /// Ingestion and context-size limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Conversational editing settings
    #[serde(default)]
    pub chat: ChatConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_request_timeout() -> u64 {
    120
}
fn default_language() -> String {
    "it".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("language", &self.language)
            .field("limits", &self.limits)
            .field("chat", &self.chat)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Character caps applied when tabular payloads are inlined into a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Cap when exactly one document is submitted
    #[serde(default = "default_single_document_chars")]
    pub single_document_chars: usize,

    /// Per-document cap when several documents are submitted
    #[serde(default = "default_per_document_chars")]
    pub per_document_chars: usize,
}

fn default_single_document_chars() -> usize {
    900_000
}
fn default_per_document_chars() -> usize {
    500_000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            single_document_chars: default_single_document_chars(),
            per_document_chars: default_per_document_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Characters of the serialized report embedded in each edit request
    #[serde(default = "default_report_context_chars")]
    pub report_context_chars: usize,

    /// Number of most recent turns replayed to the generator
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Re-attach source documents so answers stay grounded in them
    #[serde(default = "default_true")]
    pub attach_documents: bool,
}

fn default_report_context_chars() -> usize {
    30_000
}
fn default_history_turns() -> usize {
    10
}
fn default_true() -> bool {
    true
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            report_context_chars: default_report_context_chars(),
            history_turns: default_history_turns(),
            attach_documents: true,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.finsight/config.toml).
    ///
    /// Environment overrides:
    /// - `FINSIGHT_PROVIDER`
    /// - `FINSIGHT_MODEL`
    /// - `FINSIGHT_LANGUAGE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(provider) = std::env::var("FINSIGHT_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("FINSIGHT_MODEL") {
            config.default_model = model;
        }

        if let Ok(language) = std::env::var("FINSIGHT_LANGUAGE") {
            config.language = language;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".finsight")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.limits.single_document_chars == 0 || self.limits.per_document_chars == 0 {
            return Err(ConfigError::ValidationError(
                "document character limits must be > 0".into(),
            ));
        }

        if self.chat.report_context_chars == 0 {
            return Err(ConfigError::ValidationError(
                "chat.report_context_chars must be > 0".into(),
            ));
        }

        if !matches!(self.language.as_str(), "it" | "en" | "es" | "fr" | "de") {
            return Err(ConfigError::ValidationError(format!(
                "language must be one of it, en, es, fr, de (got '{}')",
                self.language
            )));
        }

        Ok(())
    }

    /// The key configured for `provider`, falling back to the global key.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }

    /// Deadline for one generation call, if any.
    pub fn request_timeout(&self) -> Option<std::time::Duration> {
        (self.request_timeout_secs > 0)
            .then(|| std::time::Duration::from_secs(self.request_timeout_secs))
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: None,
            request_timeout_secs: default_request_timeout(),
            language: default_language(),
            limits: LimitsConfig::default(),
            chat: ChatConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// The user's home directory, or the temp dir when none is set.
fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "gemini");
        assert!((config.default_temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.limits.single_document_chars, 900_000);
        assert_eq!(config.limits.per_document_chars, 500_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.chat.history_turns, config.chat.history_turns);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_language_rejected() {
        let config = AppConfig {
            language: "pt".into(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.default_model, "gemini-2.5-flash");
    }

    #[test]
    fn load_from_file_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
api_key = "from-file"
language = "en"

[limits]
per_document_chars = 1000

[providers.openai]
api_key = "sk-openai"
api_url = "https://api.openai.com/v1"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.language, "en");
        assert_eq!(config.limits.per_document_chars, 1000);
        assert_eq!(config.limits.single_document_chars, 900_000);
        assert_eq!(config.api_key_for("openai").as_deref(), Some("sk-openai"));
        assert_eq!(config.api_key_for("gemini").as_deref(), Some("from-file"));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "language = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn debug_redacts_keys() {
        let config = AppConfig {
            api_key: Some("AIza-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("AIza-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let config = AppConfig {
            request_timeout_secs: 0,
            ..AppConfig::default()
        };
        assert!(config.request_timeout().is_none());
        assert_eq!(
            AppConfig::default().request_timeout(),
            Some(std::time::Duration::from_secs(120))
        );
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini"));
        assert!(toml_str.contains("900000"));
    }
}
