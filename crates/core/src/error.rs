//! Error types for the FinSight domain.
//!
//! Uses `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// The top-level error type for all FinSight operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Ingestion ---
    #[error("Unsupported file format: {name} (accepted: .xlsx, .xls, .csv, .pdf)")]
    UnsupportedFormat { name: String },

    #[error("Document contains no extractable data: {name}")]
    EmptyDocument { name: String },

    #[error("Failed to decode {name}: {reason}")]
    DocumentDecode { name: String, reason: String },

    // --- Generation ---
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Generation request timed out after {secs}s")]
    Timeout { secs: u64 },

    // --- Session ---
    #[error("No report available: run an analysis first")]
    NoReport,

    // --- Configuration ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- I/O and serialization ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the caller should route the user to a credential-entry flow
    /// instead of showing a generic failure.
    pub fn requires_credential(&self) -> bool {
        matches!(self, Error::Authentication(_))
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::AuthenticationFailed(reason) => Error::Authentication(reason),
            other => Error::Provider(other),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a generation backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}
