//! The single outbound generation call.
//!
//! Resolves a credential, sends one request through a [`Provider`], and
//! returns the raw text. No retries: a failure is reported as-is so the
//! caller decides what to do. Dropping the returned future cancels the
//! in-flight request.

use finsight_core::{ApiKey, Error, Part, Provider, ProviderRequest, ResponseFormat, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::assembler::GenerationRequest;
use crate::credentials::CredentialChain;
use crate::schema::SchemaContract;

/// Sends generation requests on behalf of a session.
pub struct AnalysisInvoker {
    provider: Arc<dyn Provider>,
    credentials: CredentialChain,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    deadline: Option<Duration>,
}

impl std::fmt::Debug for AnalysisInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisInvoker")
            .field("provider", &self.provider.name())
            .field("credentials", &self.credentials)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl AnalysisInvoker {
    pub fn new(
        provider: Arc<dyn Provider>,
        credentials: CredentialChain,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            credentials,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            deadline: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Fail a call with [`Error::Timeout`] once `deadline` elapses.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Resolve the key for one call, before any network activity.
    pub fn resolve_key(&self, explicit: Option<&str>) -> Result<ApiKey> {
        self.credentials.resolve(explicit).ok_or_else(|| {
            Error::Authentication("no API key found (pass one explicitly, set FINSIGHT_API_KEY, or add api_key to the config file)".into())
        })
    }

    /// Run the analysis call in strict structured-output mode.
    pub async fn invoke(
        &self,
        request: &GenerationRequest,
        contract: &SchemaContract,
        explicit_key: Option<&str>,
    ) -> Result<String> {
        let format = ResponseFormat::JsonSchema {
            name: "financial_report".into(),
            schema: contract.to_json_schema(),
        };
        info!(
            provider = self.provider.name(),
            model = %self.model,
            attachments = request.attachments.len(),
            schema = contract.version(),
            "Requesting analysis"
        );
        self.send(&request.instructions, request.parts(), format, explicit_key)
            .await
    }

    /// Send one request and return the generated text.
    pub async fn send(
        &self,
        instructions: &str,
        parts: Vec<Part>,
        response_format: ResponseFormat,
        explicit_key: Option<&str>,
    ) -> Result<String> {
        let api_key = self.resolve_key(explicit_key)?;

        let request = ProviderRequest {
            model: self.model.clone(),
            system: instructions.to_string(),
            parts,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format,
            api_key,
        };

        let call = self.provider.complete(request);
        let response = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, call).await.map_err(|_| {
                warn!(
                    provider = self.provider.name(),
                    timeout_secs = deadline.as_secs(),
                    "Generation call timed out"
                );
                Error::Timeout {
                    secs: deadline.as_secs(),
                }
            })?,
            None => call.await,
        }?;

        if let Some(usage) = response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Token usage"
            );
        }

        if response.text.trim().is_empty() {
            let reason = response
                .finish_reason
                .map(|r| format!("empty response (finish reason: {r})"))
                .unwrap_or_else(|| "empty response".into());
            warn!(provider = self.provider.name(), model = %response.model, %reason, "Generator produced no text");
            return Err(Error::GenerationUnavailable(reason));
        }

        Ok(response.text)
    }
}
