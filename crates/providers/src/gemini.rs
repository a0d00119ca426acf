//! Google Gemini provider (`generateContent`).
//!
//! Supports:
//! - A system instruction plus ordered text and inline-binary parts, so PDFs
//!   travel as `inlineData` next to flattened spreadsheets
//! - Native structured output (`responseMimeType` + `responseSchema`)
//! - Health checks via the model listing endpoint

use async_trait::async_trait;
use finsight_core::error::ProviderError;
use finsight_core::provider::*;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::{http_client, network_error, status_error};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Keys the Gemini schema dialect understands. Everything else is dropped.
const SCHEMA_KEYS: [&str; 9] = [
    "description",
    "nullable",
    "enum",
    "format",
    "minItems",
    "maxItems",
    "minimum",
    "maximum",
    "propertyOrdering",
];

pub struct GeminiProvider {
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            client: http_client(),
        }
    }

    /// Point at a different endpoint (proxy, regional gateway, test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn to_api_parts(parts: &[Part]) -> Vec<Value> {
        parts
            .iter()
            .map(|part| match part {
                Part::Text { text } => json!({ "text": text }),
                Part::Inline {
                    media_type, data, ..
                } => json!({
                    "inlineData": { "mimeType": media_type, "data": data }
                }),
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> Value {
        let mut generation_config = json!({ "temperature": request.temperature });

        match &request.response_format {
            ResponseFormat::Text => {}
            ResponseFormat::Json => {
                generation_config["responseMimeType"] = json!("application/json");
            }
            ResponseFormat::JsonSchema { schema, .. } => {
                generation_config["responseMimeType"] = json!("application/json");
                if let Some(schema) = to_gemini_schema(schema) {
                    generation_config["responseSchema"] = schema;
                }
            }
        }

        if let Some(max_tokens) = request.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": Self::to_api_parts(&request.parts) }],
            "generationConfig": generation_config,
        });

        if !request.system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": request.system }] });
        }

        body
    }

    fn into_response(api: GenerateResponse, requested_model: &str) -> ProviderResponse {
        let candidate = api.candidates.into_iter().next();

        let finish_reason = match &candidate {
            Some(c) => c.finish_reason.clone(),
            None => api.prompt_feedback.and_then(|f| f.block_reason),
        };

        let text = candidate
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        let usage = api.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        ProviderResponse {
            text,
            usage,
            model: api
                .model_version
                .unwrap_or_else(|| requested_model.to_string()),
            finish_reason,
        }
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrite a JSON-Schema document into Gemini's OpenAPI-subset dialect.
///
/// Type names are upper-cased, a union type keeps its first non-null member,
/// and unsupported keywords are dropped. Free-form objects (no `properties`)
/// cannot be expressed, so they are removed along with their parent entry.
pub fn to_gemini_schema(schema: &Value) -> Option<Value> {
    let obj = schema.as_object()?;

    let ty = match obj.get("type") {
        Some(Value::String(t)) => t.clone(),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .unwrap_or("string")
            .to_string(),
        _ => "object".into(),
    };

    let mut out = Map::new();
    out.insert("type".into(), json!(ty.to_ascii_uppercase()));

    match ty.as_str() {
        "object" => {
            let props = obj.get("properties").and_then(Value::as_object)?;
            if props.is_empty() {
                return None;
            }
            let mut converted = Map::new();
            for (name, prop) in props {
                if let Some(p) = to_gemini_schema(prop) {
                    converted.insert(name.clone(), p);
                }
            }
            let required: Vec<Value> = obj
                .get("required")
                .and_then(Value::as_array)
                .map(|req| {
                    req.iter()
                        .filter(|r| r.as_str().is_some_and(|r| converted.contains_key(r)))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            out.insert("properties".into(), Value::Object(converted));
            if !required.is_empty() {
                out.insert("required".into(), Value::Array(required));
            }
        }
        "array" => {
            let items = obj.get("items").and_then(to_gemini_schema)?;
            out.insert("items".into(), items);
        }
        _ => {}
    }

    for key in SCHEMA_KEYS {
        if let Some(v) = obj.get(key) {
            out.insert(key.into(), v.clone());
        }
    }

    Some(Value::Object(out))
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_body(&request);

        debug!(
            provider = "gemini",
            model = %request.model,
            parts = request.parts.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", request.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error("gemini", status, error_body));
        }

        let api_response: GenerateResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let result = Self::into_response(api_response, &request.model);
        debug!(
            provider = "gemini",
            chars = result.text.len(),
            finish_reason = ?result.finish_reason,
            "Received response"
        );
        Ok(result)
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
