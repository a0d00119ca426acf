//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, DeepSeek, Groq, Together AI, vLLM, and
//! any endpoint exposing `/v1/chat/completions`.
//!
//! Binary attachments are sent as `file` content parts with a base64 data
//! URL. Structured output uses `response_format` (`json_schema` or
//! `json_object`).

use async_trait::async_trait;
use finsight_core::error::ProviderError;
use finsight_core::provider::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::{http_client, network_error, status_error};

/// An OpenAI-compatible generation provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http_client(),
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai() -> Self {
        Self::new("openai", "https://api.openai.com/v1")
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter() -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1")
    }

    fn to_api_content(parts: &[Part]) -> Vec<ApiContentPart> {
        parts
            .iter()
            .map(|part| match part {
                Part::Text { text } => ApiContentPart::Text { text: text.clone() },
                Part::Inline {
                    name,
                    media_type,
                    data,
                } => ApiContentPart::File {
                    file: ApiFile {
                        filename: name.clone(),
                        file_data: format!("data:{media_type};base64,{data}"),
                    },
                },
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if !request.system.is_empty() {
            messages.push(json!({ "role": "system", "content": request.system }));
        }
        messages.push(json!({
            "role": "user",
            "content": Self::to_api_content(&request.parts),
        }));

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        match &request.response_format {
            ResponseFormat::Text => {}
            ResponseFormat::Json => {
                body["response_format"] = json!({ "type": "json_object" });
            }
            ResponseFormat::JsonSchema { name, schema } => {
                body["response_format"] = json!({
                    "type": "json_schema",
                    "json_schema": { "name": name, "schema": schema, "strict": false },
                });
            }
        }

        body
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(request.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error(&self.name, status, error_body));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        Ok(api_response.into_provider_response())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentPart {
    Text { text: String },
    File { file: ApiFile },
}

#[derive(Debug, Serialize)]
struct ApiFile {
    filename: String,
    file_data: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

impl ApiResponse {
    fn into_provider_response(self) -> ProviderResponse {
        let choice = self.choices.into_iter().next();
        let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let text = choice.and_then(|c| c.message.content).unwrap_or_default();

        ProviderResponse {
            text,
            usage: self.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: self.model,
            finish_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(format: ResponseFormat) -> ProviderRequest {
        ProviderRequest {
            model: "gpt-4o".into(),
            system: "You are a CFO".into(),
            parts: vec![
                Part::text("sheet data"),
                Part::Inline {
                    name: "Notes.pdf".into(),
                    media_type: "application/pdf".into(),
                    data: "JVBERi0=".into(),
                },
            ],
            temperature: 0.2,
            max_tokens: None,
            response_format: format,
            api_key: ApiKey::new("sk-test"),
        }
    }

    #[test]
    fn openrouter_constructor() {
        let provider = OpenAiCompatProvider::openrouter();
        assert_eq!(provider.name(), "openrouter");
        assert!(provider.base_url.contains("openrouter.ai"));
    }

    #[test]
    fn system_then_user_parts() {
        let body = OpenAiCompatProvider::build_body(&request(ResponseFormat::Text));
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        let content = messages[1]["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "file");
        assert_eq!(content[1]["file"]["filename"], "Notes.pdf");
        assert_eq!(
            content[1]["file"]["file_data"],
            "data:application/pdf;base64,JVBERi0="
        );
        assert!(body.get("response_format").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn response_format_variants() {
        let body = OpenAiCompatProvider::build_body(&request(ResponseFormat::Json));
        assert_eq!(body["response_format"]["type"], "json_object");

        let body = OpenAiCompatProvider::build_body(&request(ResponseFormat::JsonSchema {
            name: "report".into(),
            schema: json!({ "type": "object" }),
        }));
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "report");
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "model": "gpt-4o-2024-08-06",
            "choices": [{ "message": { "role": "assistant", "content": "{\"answer\":\"ok\"}" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = parsed.into_provider_response();
        assert_eq!(resp.text, r#"{"answer":"ok"}"#);
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().prompt_tokens, 10);
    }

    #[test]
    fn null_content_becomes_empty_text() {
        let data = r#"{ "model": "m", "choices": [{ "message": { "content": null } }] }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.into_provider_response().text.is_empty());
    }
}
