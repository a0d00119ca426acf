//! Conversational patch engine.
//!
//! A chat turn either answers a question about the report or changes it.
//! The generator replies with a [`PatchResult`] envelope; any fields it
//! returns overwrite the matching top-level report fields. The merge is
//! all-or-nothing: the candidate report is re-validated against the schema
//! contract and either replaces the old one wholesale or is discarded.

use finsight_config::ChatConfig;
use finsight_core::{ChatHistory, Error, Language, Part, Report, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::assembler::{Attachment, attachment_parts, truncate};
use crate::schema::SchemaContract;
use crate::validator::validate_report_value;

/// The generator's reply to a chat turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchResult {
    pub answer: String,
    /// Changed top-level fields only. `None` means answer-only.
    #[serde(
        rename = "updatedAnalysis",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_fields: Option<Map<String, Value>>,
}

impl PatchResult {
    pub fn answer_only(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            updated_fields: None,
        }
    }

    pub fn with_updates(answer: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            answer: answer.into(),
            updated_fields: Some(fields),
        }
    }

    /// Whether applying this patch can change anything.
    pub fn is_answer_only(&self) -> bool {
        self.updated_fields.as_ref().is_none_or(Map::is_empty)
    }
}

/// Knobs for patch requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    /// Characters of the serialized report embedded in the request.
    pub report_context_chars: usize,
    /// Most recent turns replayed as a transcript.
    pub history_turns: usize,
    /// Re-attach source documents for grounding.
    pub attach_documents: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            report_context_chars: 30_000,
            history_turns: 10,
            attach_documents: true,
        }
    }
}

impl From<&ChatConfig> for ChatSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            report_context_chars: config.report_context_chars,
            history_turns: config.history_turns,
            attach_documents: config.attach_documents,
        }
    }
}

/// A fully built patch request, minus the credential.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchRequest {
    pub instructions: String,
    pub parts: Vec<Part>,
}

/// Builds patch requests and merges their results.
#[derive(Debug, Clone, Default)]
pub struct PatchEngine {
    settings: ChatSettings,
}

impl PatchEngine {
    pub fn new(settings: ChatSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> ChatSettings {
        self.settings
    }

    /// Build the request for one chat turn.
    pub fn build_request(
        &self,
        report: &Report,
        history: &ChatHistory,
        instruction: &str,
        language: Language,
        attachments: &[Attachment],
        contract: &SchemaContract,
    ) -> Result<PatchRequest> {
        let report_json = serde_json::to_string(report)?;
        let (report_context, cut) = truncate(&report_json, self.settings.report_context_chars);
        if cut {
            debug!(
                chars = report_json.len(),
                budget = self.settings.report_context_chars,
                "Report context truncated"
            );
        }

        let envelope = serde_json::to_string_pretty(&contract.patch_envelope_schema())?;
        let instructions = patch_instructions(language, &report_context, &envelope);

        let mut parts = if self.settings.attach_documents {
            attachment_parts(attachments)
        } else {
            Vec::new()
        };

        let recent = history.recent(self.settings.history_turns);
        let mut conversation = String::new();
        if !recent.is_empty() {
            conversation.push_str("CONVERSATION SO FAR:\n");
            for turn in recent {
                conversation.push_str(&format!(
                    "{}: {}\n",
                    turn.role.to_string().to_uppercase(),
                    turn.content
                ));
            }
            conversation.push('\n');
        }
        conversation.push_str("USER REQUEST:\n");
        conversation.push_str(instruction);
        parts.push(Part::text(conversation));

        Ok(PatchRequest {
            instructions,
            parts,
        })
    }
}

/// Merge `patch` into `report`, returning the new report and the names of
/// the fields that were overwritten.
///
/// Lists are replaced wholesale and unknown keys are ignored. Any field that
/// fails to decode, or a merged report that breaks the contract, fails the
/// whole patch with `MalformedResponse`; `report` itself is never touched.
pub fn apply(
    report: &Report,
    patch: &PatchResult,
    contract: &SchemaContract,
) -> Result<(Report, Vec<String>)> {
    let Some(fields) = patch.updated_fields.as_ref().filter(|f| !f.is_empty()) else {
        return Ok((report.clone(), Vec::new()));
    };

    let mut candidate = report.clone();
    let mut changed = Vec::new();
    for (key, value) in fields {
        if !Report::is_field(key) {
            warn!(field = %key, "Ignoring unknown field in patch");
            continue;
        }
        let value = if key == "customSections" {
            with_section_ids(value.clone())
        } else {
            value.clone()
        };
        candidate
            .set_field(key, value)
            .map_err(|e| Error::MalformedResponse(format!("$.updatedAnalysis.{key}: {e}")))?;
        changed.push(key.clone());
    }

    // Re-check bounds and lengths the types alone cannot express.
    let candidate = validate_report_value(serde_json::to_value(&candidate)?, contract)?;

    debug!(fields = ?changed, "Applied patch");
    Ok((candidate, changed))
}

/// Give every custom section without an id a stable positional one, so the
/// same patch always produces the same report.
fn with_section_ids(mut value: Value) -> Value {
    if let Some(sections) = value.as_array_mut() {
        for (i, section) in sections.iter_mut().enumerate() {
            if let Some(obj) = section.as_object_mut() {
                let missing = obj.get("id").and_then(Value::as_str).is_none_or(str::is_empty);
                if missing {
                    obj.insert("id".into(), Value::String(format!("section-{}", i + 1)));
                }
            }
        }
    }
    value
}

/// The instruction block for a chat turn.
pub fn patch_instructions(language: Language, report_context: &str, envelope_schema: &str) -> String {
    let lang = language.display_name();
    format!(
        r#"Role: You are "FinSight CFO", the analyst who wrote the report below. You are
chatting with the user about it.

TARGET LANGUAGE: {lang}
Write every answer and every changed text in {lang}.

YOU MAY:
1. Answer a question about the report or the attached source documents.
2. Modify the report when the user asks for it: rewrite a section, add a KPI,
   add a custom section with a chart, correct a figure.

CURRENT REPORT (JSON):
{report_context}

RESPONSE FORMAT:
Reply with a single JSON object matching this schema:
{envelope_schema}

RULES FOR updatedAnalysis:
- Include it ONLY when the user asked for a change. Omit it for plain questions.
- Put in it ONLY the top-level fields you changed. Unchanged fields must be left out.
- Lists (kpis, customSections, recommendations, ...) replace the old list
  entirely: return the complete list, including the items you kept.
- A custom section is {{"id", "title", "content", "chart"?}}. A chart is
  {{"title", "type": "bar" | "line" | "area" | "composed", "data": [{{...}}],
  "xAxisKey", "dataKeys": [{{"key", "color", "name"}}]}}; every data row carries
  the xAxisKey and every dataKeys key.
"#
    )
}
