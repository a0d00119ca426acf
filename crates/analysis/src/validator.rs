//! Response validation.
//!
//! Generated text is untrusted. It is reduced to a single JSON object
//! (stripping a Markdown fence or surrounding prose), checked against the
//! [`SchemaContract`], and only then deserialized. Raw text is logged under
//! the `finsight::raw` target and never copied into an error.

use finsight_core::{Error, Report, Result};
use serde_json::Value;
use tracing::warn;

use crate::patch::PatchResult;
use crate::schema::SchemaContract;

/// Log target for raw generator output.
pub const RAW_TARGET: &str = "finsight::raw";

/// Strip an optional code fence and isolate the first JSON object.
///
/// Returns the input trimmed when no object can be located, so the parse
/// error that follows points at the real problem.
pub fn extract_json(raw: &str) -> &str {
    let text = strip_fence(raw.trim());
    if text.starts_with('{') {
        return text;
    }
    first_object(text).unwrap_or(text)
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the info string (`json`, `JSON`, ...) up to the first newline.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// The first balanced `{...}` in `text`, honouring string literals.
fn first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse raw text into a JSON object, or fail with `MalformedResponse`.
fn parse_object(raw: &str, what: &str) -> Result<serde_json::Map<String, Value>> {
    let candidate = extract_json(raw);
    let value: Value = serde_json::from_str(candidate).map_err(|e| {
        warn!(target: RAW_TARGET, raw = %raw, error = %e, "Unparseable {what}");
        Error::MalformedResponse(format!("{what} is not valid JSON: {e}"))
    })?;

    match value {
        Value::Object(map) => Ok(map),
        _ => {
            warn!(target: RAW_TARGET, raw = %raw, "Non-object {what}");
            Err(Error::MalformedResponse(format!("{what} is not a JSON object")))
        }
    }
}

/// Validate generated text as a complete report.
pub fn parse_report(raw: &str, contract: &SchemaContract) -> Result<Report> {
    let value = Value::Object(parse_object(raw, "report")?);
    validate_report_value(value, contract)
}

/// Check a report value against the contract and build the typed report.
pub fn validate_report_value(value: Value, contract: &SchemaContract) -> Result<Report> {
    if let Err(violations) = contract.validate(&value) {
        let listed: Vec<String> = violations.iter().map(ToString::to_string).collect();
        warn!(
            target: RAW_TARGET,
            violations = violations.len(),
            schema = contract.version(),
            "Report violates the schema contract"
        );
        return Err(Error::MalformedResponse(format!(
            "{} schema violation(s) against {}: {}",
            violations.len(),
            contract.version(),
            listed.join("; ")
        )));
    }

    serde_json::from_value(value)
        .map_err(|e| Error::MalformedResponse(format!("report does not match its type: {e}")))
}

/// Validate generated text as a patch envelope.
///
/// `answer` must be a string. `updatedAnalysis` may be absent or null
/// (answer only); otherwise it must be an object.
pub fn parse_patch(raw: &str) -> Result<PatchResult> {
    let mut map = parse_object(raw, "patch")?;

    let answer = match map.remove("answer") {
        Some(Value::String(answer)) => answer,
        Some(_) => return Err(Error::MalformedResponse("$.answer: expected a string".into())),
        None => {
            return Err(Error::MalformedResponse(
                "$.answer: missing required field".into(),
            ));
        }
    };

    let updated_fields = match map.remove("updatedAnalysis") {
        None | Some(Value::Null) => None,
        Some(Value::Object(fields)) => Some(fields),
        Some(_) => {
            return Err(Error::MalformedResponse(
                "$.updatedAnalysis: expected an object".into(),
            ));
        }
    };

    Ok(PatchResult {
        answer,
        updated_fields,
    })
}
