//! Response parser for SOAP generation
//!
//! The only tolerated deviation from pure JSON is one layer of markdown code
//! fence around the object. No other repair is attempted: a reply that is not a
//! JSON object after fence stripping is a parse error, never a partial guess.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, SoapError};

/// The four SOAP sections. Every field is always present, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoapResult {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}

impl SoapResult {
    /// Number of non-empty sections
    pub fn filled_sections(&self) -> usize {
        [&self.subjective, &self.objective, &self.assessment, &self.plan]
            .iter()
            .filter(|s| !s.trim().is_empty())
            .count()
    }
}

/// Strip one leading/trailing markdown code fence, with or without a language tag.
/// Text without a leading fence is returned trimmed and otherwise untouched.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // The rest of the opening line is the info string ("json", "JSON", or nothing)
    let body = match rest.split_once('\n') {
        Some((info, remainder)) if info.trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            remainder
        }
        _ => rest,
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse the model's raw reply into a [`SoapResult`]
pub fn parse_soap_response(raw: &str) -> Result<SoapResult> {
    let payload = strip_code_fence(raw);

    let value: Value = serde_json::from_str(payload).map_err(|e| {
        warn!("Failed to parse SOAP response as JSON: {} ({} chars)", e, raw.len());
        SoapError::parse(format!("AI response was not valid JSON: {}", e), raw)
    })?;

    let object = match value {
        Value::Object(object) => object,
        other => {
            warn!("SOAP response is valid JSON but not an object");
            return Err(SoapError::parse(
                format!("expected a JSON object, got {}", json_type(&other)),
                raw,
            ));
        }
    };

    let result = SoapResult {
        subjective: section(&object, "subjective", raw)?,
        objective: section(&object, "objective", raw)?,
        assessment: section(&object, "assessment", raw)?,
        plan: section(&object, "plan", raw)?,
    };

    debug!(
        "Parsed SOAP response: {}/4 sections filled",
        result.filled_sections()
    );
    Ok(result)
}

/// A missing or null section defaults to the empty string
fn section(object: &Map<String, Value>, key: &str, raw: &str) -> Result<String> {
    match object.get(key) {
        None | Some(Value::Null) => {
            debug!("SOAP response missing '{}', defaulting to empty", key);
            Ok(String::new())
        }
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(SoapError::parse(
            format!("field '{}' must be a string, got {}", key, json_type(other)),
            raw,
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
