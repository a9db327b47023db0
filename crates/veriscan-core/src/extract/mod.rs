//! Structured result extraction from raw model text.
//!
//! Model output is supposed to be one JSON object, but in practice it comes
//! wrapped in markdown fences, surrounded by prose, with trailing commas,
//! raw newlines inside strings, or unescaped quotes in the long prose field.
//! Extraction isolates the object and repairs what it safely can.

mod repair;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::types::{MediaLiteracy, SourceMetadata};

pub use repair::{escape_control_chars, escape_field_quotes};

/// Errors that can occur when extracting the structured result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("No JSON object found in model output")]
    NoJsonFound,

    #[error("JSON could not be repaired: {reason} (near `{excerpt}`)")]
    UnrepairableJson { excerpt: String, reason: String },
}

lazy_static! {
    /// Markdown code fence marker with an optional language tag
    static ref CODE_FENCE: Regex = Regex::new(r"```[A-Za-z0-9_-]*").unwrap();

    /// Comma directly before a closing brace or bracket
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*([\]}])").unwrap();
}

/// Field whose unescaped quotes get repaired.
pub const REPAIR_FIELD: &str = "analysis";

/// Keys that may follow the repaired field and therefore end it.
pub const FIELD_TERMINATORS: &[&str] = &[
    "verdict",
    "confidence_score",
    "multimodal_cross_check",
    "key_findings",
    "source_metadata",
    "media_literacy",
];

/// Characters of context kept around a parse failure.
const EXCERPT_RADIUS: usize = 100;

/// Fields pulled from the model's JSON object, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuredOutput {
    pub verdict: Option<String>,
    pub confidence_score: Option<f64>,
    pub analysis: String,
    pub multimodal_cross_check: bool,
    pub source_metadata: Option<SourceMetadata>,
    pub media_literacy: Option<MediaLiteracy>,
}

impl StructuredOutput {
    /// Read the known fields from a parsed object.
    ///
    /// Scalars are read leniently: numbers may arrive as strings (`"85%"`),
    /// booleans as `"true"`. Malformed nested objects are dropped.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            verdict: object.get("verdict").and_then(lenient_string),
            confidence_score: object.get("confidence_score").and_then(lenient_f64),
            analysis: object
                .get("analysis")
                .and_then(lenient_string)
                .unwrap_or_default(),
            multimodal_cross_check: object
                .get("multimodal_cross_check")
                .map(lenient_bool)
                .unwrap_or(false),
            source_metadata: object
                .get("source_metadata")
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
            media_literacy: object
                .get("media_literacy")
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
        }
    }
}

/// Extract the structured output from raw model text.
pub fn extract(raw: &str) -> Result<StructuredOutput, ExtractionError> {
    let object = extract_object(raw)?;
    Ok(StructuredOutput::from_object(&object))
}

/// Extract from raw bytes; invalid UTF-8 is replaced, not rejected.
pub fn extract_bytes(raw: &[u8]) -> Result<StructuredOutput, ExtractionError> {
    extract(&String::from_utf8_lossy(raw))
}

/// Isolate, clean and parse the JSON object in `raw`.
pub fn extract_object(raw: &str) -> Result<Map<String, Value>, ExtractionError> {
    let unfenced = CODE_FENCE.replace_all(raw, "");
    let candidate = isolate_object(&unfenced).ok_or(ExtractionError::NoJsonFound)?;
    let cleaned = TRAILING_COMMA.replace_all(candidate, "${1}");

    let first_error = match parse_lenient(&cleaned) {
        Ok(object) => return Ok(object),
        Err(e) => e,
    };
    debug!(error = %first_error, "Initial parse failed, attempting quote repair");

    match escape_field_quotes(&cleaned) {
        Some(repaired) => parse_lenient(&repaired).map_err(|e| unrepairable(&repaired, &e)),
        None => Err(unrepairable(&cleaned, &first_error)),
    }
}

/// Span from the first `{` to the last `}`.
fn isolate_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse_lenient(text: &str) -> Result<Map<String, Value>, serde_json::Error> {
    let escaped = escape_control_chars(text);
    match serde_json::from_str::<Value>(&escaped)? {
        Value::Object(object) => Ok(object),
        _ => Err(serde::de::Error::custom("top-level value is not an object")),
    }
}

fn unrepairable(text: &str, err: &serde_json::Error) -> ExtractionError {
    let escaped = escape_control_chars(text);
    ExtractionError::UnrepairableJson {
        excerpt: excerpt_near(&escaped, err.line(), err.column(), EXCERPT_RADIUS),
        reason: err.to_string(),
    }
}

/// Text around a 1-based line/column position reported by the parser.
fn excerpt_near(text: &str, line: usize, column: usize, radius: usize) -> String {
    let line_start: usize = text
        .split('\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    let mut pos = (line_start + column.saturating_sub(1)).min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }

    let char_pos = text[..pos].chars().count();
    text.chars()
        .skip(char_pos.saturating_sub(radius))
        .take(radius * 2)
        .collect()
}

fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(lenient_string).collect();
            (!parts.is_empty()).then(|| parts.join("\n"))
        }
        _ => None,
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

fn lenient_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}
