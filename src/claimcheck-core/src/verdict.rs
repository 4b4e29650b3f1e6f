//! Verdict records and the lenient parsing of model output.
//!
//! The verdict model is asked for a JSON object but is not trusted to
//! produce one. Parsing strips code fences, falls back to per-field
//! extraction on broken JSON, and always yields a usable record.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::search::EvidenceResult;

/// Placeholder for any field the model failed to supply.
pub const NOT_AVAILABLE: &str = "N/A";

const PARSE_FAILURE: &str = "An error occurred while parsing the fact-check result";

const FIELDS: [&str; 7] = [
    "Verification",
    "Confidence",
    "Explanation",
    "Bias",
    "Sources",
    "Categories",
    "Sentiment",
];

/// Verification label for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verification {
    #[serde(rename = "VERIFIED")]
    Verified,
    #[serde(rename = "PARTIALLY VERIFIED")]
    PartiallyVerified,
    #[serde(rename = "NOT VERIFIED")]
    NotVerified,
    #[serde(rename = "ERROR")]
    Error,
}

impl Verification {
    /// Map a model-supplied label; anything unrecognized is an error.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "VERIFIED" => Self::Verified,
            "PARTIALLY VERIFIED" => Self::PartiallyVerified,
            "NOT VERIFIED" => Self::NotVerified,
            _ => Self::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "VERIFIED",
            Self::PartiallyVerified => "PARTIALLY VERIFIED",
            Self::NotVerified => "NOT VERIFIED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence label attached to a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl Confidence {
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "HIGH" => Self::High,
            "MEDIUM" => Self::Medium,
            "LOW" => Self::Low,
            _ => Self::NotAvailable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::NotAvailable => NOT_AVAILABLE,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured fact-check outcome parsed from the model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub verification: Verification,
    pub confidence: Confidence,
    pub explanation: String,
    pub bias: String,
    pub sources: String,
    /// Category list as echoed by the model. The pipeline replaces it
    /// with locally derived categories on the claim record.
    pub categories: String,
    /// Sentiment as echoed by the model, superseded the same way.
    pub sentiment: String,
}

impl VerdictRecord {
    /// Record representing a failed check.
    pub fn error(explanation: impl Into<String>) -> Self {
        Self {
            verification: Verification::Error,
            confidence: Confidence::NotAvailable,
            explanation: explanation.into(),
            bias: NOT_AVAILABLE.to_string(),
            sources: NOT_AVAILABLE.to_string(),
            categories: NOT_AVAILABLE.to_string(),
            sentiment: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Parse a model response into a verdict record. Never fails.
pub fn parse_verdict(raw: &str) -> VerdictRecord {
    let payload = clean_payload(raw);

    let decode_err = match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => return record_from_map(&map),
        Ok(other) => format!("expected a JSON object, got {}", other),
        Err(e) => e.to_string(),
    };

    warn!("JSON parsing error: {}", decode_err);
    salvage_fields(payload, &decode_err)
}

/// Strip whitespace, code fences, and a leading `json` language tag.
fn clean_payload(raw: &str) -> &str {
    let payload = raw.trim().trim_matches('`').trim();
    payload.strip_prefix("json").unwrap_or(payload).trim()
}

fn record_from_map(map: &serde_json::Map<String, Value>) -> VerdictRecord {
    let field = |name: &str| -> String {
        match map.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => NOT_AVAILABLE.to_string(),
        }
    };

    VerdictRecord {
        verification: Verification::from_wire(&field("Verification")),
        confidence: Confidence::from_wire(&field("Confidence")),
        explanation: field("Explanation"),
        bias: field("Bias"),
        sources: field("Sources"),
        categories: field("Categories"),
        sentiment: field("Sentiment"),
    }
}

/// Scrape whatever fields survive in a response that is not valid JSON.
fn salvage_fields(payload: &str, decode_err: &str) -> VerdictRecord {
    let salvaged: Vec<Option<String>> = FIELDS
        .iter()
        .map(|field| extract_field(payload, field))
        .collect();

    if salvaged.iter().all(Option::is_none) {
        return VerdictRecord::error(format!("{}: {}", PARSE_FAILURE, decode_err));
    }

    let value = |index: usize| -> String {
        salvaged[index]
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };

    VerdictRecord {
        verification: Verification::from_wire(&value(0)),
        confidence: Confidence::from_wire(&value(1)),
        explanation: value(2),
        bias: value(3),
        sources: value(4),
        categories: value(5),
        sentiment: value(6),
    }
}

/// Pull `"name": value` out of broken JSON, scanning to the next comma
/// or closing brace.
fn extract_field(payload: &str, name: &str) -> Option<String> {
    let marker = format!("\"{}\":", name);
    let start = payload.find(&marker)?;
    let rest = &payload[start..];
    let end = rest.find(',').or_else(|| rest.find('}'))?;
    let fragment = &rest[..end];

    let value = fragment.split(':').nth(1)?;
    Some(value.trim().trim_matches('"').to_string())
}

/// Format evidence snippets for the verdict prompt.
pub fn format_evidence(results: &[EvidenceResult]) -> String {
    if results.is_empty() {
        return "No relevant web results found.".to_string();
    }
    results
        .iter()
        .map(|result| format!("- {}: {}", result.title, result.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Map a sentiment score in [-1, 1] to a percentage.
pub fn sentiment_to_percentage(sentiment: f32) -> f32 {
    (sentiment + 1.0) / 2.0 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_clean_json() {
        let raw = r#"{"Verification": "VERIFIED", "Confidence": "HIGH", "Explanation": "Matches official data.", "Bias": "None detected", "Sources": "example.com", "Categories": "economy", "Sentiment": "neutral"}"#;
        let record = parse_verdict(raw);

        assert_eq!(record.verification, Verification::Verified);
        assert_eq!(record.confidence, Confidence::High);
        assert_eq!(record.explanation, "Matches official data.");
        assert_eq!(record.bias, "None detected");
        assert_eq!(record.sources, "example.com");
    }

    #[test]
    fn test_parses_fenced_json() {
        let raw = "```json\n{\"Verification\": \"NOT VERIFIED\", \"Confidence\": \"LOW\", \"Explanation\": \"No support found.\"}\n```";
        let record = parse_verdict(raw);

        assert_eq!(record.verification, Verification::NotVerified);
        assert_eq!(record.confidence, Confidence::Low);
        assert_eq!(record.explanation, "No support found.");
    }

    #[test]
    fn test_missing_fields_become_not_available() {
        let raw = r#"{"Verification": "PARTIALLY VERIFIED", "Explanation": "Half right."}"#;
        let record = parse_verdict(raw);

        assert_eq!(record.verification, Verification::PartiallyVerified);
        assert_eq!(record.confidence, Confidence::NotAvailable);
        assert_eq!(record.bias, NOT_AVAILABLE);
        assert_eq!(record.sources, NOT_AVAILABLE);
        assert_eq!(record.categories, NOT_AVAILABLE);
        assert_eq!(record.sentiment, NOT_AVAILABLE);
    }

    #[test]
    fn test_non_string_values_are_echoed() {
        let raw = r#"{"Verification": "VERIFIED", "Sentiment": 0.3}"#;
        let record = parse_verdict(raw);

        assert_eq!(record.sentiment, "0.3");
    }

    #[test]
    fn test_unknown_labels_map_to_error_and_not_available() {
        let raw = r#"{"Verification": "MOSTLY TRUE", "Confidence": "VERY HIGH"}"#;
        let record = parse_verdict(raw);

        assert_eq!(record.verification, Verification::Error);
        assert_eq!(record.confidence, Confidence::NotAvailable);
    }

    #[test]
    fn test_labels_are_case_insensitive() {
        assert_eq!(Verification::from_wire("verified"), Verification::Verified);
        assert_eq!(
            Verification::from_wire(" partially verified "),
            Verification::PartiallyVerified
        );
        assert_eq!(Confidence::from_wire("medium"), Confidence::Medium);
    }

    #[test]
    fn test_salvages_fields_from_broken_json() {
        let raw = r#"{"Verification": "VERIFIED", "Confidence": "HIGH", "Explanation": "Checks out" oops"#;
        let record = parse_verdict(raw);

        assert_eq!(record.verification, Verification::Verified);
        assert_eq!(record.confidence, Confidence::High);
        // The explanation has no trailing delimiter, so it is lost.
        assert_eq!(record.explanation, NOT_AVAILABLE);
    }

    #[test]
    fn test_conversational_reply_yields_error_record() {
        let record = parse_verdict("I am unable to verify this claim right now.");

        assert_eq!(record.verification, Verification::Error);
        assert_eq!(record.confidence, Confidence::NotAvailable);
        assert_eq!(record.bias, NOT_AVAILABLE);
        assert!(record.explanation.contains(PARSE_FAILURE));
    }

    #[test]
    fn test_error_record_carries_explanation() {
        let record = VerdictRecord::error("upstream call failed");
        assert_eq!(record.verification, Verification::Error);
        assert_eq!(record.explanation, "upstream call failed");
        assert_eq!(record.sentiment, NOT_AVAILABLE);
    }

    #[test]
    fn test_formats_evidence_lines() {
        let results = vec![
            EvidenceResult {
                title: "A".to_string(),
                snippet: "first".to_string(),
                link: "https://a".to_string(),
            },
            EvidenceResult {
                title: "B".to_string(),
                snippet: "second".to_string(),
                link: "https://b".to_string(),
            },
        ];

        assert_eq!(format_evidence(&results), "- A: first\n- B: second");
        assert_eq!(format_evidence(&[]), "No relevant web results found.");
    }

    #[test]
    fn test_sentiment_percentage_spans_range() {
        assert!((sentiment_to_percentage(-1.0) - 0.0).abs() < f32::EPSILON);
        assert!((sentiment_to_percentage(0.0) - 50.0).abs() < f32::EPSILON);
        assert!((sentiment_to_percentage(1.0) - 100.0).abs() < f32::EPSILON);
    }
}
