// src/extractors/response.rs
//! Turning model output into a JSON object.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::extractors::ExtractionOutcome;

// Matches a whole response wrapped in a Markdown code fence, with or without a language tag.
static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*\n?(.*?)\n?\s*```$")
        .expect("Failed to compile CODE_FENCE_RE")
});

/// Removes a surrounding code fence the model may add despite instructions.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    CODE_FENCE_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed)
}

/// Parses model output as a JSON object.
///
/// Anything else degrades to an empty mapping with one warning; the caller
/// never sees an error.
pub fn parse_object(content: &str, label: &str) -> (Map<String, Value>, ExtractionOutcome) {
    let cleaned = strip_code_fence(content);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(map)) => (map, ExtractionOutcome::Parsed),
        Ok(other) => {
            let kind = match other {
                Value::Null => "null",
                Value::Bool(_) => "boolean",
                Value::Number(_) => "number",
                Value::String(_) => "string",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
            };
            tracing::warn!("JSON Parsing Error: {} response is a JSON {}, not an object.", label, kind);
            (Map::new(), ExtractionOutcome::Degraded { reason: format!("response is a JSON {}", kind) })
        }
        Err(e) => {
            tracing::warn!("JSON Parsing Error: Invalid JSON {} response from the model: {}", label, e);
            (Map::new(), ExtractionOutcome::Degraded { reason: e.to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_fence_with_language_tag() {
        let content = "```json\n{\"ISIN\": \"IT0001\"}\n```";
        assert_eq!(strip_code_fence(content), "{\"ISIN\": \"IT0001\"}");
    }

    #[test]
    fn test_leaves_plain_json_alone() {
        assert_eq!(strip_code_fence("  {\"SRI\": 3}\n"), "{\"SRI\": 3}");
    }

    #[test]
    fn test_not_json_degrades() {
        let (map, outcome) = parse_object("not json", "field");
        assert!(map.is_empty());
        assert!(outcome.is_degraded());
    }

    #[test]
    fn test_non_object_json_degrades() {
        let (map, outcome) = parse_object("[\"Stress\", \"-5%\"]", "scenario");
        assert!(map.is_empty());
        assert_eq!(
            outcome,
            ExtractionOutcome::Degraded { reason: "response is a JSON array".to_string() }
        );
    }

    #[test]
    fn test_fenced_object_parses() {
        let (map, outcome) = parse_object("```\n{\"Stress\": \"-5%\"}\n```", "scenario");
        assert_eq!(outcome, ExtractionOutcome::Parsed);
        assert_eq!(map["Stress"], "-5%");
    }
}
