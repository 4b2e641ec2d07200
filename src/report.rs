// src/report.rs
use serde_json::Value;

use crate::extractors::FieldSchema;
use crate::pipeline::ExtractionResult;

/// Scenario keys as the model is expected to return them, with display labels.
/// The keys mix English and Italian; they are kept verbatim for compatibility.
pub const SCENARIO_LABELS: [(&str, &str); 4] = [
    ("Stress", "Stress"),
    ("Sfavorevole", "Unfavorable"),
    ("Moderato", "Moderate"),
    ("Favorevole", "Favorable"),
];

const MISSING: &str = "n/a";

fn display_value(value: Option<&Value>) -> String {
    match value {
        None => MISSING.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Renders the record as labelled lines, one per field and scenario.
pub fn render_summary(result: &ExtractionResult, schema: &FieldSchema) -> String {
    let mut out = String::new();
    for name in schema.names() {
        out.push_str(&format!("{}: {}\n", name, display_value(result.field(name))));
    }

    out.push_str("PERFORMANCE SCENARIOS AT RHP:\n");
    for (key, label) in SCENARIO_LABELS {
        out.push_str(&format!("  {}: {}\n", label, display_value(result.scenario(key))));
    }

    if result.is_degraded() {
        out.push_str("Note: the model returned unusable output for part of this document.\n");
    }
    out
}
