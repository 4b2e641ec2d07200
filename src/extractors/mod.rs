// src/extractors/mod.rs
pub mod fields;
pub mod response;
pub mod scenarios;

#[cfg(test)]
pub mod testing;

use serde::Serialize;

// Re-export key extraction types for convenience
pub use fields::{FieldExtraction, FieldExtractor, FieldSchema};
pub use scenarios::{ScenarioExtraction, ScenarioExtractor};

/// Sampling temperature for every extraction call.
pub const EXTRACTION_TEMPERATURE: f32 = 0.0;

/// How an extractor's mapping came to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    /// The model answered with a JSON object.
    Parsed,
    /// The model answered with something unusable; the mapping is empty.
    Degraded { reason: String },
    /// There was nothing to send to the model.
    NoInput,
}

impl ExtractionOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ExtractionOutcome::Degraded { .. })
    }
}
