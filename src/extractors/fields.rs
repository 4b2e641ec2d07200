// src/extractors/fields.rs

// --- Imports ---
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::extractors::{response, ExtractionOutcome, EXTRACTION_TEMPERATURE};
use crate::llm::{ChatMessage, CompletionRequest, CompletionService};
use crate::utils::error::CompletionError;

/// Field names of a Key Information Document, in display order.
pub const KID_FIELDS: [&str; 6] = ["ISIN", "SRI", "RHP", "PRODUCT NAME", "ISSUER NAME", "TARGET MARKET"];

/// The fields the model is asked to populate.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    names: Vec<String>,
}

impl FieldSchema {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    /// The fixed KID schema.
    pub fn kid() -> Self {
        Self::new(KID_FIELDS)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Renders the schema as a JSON object with every value `null`, keeping field order.
    pub fn render(&self) -> String {
        let entries: Vec<String> = self
            .names
            .iter()
            .map(|name| format!("{}: null", Value::String(name.clone())))
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::kid()
    }
}

/// Result of one field extraction call.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExtraction {
    pub fields: Map<String, Value>,
    pub outcome: ExtractionOutcome,
}

/// Asks the model to pull the schema's fields out of free text.
pub struct FieldExtractor {
    service: Arc<dyn CompletionService>,
    model: String,
    target_language: String,
}

impl FieldExtractor {
    pub fn new(service: Arc<dyn CompletionService>, model: &str, target_language: &str) -> Self {
        Self {
            service,
            model: model.to_string(),
            target_language: target_language.to_string(),
        }
    }

    pub fn build_prompt(&self, text: &str, schema: &FieldSchema) -> String {
        format!(
            "Extract the following information from the given text. Translate it to {language}.\n\
             Respond ONLY with a JSON object.\n\
             \n\
             Fields:\n\
             {fields}\n\
             \n\
             Text:\n\
             {text}\n",
            language = self.target_language,
            fields = schema.render(),
            text = text,
        )
    }

    /// Extracts fields from `text`.
    ///
    /// Model output that is not a JSON object yields an empty mapping; keys are
    /// passed through without checking them against the schema. Only failures
    /// of the completion service itself are returned as errors.
    pub async fn extract_fields(
        &self,
        text: &str,
        schema: &FieldSchema,
    ) -> Result<FieldExtraction, CompletionError> {
        tracing::info!("Extracting {} fields from {} chars of text", schema.names().len(), text.len());

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(self.build_prompt(text, schema))],
            temperature: EXTRACTION_TEMPERATURE,
        };
        let content = self.service.complete(&request).await?;

        let (fields, outcome) = response::parse_object(&content, "field");
        tracing::info!("Field extraction returned {} keys ({:?})", fields.len(), outcome);
        Ok(FieldExtraction { fields, outcome })
    }
}
