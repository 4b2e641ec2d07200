// src/pipeline.rs
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::extractors::{
    ExtractionOutcome, FieldExtraction, FieldExtractor, FieldSchema, ScenarioExtraction,
    ScenarioExtractor,
};
use crate::llm::CompletionService;
use crate::pdf::{DocumentReader, ReadDocument};
use crate::utils::AppError;

/// Key under which the scenario mapping is nested in the record.
pub const SCENARIOS_KEY: &str = "Performance Scenarios at Maturity (%)";

/// The merged record for one document.
///
/// Serializes to the field mapping plus the nested scenario mapping. The
/// per-extractor outcomes travel alongside but are not part of the record.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    fields: Map<String, Value>,
    scenarios: Map<String, Value>,
    pub field_outcome: ExtractionOutcome,
    pub scenario_outcome: ExtractionOutcome,
}

impl ExtractionResult {
    pub fn merge(fields: FieldExtraction, scenarios: ScenarioExtraction) -> Self {
        Self {
            fields: fields.fields,
            scenarios: scenarios.scenarios,
            field_outcome: fields.outcome,
            scenario_outcome: scenarios.outcome,
        }
    }

    /// Value of a field, `None` when the model did not return it (or returned null).
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    #[allow(dead_code)]
    pub fn scenarios(&self) -> &Map<String, Value> {
        &self.scenarios
    }

    pub fn scenario(&self, name: &str) -> Option<&Value> {
        self.scenarios.get(name).filter(|v| !v.is_null())
    }

    /// True when either model answer had to be discarded.
    pub fn is_degraded(&self) -> bool {
        self.field_outcome.is_degraded() || self.scenario_outcome.is_degraded()
    }

    /// The record: a copy of the field mapping with the scenario mapping added.
    pub fn to_value(&self) -> Value {
        let mut record = self.fields.clone();
        record.insert(SCENARIOS_KEY.to_string(), Value::Object(self.scenarios.clone()));
        Value::Object(record)
    }

    /// The record restricted to exactly the schema keys (missing ones `null`) plus the scenarios.
    pub fn normalized(&self, schema: &FieldSchema) -> Value {
        let mut record: Map<String, Value> = schema
            .names()
            .iter()
            .map(|name| (name.clone(), self.field(name).cloned().unwrap_or(Value::Null)))
            .collect();
        record.insert(SCENARIOS_KEY.to_string(), Value::Object(self.scenarios.clone()));
        Value::Object(record)
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Reads a PDF and runs both extractors over it, one call after the other.
pub struct ExtractionPipeline {
    reader: DocumentReader,
    field_extractor: FieldExtractor,
    scenario_extractor: ScenarioExtractor,
    schema: FieldSchema,
}

impl ExtractionPipeline {
    pub fn new(service: Arc<dyn CompletionService>, model: &str, target_language: &str) -> Self {
        Self {
            reader: DocumentReader::new(),
            field_extractor: FieldExtractor::new(service.clone(), model, target_language),
            scenario_extractor: ScenarioExtractor::new(service, model),
            schema: FieldSchema::kid(),
        }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn read(&self, pdf_bytes: &[u8]) -> Result<ReadDocument, AppError> {
        Ok(self.reader.read(pdf_bytes)?)
    }

    /// Runs the field and scenario extractors over an already read document.
    pub async fn extract_from(&self, document: &ReadDocument) -> Result<ExtractionResult, AppError> {
        let fields = self.field_extractor.extract_fields(&document.text, &self.schema).await?;
        let scenarios = self.scenario_extractor.extract_scenarios(&document.tables).await?;

        let result = ExtractionResult::merge(fields, scenarios);
        if result.is_degraded() {
            tracing::warn!(
                "Extraction degraded: fields {:?}, scenarios {:?}",
                result.field_outcome,
                result.scenario_outcome
            );
        }
        Ok(result)
    }

    /// Read → extract fields → extract scenarios → merge.
    pub async fn extract_details(&self, pdf_bytes: &[u8]) -> Result<ExtractionResult, AppError> {
        let document = self.read(pdf_bytes)?;
        self.extract_from(&document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::testing::ScriptedCompletions;
    use crate::pdf::testing::{build_pdf, Placed};
    use serde_json::json;

    fn kid_page() -> Vec<u8> {
        build_pdf(&[vec![
            Placed::new(72, 760, "ISIN: IT0001234567, SRI 3/7"),
            Placed::new(72, 700, "Scenario"),
            Placed::new(300, 700, "At Maturity"),
            Placed::new(72, 680, "Stress"),
            Placed::new(300, 680, "-5%"),
            Placed::new(72, 660, "Moderato"),
            Placed::new(300, 660, "2%"),
        ]])
    }

    fn pipeline(service: &Arc<ScriptedCompletions>) -> ExtractionPipeline {
        ExtractionPipeline::new(service.clone(), "gpt-4", "ENGLISH")
    }

    #[tokio::test]
    async fn test_end_to_end_single_page() {
        let service = Arc::new(ScriptedCompletions::new(&[
            r#"{"ISIN":"IT0001234567","SRI":"3"}"#,
            r#"{"Stress":"-5%","Moderato":"2%"}"#,
        ]));

        let result = pipeline(&service).extract_details(&kid_page()).await.unwrap();

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "ISIN": "IT0001234567",
                "SRI": "3",
                "Performance Scenarios at Maturity (%)": {"Stress": "-5%", "Moderato": "2%"}
            })
        );
        assert!(!result.is_degraded());

        let requests = service.requests();
        assert_eq!(requests.len(), 2, "Two sequential model calls");
        assert!(requests[0].messages[0].content.contains("ISIN: IT0001234567"));
        assert!(requests[1].messages[0].content.contains(r#"["Scenario","At Maturity"]"#));
    }

    #[tokio::test]
    async fn test_scenario_key_survives_double_parse_failure() {
        let service = Arc::new(ScriptedCompletions::new(&["Sorry, I cannot help.", "```oops"]));

        let result = pipeline(&service).extract_details(&kid_page()).await.unwrap();

        assert_eq!(result.to_value(), json!({ "Performance Scenarios at Maturity (%)": {} }));
        assert!(result.is_degraded());
        assert!(result.field_outcome.is_degraded());
        assert!(result.scenario_outcome.is_degraded());
    }

    #[test]
    fn test_document_without_tables_makes_one_call() {
        let service = Arc::new(ScriptedCompletions::new(&[r#"{"RHP":"5 years"}"#]));
        let pdf = build_pdf(&[vec![Placed::new(72, 760, "Recommended holding period: 5 years")]]);

        let result = tokio_test::block_on(pipeline(&service).extract_details(&pdf)).unwrap();

        assert_eq!(service.requests().len(), 1);
        assert_eq!(result.scenario_outcome, ExtractionOutcome::NoInput);
        assert_eq!(result.field("RHP"), Some(&json!("5 years")));
        assert_eq!(result.scenarios(), &Map::new());
    }

    #[test]
    fn test_unreadable_pdf_is_fatal() {
        let service = Arc::new(ScriptedCompletions::new(&[]));
        let err = tokio_test::block_on(pipeline(&service).extract_details(b"not a pdf at all")).unwrap_err();

        assert!(matches!(err, AppError::Pdf(_)));
        assert!(service.requests().is_empty(), "Model is never called for an unreadable file");
    }

    #[test]
    fn test_service_failure_is_fatal() {
        // Script runs dry on the first call.
        let service = Arc::new(ScriptedCompletions::new(&[]));
        let err = tokio_test::block_on(pipeline(&service).extract_details(&kid_page())).unwrap_err();
        assert!(matches!(err, AppError::Completion(_)));
    }

    #[test]
    fn test_normalized_has_exactly_schema_keys() {
        let fields = FieldExtraction {
            fields: json!({"ISIN": "IT0001", "Currency": "EUR", "SRI": null})
                .as_object()
                .cloned()
                .unwrap(),
            outcome: ExtractionOutcome::Parsed,
        };
        let scenarios = ScenarioExtraction { scenarios: Map::new(), outcome: ExtractionOutcome::NoInput };
        let result = ExtractionResult::merge(fields, scenarios);

        let normalized = result.normalized(&FieldSchema::kid());
        let keys: Vec<&String> = normalized.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 7);
        assert_eq!(normalized["ISIN"], "IT0001");
        assert!(normalized["TARGET MARKET"].is_null());
        assert!(normalized.get("Currency").is_none());
        assert_eq!(result.field("SRI"), None, "Null counts as absent");
    }
}
