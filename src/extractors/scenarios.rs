// src/extractors/scenarios.rs
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::extractors::{response, ExtractionOutcome, EXTRACTION_TEMPERATURE};
use crate::llm::{ChatMessage, CompletionRequest, CompletionService};
use crate::pdf::ExtractedTable;
use crate::utils::error::CompletionError;

/// Result of one scenario extraction call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioExtraction {
    pub scenarios: Map<String, Value>,
    pub outcome: ExtractionOutcome,
}

/// Asks the model for the performance scenarios at maturity found in table data.
pub struct ScenarioExtractor {
    service: Arc<dyn CompletionService>,
    model: String,
}

/// Renders tables as labelled JSON row arrays, one block per table.
pub fn render_tables(tables: &[ExtractedTable]) -> String {
    tables
        .iter()
        .enumerate()
        .map(|(i, table)| {
            let rows = serde_json::to_string(&table.rows).unwrap_or_default();
            format!("Table {} (page {}):\n{}\n", i + 1, table.page, rows)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl ScenarioExtractor {
    pub fn new(service: Arc<dyn CompletionService>, model: &str) -> Self {
        Self { service, model: model.to_string() }
    }

    pub fn build_prompt(&self, tables: &[ExtractedTable]) -> String {
        format!(
            "Extract all performance scenarios just at maturity (at the end of the Recommended Holding Period) \
             in percentage from the given table.\n\
             Respond ONLY with a JSON object.\n\
             \n\
             Table:\n\
             {}",
            render_tables(tables)
        )
    }

    /// Extracts scenario percentages from every table in one call.
    ///
    /// Without tables the model is not called. Same degradation policy as
    /// the field extractor.
    pub async fn extract_scenarios(
        &self,
        tables: &[ExtractedTable],
    ) -> Result<ScenarioExtraction, CompletionError> {
        if tables.is_empty() {
            tracing::info!("No tables found; skipping scenario extraction");
            return Ok(ScenarioExtraction { scenarios: Map::new(), outcome: ExtractionOutcome::NoInput });
        }

        tracing::info!("Extracting performance scenarios from {} tables", tables.len());
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(self.build_prompt(tables))],
            temperature: EXTRACTION_TEMPERATURE,
        };
        let content = self.service.complete(&request).await?;

        let (scenarios, outcome) = response::parse_object(&content, "scenario");
        tracing::info!("Scenario extraction returned {} keys ({:?})", scenarios.len(), outcome);
        Ok(ScenarioExtraction { scenarios, outcome })
    }
}
