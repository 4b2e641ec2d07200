// src/storage/mod.rs
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::extractors::ExtractionOutcome;
use crate::pdf::ReadDocument;
use crate::utils::error::StorageError;

/// Describes how a record was produced; written next to the record.
#[derive(Debug, Serialize)]
pub struct ExportMetadata<'a> {
    pub source_file: &'a str,
    pub model: &'a str,
    pub target_language: &'a str,
    pub page_count: usize,
    pub table_count: usize,
    pub field_outcome: &'a ExtractionOutcome,
    pub scenario_outcome: &'a ExtractionOutcome,
    pub extraction_timestamp: String,
}

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    fn write_json<T: Serialize>(&self, filename: &str, value: &T) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(filename);
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, json).map_err(StorageError::IoError)?;
        Ok(file_path)
    }

    /// Saves the extracted record as `<stem>_kid.json`
    pub fn save_result(&self, stem: &str, record: &Value) -> Result<PathBuf, StorageError> {
        let file_path = self.write_json(&format!("{}_kid.json", stem), record)?;
        tracing::info!("Saved record to {}", file_path.display());
        Ok(file_path)
    }

    /// Saves metadata about the extraction as `<stem>_kid_meta.json`
    pub fn save_metadata(&self, stem: &str, metadata: &ExportMetadata) -> Result<PathBuf, StorageError> {
        let file_path = self.write_json(&format!("{}_kid_meta.json", stem), metadata)?;
        tracing::info!("Saved metadata to {}", file_path.display());
        Ok(file_path)
    }

    /// Saves what the model was shown: the text and the detected tables.
    pub fn save_debug(&self, stem: &str, document: &ReadDocument) -> Result<Vec<PathBuf>, StorageError> {
        let text_path = self.base_dir.join(format!("{}_text.txt", stem));
        fs::write(&text_path, &document.text).map_err(StorageError::IoError)?;
        let tables_path = self.write_json(&format!("{}_tables.json", stem), &document.tables)?;

        tracing::info!("Saved debug dump to {} and {}", text_path.display(), tables_path.display());
        Ok(vec![text_path, tables_path])
    }
}

/// Timestamp for export metadata.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339()
}
