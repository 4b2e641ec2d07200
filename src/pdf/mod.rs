// src/pdf/mod.rs
pub mod layout;
pub mod reader;

#[cfg(test)]
pub mod testing;

use serde::Serialize;

// Re-export key reader types for convenience
pub use reader::DocumentReader;

/// One table detected on a page. Cells that have no content are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedTable {
    pub page: u32,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ExtractedTable {
    #[allow(dead_code)]
    pub fn cell_count(&self) -> usize {
        self.rows.iter().flatten().filter(|c| c.is_some()).count()
    }
}

/// Everything the extractors need from one PDF, read in a single pass.
#[derive(Debug, Clone, Default)]
pub struct ReadDocument {
    pub page_count: usize,
    pub text: String,
    pub tables: Vec<ExtractedTable>,
}
