// src/pdf/reader.rs

// --- Imports ---
use crate::pdf::layout::{self, FontEncodings};
use crate::pdf::{ExtractedTable, ReadDocument};
use crate::utils::error::PdfError;
use lopdf::content::Content;
use lopdf::{Document, ObjectId};

/// Reads plain text and tables out of PDF bytes.
///
/// Page-level misses (no text, no table, undecodable content) are skipped
/// silently; only a document that cannot be loaded at all is an error.
pub struct DocumentReader;

impl DocumentReader {
    pub fn new() -> Self { Self {} }

    /// Text of every text-bearing page, in page order, each followed by a newline.
    #[allow(dead_code)]
    pub fn read_text(&self, pdf_bytes: &[u8]) -> Result<String, PdfError> {
        let document = self.load(pdf_bytes)?;
        Ok(self.extract_text(&document))
    }

    /// The primary table of every page that has one, in page order.
    #[allow(dead_code)]
    pub fn read_tables(&self, pdf_bytes: &[u8]) -> Result<Vec<ExtractedTable>, PdfError> {
        let document = self.load(pdf_bytes)?;
        Ok(self.extract_tables(&document))
    }

    /// Loads the document once and reads both text and tables.
    pub fn read(&self, pdf_bytes: &[u8]) -> Result<ReadDocument, PdfError> {
        let document = self.load(pdf_bytes)?;
        let page_count = document.get_pages().len();
        let text = self.extract_text(&document);
        let tables = self.extract_tables(&document);

        tracing::info!(
            "Read PDF: {} pages, {} chars of text, {} tables",
            page_count,
            text.len(),
            tables.len()
        );
        Ok(ReadDocument { page_count, text, tables })
    }

    fn load(&self, pdf_bytes: &[u8]) -> Result<Document, PdfError> {
        tracing::debug!("Loading PDF ({} bytes)", pdf_bytes.len());
        Document::load_mem(pdf_bytes).map_err(|e| PdfError::Load(e.to_string()))
    }

    fn extract_text(&self, document: &Document) -> String {
        let pages = document.get_pages().into_iter().map(|(page_number, _)| {
            match document.extract_text(&[page_number]) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::debug!("No text extracted from page {}: {}", page_number, e);
                    None
                }
            }
        });
        join_page_text(pages)
    }

    fn extract_tables(&self, document: &Document) -> Vec<ExtractedTable> {
        document
            .get_pages()
            .into_iter()
            .filter_map(|(page_number, page_id)| {
                let rows = self.page_table(document, page_number, page_id)?;
                tracing::debug!("Detected table on page {} ({} rows)", page_number, rows.len());
                Some(ExtractedTable { page: page_number, rows })
            })
            .collect()
    }

    fn page_table(
        &self,
        document: &Document,
        page_number: u32,
        page_id: ObjectId,
    ) -> Option<Vec<Vec<Option<String>>>> {
        let content = document
            .get_page_content(page_id)
            .and_then(|data| Content::decode(&data));
        // Same font lookup lopdf uses for the page text.
        let encodings: FontEncodings = document
            .get_page_fonts(page_id)
            .into_iter()
            .map(|(name, font)| (name, font.get_font_encoding().to_string()))
            .collect();
        match content {
            Ok(content) => layout::detect_table(&layout::collect_fragments(&content.operations, &encodings)),
            Err(e) => {
                tracing::debug!("Could not decode content of page {}: {}", page_number, e);
                None
            }
        }
    }
}

/// Joins per-page text in order. Pages with no text (or only whitespace) add nothing.
///
/// Whitespace-only pages are dropped too, where a plain emptiness check would
/// keep them as blank lines in the prompt.
pub fn join_page_text<I>(pages: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut full_text = String::new();
    for text in pages.into_iter().flatten() {
        let text = text.trim_end_matches(['\r', '\n']);
        if text.trim().is_empty() {
            continue;
        }
        full_text.push_str(text);
        full_text.push('\n');
    }
    full_text
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::{build_pdf, build_pdf_with_encoding, Placed};

    #[test]
    fn test_join_keeps_page_order_and_skips_empty_pages() {
        let pages = vec![
            Some("Page one".to_string()),
            None,
            Some("   \n".to_string()),
            Some("Page four\n".to_string()),
        ];
        assert_eq!(join_page_text(pages), "Page one\nPage four\n");
    }

    #[test]
    fn test_join_of_no_text_is_empty() {
        assert_eq!(join_page_text(vec![None, Some(String::new())]), "");
        assert_eq!(join_page_text(Vec::new()), "");
    }

    #[test]
    fn test_read_text_from_generated_pdf() {
        let pdf = build_pdf(&[
            vec![Placed::new(72, 760, "ISIN: IT0001234567, SRI 3/7")],
            vec![],
            vec![Placed::new(72, 760, "Recommended holding period: 5 years")],
        ]);

        let text = DocumentReader::new().read_text(&pdf).expect("generated PDF should load");
        let first = text.find("ISIN: IT0001234567, SRI 3/7").expect("page 1 text missing");
        let third = text.find("Recommended holding period").expect("page 3 text missing");
        assert!(first < third, "Pages should appear in order");
        assert!(text.ends_with('\n'));
        assert!(!text.contains("\n\n"), "Empty page should not add a blank line");
    }

    #[test]
    fn test_pdf_without_text_or_tables() {
        let pdf = build_pdf(&[vec![], vec![]]);
        let reader = DocumentReader::new();

        assert_eq!(reader.read_text(&pdf).unwrap(), "");
        assert!(reader.read_tables(&pdf).unwrap().is_empty());
    }

    #[test]
    fn test_read_tables_from_generated_pdf() {
        let pdf = build_pdf(&[
            vec![Placed::new(72, 760, "Purpose of this document")],
            vec![
                Placed::new(72, 760, "ISIN: IT0001234567, SRI 3/7"),
                Placed::new(72, 700, "Scenario"),
                Placed::new(300, 700, "At Maturity"),
                Placed::new(72, 680, "Stress"),
                Placed::new(300, 680, "-5%"),
                Placed::new(72, 660, "Moderato"),
                Placed::new(300, 660, "2%"),
            ],
        ]);

        let document = DocumentReader::new().read(&pdf).unwrap();
        assert_eq!(document.page_count, 2);
        assert_eq!(document.tables.len(), 1, "Only page 2 has a table");

        let table = &document.tables[0];
        assert_eq!(table.page, 2);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1], vec![Some("Stress".to_string()), Some("-5%".to_string())]);
        assert_eq!(table.cell_count(), 6);
    }

    #[test]
    fn test_table_cells_decode_like_page_text() {
        let pdf = build_pdf_with_encoding(
            &[vec![
                Placed::new(72, 700, "Scenario"),
                Placed::new(300, 700, "Investment"),
                Placed::new(72, 680, "Stress"),
                Placed::raw(300, 680, b"\x80 8.500"),
            ]],
            Some("WinAnsiEncoding"),
        );

        let document = DocumentReader::new().read(&pdf).unwrap();
        assert!(document.text.contains("€ 8.500"));
        assert_eq!(document.tables.len(), 1);
        assert_eq!(
            document.tables[0].rows[1],
            vec![Some("Stress".to_string()), Some("€ 8.500".to_string())]
        );
    }

    #[test]
    fn test_garbage_bytes_fail_to_load() {
        let err = DocumentReader::new().read(b"this is not a pdf").unwrap_err();
        assert!(matches!(err, PdfError::Load(_)));
    }
}
