use std::panic::{catch_unwind, AssertUnwindSafe};

use super::format::DocumentFormat;
use super::types::{ExtractionResult, FormatExtractor};
use super::ExtractionError;

/// PDF text extractor using the pdf-extract crate.
///
/// Handles digital PDFs with embedded text layers. Page count comes from the
/// page tree (lopdf); page texts are concatenated in page order. Tables are
/// never detected in PDFs, so `tables` is always empty.
pub struct PdfTextExtractor;

impl FormatExtractor for PdfTextExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractionResult, ExtractionError> {
        let page_count = page_count(bytes)?;
        let pages = page_texts(bytes)?;

        tracing::debug!(page_count, text_pages = pages.len(), "Decoded PDF");

        Ok(ExtractionResult::new(pages.concat(), Vec::new(), page_count, 0))
    }
}

fn page_count(bytes: &[u8]) -> Result<usize, ExtractionError> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| ExtractionError::malformed(DocumentFormat::Pdf, e.to_string()))?;
    Ok(document.get_pages().len())
}

/// pdf-extract panics on some malformed fonts and streams; a panic is a
/// malformed document, not a crashed worker.
fn page_texts(bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
    match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractionError::malformed(DocumentFormat::Pdf, e.to_string())),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "decoder panicked".to_string());
            tracing::warn!(reason = %reason, "PDF decoder panicked");
            Err(ExtractionError::malformed(
                DocumentFormat::Pdf,
                format!("decoder panicked: {reason}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::test_fixtures::pdf;

    #[test]
    fn extract_text_from_digital_pdf() {
        let result = PdfTextExtractor.extract(&pdf(&["Hello World from RFP"])).unwrap();

        assert_eq!(result.page_count, 1);
        assert!(
            result.full_text.contains("Hello") || result.full_text.contains("World"),
            "Expected text to contain 'Hello' or 'World', got: {}",
            result.full_text
        );
    }

    #[test]
    fn tables_always_empty() {
        let result = PdfTextExtractor.extract(&pdf(&["Plan Deductible Premium"])).unwrap();
        assert!(result.tables.is_empty());
        assert_eq!(result.sheet_count, 0);
    }

    #[test]
    fn multi_page_text_in_page_order() {
        let result = PdfTextExtractor
            .extract(&pdf(&["Alpha page", "Bravo page", "Charlie page"]))
            .unwrap();

        assert_eq!(result.page_count, 3);
        let alpha = result.full_text.find("Alpha").unwrap();
        let bravo = result.full_text.find("Bravo").unwrap();
        let charlie = result.full_text.find("Charlie").unwrap();
        assert!(alpha < bravo && bravo < charlie);
    }

    #[test]
    fn character_count_matches_text() {
        let result = PdfTextExtractor.extract(&pdf(&["Carrier: Aetna"])).unwrap();
        assert_eq!(result.character_count, result.full_text.chars().count());
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = PdfTextExtractor.extract(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedDocument { format: DocumentFormat::Pdf, .. }));
    }

    #[test]
    fn truncated_pdf_returns_error() {
        let bytes = pdf(&["Truncated"]);
        let result = PdfTextExtractor.extract(&bytes[..bytes.len() / 3]);
        assert!(result.is_err());
    }
}
