use std::time::Instant;

use rusqlite::Connection;

use super::docx::DocxExtractor;
use super::format::DocumentFormat;
use super::key_values::extract_key_values;
use super::pdf::PdfTextExtractor;
use super::store::ExtractionStore;
use super::types::FormatExtractor;
use super::xlsx::XlsxExtractor;
use super::ExtractionError;
use crate::db::DatabaseError;
use crate::models::{DocumentDescriptor, ExtractionPayload, ExtractionRecord, TenantId};
use crate::storage::ByteSource;

/// Runs one extraction attempt per call: fetch, dispatch, parse, key-value
/// heuristic, record.
///
/// Holds no mutable state, so one service can serve many threads at once.
/// Uses trait objects for the byte source and each format, enabling
/// dependency injection.
pub struct ExtractionService {
    source: Box<dyn ByteSource>,
    pdf: Box<dyn FormatExtractor>,
    docx: Box<dyn FormatExtractor>,
    xlsx: Box<dyn FormatExtractor>,
}

impl ExtractionService {
    /// Service with the built-in PDF, DOCX and XLSX extractors.
    pub fn new(source: Box<dyn ByteSource>) -> Self {
        Self {
            source,
            pdf: Box::new(PdfTextExtractor),
            docx: Box::new(DocxExtractor),
            xlsx: Box::new(XlsxExtractor),
        }
    }

    /// Replace the extractor for `extractor.format()`.
    pub fn with_extractor(mut self, extractor: Box<dyn FormatExtractor>) -> Self {
        match extractor.format() {
            DocumentFormat::Pdf => self.pdf = extractor,
            DocumentFormat::Docx => self.docx = extractor,
            DocumentFormat::Xlsx => self.xlsx = extractor,
        }
        self
    }

    fn extractor_for(&self, format: DocumentFormat) -> &dyn FormatExtractor {
        match format {
            DocumentFormat::Pdf => self.pdf.as_ref(),
            DocumentFormat::Docx => self.docx.as_ref(),
            DocumentFormat::Xlsx => self.xlsx.as_ref(),
        }
    }

    /// Run one attempt. Never fails: every input or content fault becomes a
    /// FAILED record carrying the fault's message.
    pub fn extract(&self, document: &DocumentDescriptor) -> ExtractionRecord {
        let started = Instant::now();
        let record = ExtractionRecord::pending(document.document_id);

        tracing::info!(
            document_id = %document.document_id,
            content_type = %document.content_type,
            "Starting extraction"
        );

        match self.run(document) {
            Ok(payload) => {
                tracing::info!(
                    document_id = %document.document_id,
                    characters = payload.character_count,
                    tables = payload.table_count,
                    pages = payload.page_count,
                    sheets = payload.sheet_count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Extraction complete"
                );
                record.succeed(payload)
            }
            Err(e) => {
                tracing::warn!(
                    document_id = %document.document_id,
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Extraction failed"
                );
                record.fail(e.to_string())
            }
        }
    }

    /// Run one attempt and persist its record, success or failure.
    ///
    /// Only the store can make this return `Err`.
    pub fn extract_and_store(
        &self,
        conn: &Connection,
        store: &dyn ExtractionStore,
        tenant: &TenantId,
        document: &DocumentDescriptor,
    ) -> Result<ExtractionRecord, DatabaseError> {
        let record = self.extract(document);
        store.save(conn, tenant, &record)
    }

    fn run(&self, document: &DocumentDescriptor) -> Result<ExtractionPayload, ExtractionError> {
        // Routing happens before any bytes are fetched.
        let format = DocumentFormat::from_content_type(&document.content_type)?;
        let bytes = self.source.fetch(&document.storage_locator)?;

        let result = self.extractor_for(format).extract(&bytes)?;
        let key_values = extract_key_values(&result.full_text);

        tracing::debug!(
            document_id = %document.document_id,
            format = format.as_str(),
            bytes = bytes.len(),
            key_values = key_values.len(),
            "Parsed document"
        );

        Ok(ExtractionPayload {
            tables: serde_json::to_value(&result.tables)?,
            key_values: serde_json::to_value(&key_values)?,
            page_count: to_count(result.page_count),
            sheet_count: to_count(result.sheet_count),
            character_count: to_count(result.character_count),
            table_count: to_count(result.table_count()),
            extracted_text: result.full_text,
        })
    }
}

fn to_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
