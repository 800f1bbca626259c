use serde::{Deserialize, Serialize};

use super::format::DocumentFormat;
use super::ExtractionError;

/// A grid of string cells. Sheet name for spreadsheets, "Table N" otherwise.
///
/// Rows need not be rectangular.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// A colon-delimited pair found by the key-value heuristic. Both sides trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// What every format extractor hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub full_text: String,
    pub tables: Vec<ExtractedTable>,
    /// PDF only, else 0.
    pub page_count: usize,
    /// XLSX only, else 0.
    pub sheet_count: usize,
    pub character_count: usize,
}

impl ExtractionResult {
    /// Build a result; the character count is derived from `full_text`.
    pub fn new(
        full_text: String,
        tables: Vec<ExtractedTable>,
        page_count: usize,
        sheet_count: usize,
    ) -> Self {
        let character_count = full_text.chars().count();
        Self {
            full_text,
            tables,
            page_count,
            sheet_count,
            character_count,
        }
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

/// One parser per supported binary format.
///
/// Implementations are pure functions of the input bytes and either return a
/// complete result or fail the whole call.
pub trait FormatExtractor: Send + Sync {
    fn format(&self) -> DocumentFormat;

    fn extract(&self, bytes: &[u8]) -> Result<ExtractionResult, ExtractionError>;
}
