pub mod types;
pub mod format;
pub mod ooxml;
pub mod formula;
pub mod pdf;
pub mod docx;
pub mod xlsx;
pub mod key_values;
pub mod store;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use types::*;
pub use format::*;
pub use pdf::*;
pub use docx::*;
pub use xlsx::*;
pub use key_values::*;
pub use store::*;
pub use orchestrator::*;

use thiserror::Error;

use crate::storage::StorageError;

/// Every way an extraction attempt can fail.
///
/// The `Display` text becomes the record's `errorMessage`.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported content type: {0}")]
    UnsupportedFormat(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] StorageError),

    #[error("Malformed {format} document: {reason}")]
    MalformedDocument {
        format: DocumentFormat,
        reason: String,
    },

    #[error("Failed to serialize extraction output: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExtractionError {
    pub fn malformed(format: DocumentFormat, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            format,
            reason: reason.into(),
        }
    }
}
