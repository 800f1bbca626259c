use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::enums::ExtractionStatus;
use crate::pipeline::extraction::types::{ExtractedTable, KeyValuePair};

/// Identifier of the tenant an extraction belongs to.
///
/// Passed explicitly into every pipeline and store call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Tenant id must not be blank")]
pub struct InvalidTenantId;

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidTenantId> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(InvalidTenantId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The stored document an extraction attempt runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    pub document_id: Uuid,
    /// Declared MIME type from upload time.
    pub content_type: String,
    /// Opaque key handed to the byte source.
    pub storage_locator: String,
}

impl DocumentDescriptor {
    pub fn new(
        document_id: Uuid,
        content_type: impl Into<String>,
        storage_locator: impl Into<String>,
    ) -> Self {
        Self {
            document_id,
            content_type: content_type.into(),
            storage_locator: storage_locator.into(),
        }
    }
}

/// Everything a successful attempt copies into its record.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionPayload {
    pub extracted_text: String,
    pub tables: serde_json::Value,
    pub key_values: serde_json::Value,
    pub page_count: u32,
    pub sheet_count: u32,
    pub character_count: u32,
    pub table_count: u32,
}

/// Persisted outcome of one extraction attempt, one per document.
///
/// Data fields are populated iff `status` is `Success`; `error_message`
/// iff `status` is `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub status: ExtractionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_values: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionRecord {
    /// A fresh record for `document_id` in the `Pending` state.
    pub fn pending(document_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            status: ExtractionStatus::Pending,
            extracted_text: None,
            tables: None,
            key_values: None,
            page_count: None,
            sheet_count: None,
            character_count: None,
            table_count: None,
            error_message: None,
            extracted_at: Utc::now(),
        }
    }

    pub fn succeed(self, payload: ExtractionPayload) -> Self {
        Self {
            status: ExtractionStatus::Success,
            extracted_text: Some(payload.extracted_text),
            tables: Some(payload.tables),
            key_values: Some(payload.key_values),
            page_count: Some(payload.page_count),
            sheet_count: Some(payload.sheet_count),
            character_count: Some(payload.character_count),
            table_count: Some(payload.table_count),
            error_message: None,
            extracted_at: Utc::now(),
            ..self
        }
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        Self {
            status: ExtractionStatus::Failed,
            extracted_text: None,
            tables: None,
            key_values: None,
            page_count: None,
            sheet_count: None,
            character_count: None,
            table_count: None,
            error_message: Some(message.into()),
            extracted_at: Utc::now(),
            ..self
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExtractionStatus::Success
    }

    /// Whether the status/field invariant holds for this record.
    pub fn is_consistent(&self) -> bool {
        let data_present = self.extracted_text.is_some()
            && self.tables.is_some()
            && self.key_values.is_some()
            && self.page_count.is_some()
            && self.sheet_count.is_some()
            && self.character_count.is_some()
            && self.table_count.is_some();
        let data_absent = self.extracted_text.is_none()
            && self.tables.is_none()
            && self.key_values.is_none()
            && self.page_count.is_none()
            && self.sheet_count.is_none()
            && self.character_count.is_none()
            && self.table_count.is_none();

        match self.status {
            ExtractionStatus::Success => data_present && self.error_message.is_none(),
            ExtractionStatus::Failed => data_absent && self.error_message.is_some(),
            ExtractionStatus::Pending => data_absent && self.error_message.is_none(),
        }
    }

    /// Decode the structured table payload. Empty for non-success records.
    pub fn decoded_tables(&self) -> Result<Vec<ExtractedTable>, serde_json::Error> {
        match &self.tables {
            Some(value) => Vec::<ExtractedTable>::deserialize(value),
            None => Ok(Vec::new()),
        }
    }

    /// Decode the structured key-value payload. Empty for non-success records.
    pub fn decoded_key_values(&self) -> Result<Vec<KeyValuePair>, serde_json::Error> {
        match &self.key_values {
            Some(value) => Vec::<KeyValuePair>::deserialize(value),
            None => Ok(Vec::new()),
        }
    }
}
