//! Extraction record store: one record per (tenant, document).

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{
    delete_extraction_by_document, get_extraction, get_extraction_by_document, upsert_extraction,
};
use crate::db::DatabaseError;
use crate::models::{ExtractionRecord, TenantId};

/// Persistence boundary for extraction records.
///
/// `save` is last-write-wins per document; the pipeline does no concurrency
/// control of its own.
pub trait ExtractionStore: Send + Sync {
    fn save(
        &self,
        conn: &Connection,
        tenant: &TenantId,
        record: &ExtractionRecord,
    ) -> Result<ExtractionRecord, DatabaseError>;

    fn find_by_document_id(
        &self,
        conn: &Connection,
        tenant: &TenantId,
        document_id: &Uuid,
    ) -> Result<Option<ExtractionRecord>, DatabaseError>;
}

/// SQLite-backed record store.
#[derive(Default)]
pub struct SqliteExtractionStore;

impl SqliteExtractionStore {
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionStore for SqliteExtractionStore {
    fn save(
        &self,
        conn: &Connection,
        tenant: &TenantId,
        record: &ExtractionRecord,
    ) -> Result<ExtractionRecord, DatabaseError> {
        upsert_extraction(conn, tenant, record)?;
        tracing::debug!(
            tenant = %tenant,
            document_id = %record.document_id,
            status = record.status.as_str(),
            "Extraction record saved"
        );
        Ok(record.clone())
    }

    fn find_by_document_id(
        &self,
        conn: &Connection,
        tenant: &TenantId,
        document_id: &Uuid,
    ) -> Result<Option<ExtractionRecord>, DatabaseError> {
        get_extraction_by_document(conn, tenant, document_id)
    }
}

impl SqliteExtractionStore {
    /// Fetch a record by its own id.
    pub fn get_by_id(
        &self,
        conn: &Connection,
        tenant: &TenantId,
        id: &Uuid,
    ) -> Result<ExtractionRecord, DatabaseError> {
        get_extraction(conn, tenant, id)?.ok_or_else(|| DatabaseError::NotFound {
            entity_type: "document_extraction".to_string(),
            id: id.to_string(),
        })
    }

    /// Drop the record of a deleted document.
    pub fn delete_by_document_id(
        &self,
        conn: &Connection,
        tenant: &TenantId,
        document_id: &Uuid,
    ) -> Result<bool, DatabaseError> {
        delete_extraction_by_document(conn, tenant, document_id)
    }
}
