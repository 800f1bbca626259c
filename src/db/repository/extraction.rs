use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::ExtractionStatus;
use crate::models::{ExtractionRecord, TenantId};

const TABLE: &str = "document_extractions";

const SELECT_COLUMNS: &str = "SELECT id, document_id, status, extracted_text, tables_json,
         key_values_json, page_count, sheet_count, character_count, table_count,
         error_message, extracted_at
         FROM document_extractions";

/// Insert or overwrite the extraction record for `(tenant, record.document_id)`.
/// Last write wins; the stored id becomes the id of the latest attempt.
pub fn upsert_extraction(
    conn: &Connection,
    tenant: &TenantId,
    record: &ExtractionRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO document_extractions (id, tenant_id, document_id, status, extracted_text,
         tables_json, key_values_json, page_count, sheet_count, character_count, table_count,
         error_message, extracted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT (tenant_id, document_id) DO UPDATE SET
            id = excluded.id,
            status = excluded.status,
            extracted_text = excluded.extracted_text,
            tables_json = excluded.tables_json,
            key_values_json = excluded.key_values_json,
            page_count = excluded.page_count,
            sheet_count = excluded.sheet_count,
            character_count = excluded.character_count,
            table_count = excluded.table_count,
            error_message = excluded.error_message,
            extracted_at = excluded.extracted_at",
        params![
            record.id.to_string(),
            tenant.as_str(),
            record.document_id.to_string(),
            record.status.as_str(),
            record.extracted_text,
            record.tables.as_ref().map(|v| v.to_string()),
            record.key_values.as_ref().map(|v| v.to_string()),
            record.page_count,
            record.sheet_count,
            record.character_count,
            record.table_count,
            record.error_message,
            record.extracted_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ],
    )?;
    Ok(())
}

pub fn get_extraction_by_document(
    conn: &Connection,
    tenant: &TenantId,
    document_id: &Uuid,
) -> Result<Option<ExtractionRecord>, DatabaseError> {
    query_one(
        conn,
        &format!("{SELECT_COLUMNS} WHERE tenant_id = ?1 AND document_id = ?2"),
        tenant,
        document_id,
    )
}

pub fn get_extraction(
    conn: &Connection,
    tenant: &TenantId,
    id: &Uuid,
) -> Result<Option<ExtractionRecord>, DatabaseError> {
    query_one(
        conn,
        &format!("{SELECT_COLUMNS} WHERE tenant_id = ?1 AND id = ?2"),
        tenant,
        id,
    )
}

/// Remove the record for a document being deleted. Returns whether a row existed.
pub fn delete_extraction_by_document(
    conn: &Connection,
    tenant: &TenantId,
    document_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM document_extractions WHERE tenant_id = ?1 AND document_id = ?2",
        params![tenant.as_str(), document_id.to_string()],
    )?;
    Ok(rows > 0)
}

fn query_one(
    conn: &Connection,
    sql: &str,
    tenant: &TenantId,
    key: &Uuid,
) -> Result<Option<ExtractionRecord>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;

    let result = stmt.query_row(params![tenant.as_str(), key.to_string()], |row| {
        Ok(ExtractionRow {
            id: row.get(0)?,
            document_id: row.get(1)?,
            status: row.get(2)?,
            extracted_text: row.get(3)?,
            tables_json: row.get(4)?,
            key_values_json: row.get(5)?,
            page_count: row.get(6)?,
            sheet_count: row.get(7)?,
            character_count: row.get(8)?,
            table_count: row.get(9)?,
            error_message: row.get(10)?,
            extracted_at: row.get(11)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(extraction_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ═══════════════════════════════════════════
// Internal row mapping
// ═══════════════════════════════════════════

struct ExtractionRow {
    id: String,
    document_id: String,
    status: String,
    extracted_text: Option<String>,
    tables_json: Option<String>,
    key_values_json: Option<String>,
    page_count: Option<u32>,
    sheet_count: Option<u32>,
    character_count: Option<u32>,
    table_count: Option<u32>,
    error_message: Option<String>,
    extracted_at: String,
}

fn corrupt(reason: impl Into<String>) -> DatabaseError {
    DatabaseError::Corrupt {
        table: TABLE.into(),
        reason: reason.into(),
    }
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|e| corrupt(format!("bad {field} '{value}': {e}")))
}

fn parse_json(field: &str, value: Option<String>) -> Result<Option<serde_json::Value>, DatabaseError> {
    value
        .map(|raw| serde_json::from_str(&raw).map_err(|e| corrupt(format!("bad {field}: {e}"))))
        .transpose()
}

fn extraction_from_row(row: ExtractionRow) -> Result<ExtractionRecord, DatabaseError> {
    let extracted_at = DateTime::parse_from_rfc3339(&row.extracted_at)
        .map_err(|e| corrupt(format!("bad extracted_at '{}': {e}", row.extracted_at)))?
        .with_timezone(&Utc);

    let record = ExtractionRecord {
        id: parse_uuid("id", &row.id)?,
        document_id: parse_uuid("document_id", &row.document_id)?,
        status: ExtractionStatus::from_str(&row.status)?,
        extracted_text: row.extracted_text,
        tables: parse_json("tables_json", row.tables_json)?,
        key_values: parse_json("key_values_json", row.key_values_json)?,
        page_count: row.page_count,
        sheet_count: row.sheet_count,
        character_count: row.character_count,
        table_count: row.table_count,
        error_message: row.error_message,
        extracted_at,
    };

    if !record.is_consistent() {
        return Err(corrupt(format!(
            "record {} violates the {} field invariant",
            record.id, record.status
        )));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::ExtractionPayload;

    fn tenant(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    fn success_record(document_id: Uuid) -> ExtractionRecord {
        ExtractionRecord::pending(document_id).succeed(ExtractionPayload {
            extracted_text: "Carrier: Aetna\nPlan Type\tDeductible\t\n".into(),
            tables: serde_json::json!([{"name": "Plans", "rows": [["Plan Type", "Deductible"]]}]),
            key_values: serde_json::json!([{"key": "Carrier", "value": "Aetna"}]),
            page_count: 0,
            sheet_count: 1,
            character_count: 38,
            table_count: 1,
        })
    }

    #[test]
    fn upsert_and_fetch_by_document() {
        let conn = open_memory_database().unwrap();
        let acme = tenant("acme");
        let record = success_record(Uuid::new_v4());

        upsert_extraction(&conn, &acme, &record).unwrap();

        let fetched = get_extraction_by_document(&conn, &acme, &record.document_id)
            .unwrap()
            .expect("record should exist");
        assert_eq!(fetched, record);
    }

    #[test]
    fn fetch_by_id() {
        let conn = open_memory_database().unwrap();
        let acme = tenant("acme");
        let record = success_record(Uuid::new_v4());
        upsert_extraction(&conn, &acme, &record).unwrap();

        let fetched = get_extraction(&conn, &acme, &record.id).unwrap().unwrap();
        assert_eq!(fetched.document_id, record.document_id);
    }

    #[test]
    fn missing_document_returns_none() {
        let conn = open_memory_database().unwrap();
        let result = get_extraction_by_document(&conn, &tenant("acme"), &Uuid::new_v4()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn re_extraction_overwrites_single_row() {
        let conn = open_memory_database().unwrap();
        let acme = tenant("acme");
        let document_id = Uuid::new_v4();

        let first = success_record(document_id);
        upsert_extraction(&conn, &acme, &first).unwrap();

        let second = ExtractionRecord::pending(document_id).fail("Source unavailable: object not found");
        upsert_extraction(&conn, &acme, &second).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM document_extractions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let fetched = get_extraction_by_document(&conn, &acme, &document_id).unwrap().unwrap();
        assert_eq!(fetched.id, second.id);
        assert_eq!(fetched.status, ExtractionStatus::Failed);
        assert!(fetched.extracted_text.is_none());
        assert!(fetched.tables.is_none());
    }

    #[test]
    fn saving_same_record_twice_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let acme = tenant("acme");
        let record = success_record(Uuid::new_v4());

        upsert_extraction(&conn, &acme, &record).unwrap();
        upsert_extraction(&conn, &acme, &record).unwrap();

        let fetched = get_extraction_by_document(&conn, &acme, &record.document_id).unwrap();
        assert_eq!(fetched, Some(record));
    }

    #[test]
    fn records_are_tenant_scoped() {
        let conn = open_memory_database().unwrap();
        let record = success_record(Uuid::new_v4());
        upsert_extraction(&conn, &tenant("acme"), &record).unwrap();

        let other = get_extraction_by_document(&conn, &tenant("globex"), &record.document_id).unwrap();
        assert!(other.is_none());
        let by_id = get_extraction(&conn, &tenant("globex"), &record.id).unwrap();
        assert!(by_id.is_none());
    }

    #[test]
    fn delete_by_document() {
        let conn = open_memory_database().unwrap();
        let acme = tenant("acme");
        let record = success_record(Uuid::new_v4());
        upsert_extraction(&conn, &acme, &record).unwrap();

        assert!(delete_extraction_by_document(&conn, &acme, &record.document_id).unwrap());
        assert!(!delete_extraction_by_document(&conn, &acme, &record.document_id).unwrap());
        assert!(get_extraction_by_document(&conn, &acme, &record.document_id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn undecodable_json_is_corrupt() {
        let conn = open_memory_database().unwrap();
        let acme = tenant("acme");
        let record = success_record(Uuid::new_v4());
        upsert_extraction(&conn, &acme, &record).unwrap();

        conn.execute(
            "UPDATE document_extractions SET tables_json = '{not json' WHERE id = ?1",
            params![record.id.to_string()],
        )
        .unwrap();

        let err = get_extraction_by_document(&conn, &acme, &record.document_id).unwrap_err();
        assert!(matches!(err, DatabaseError::Corrupt { .. }));
    }

    #[test]
    fn success_row_missing_counts_is_corrupt() {
        let conn = open_memory_database().unwrap();
        let acme = tenant("acme");
        let record = success_record(Uuid::new_v4());
        upsert_extraction(&conn, &acme, &record).unwrap();

        conn.execute(
            "UPDATE document_extractions SET page_count = NULL WHERE id = ?1",
            params![record.id.to_string()],
        )
        .unwrap();

        let err = get_extraction_by_document(&conn, &acme, &record.document_id).unwrap_err();
        assert!(matches!(err, DatabaseError::Corrupt { .. }));
    }
}
