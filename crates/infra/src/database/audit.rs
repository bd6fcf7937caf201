//! SQLite-backed `AuditRepository` — append-only by convention (no
//! `update`/`delete` operation exists on the port).

use async_trait::async_trait;
use forgesheet_core::store::AuditRepository;
use forgesheet_domain::{AuditEntry, Result};
use rusqlite::{params, Row};
use tokio::task;
use uuid::Uuid;

use super::pool::SqlitePool;
use super::support::{map_join_error, map_pool_error, map_sql_error, parse_enum};

pub struct SqliteAuditRepository {
    pool: SqlitePool,
}

impl SqliteAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
        let entry_id: String = row.get("entry_id")?;
        let subject_id: String = row.get("subject_id")?;
        let direction: String = row.get("direction")?;

        let invalid =
            |msg: String| rusqlite::Error::InvalidColumnType(0, msg, rusqlite::types::Type::Text);

        Ok(AuditEntry {
            entry_id: Uuid::parse_str(&entry_id).map_err(|e| invalid(e.to_string()))?,
            direction: parse_enum(&direction, "audit direction").map_err(|e| invalid(e.to_string()))?,
            subject: row.get("subject")?,
            subject_id: Uuid::parse_str(&subject_id).map_err(|e| invalid(e.to_string()))?,
            status: row.get("status")?,
            message: row.get("message")?,
            timestamp: row.get("timestamp")?,
        })
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        let pool = self.pool.clone();
        let entry = entry.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.execute(
                "INSERT INTO audit_log (
                    entry_id, direction, subject, subject_id, status, message, timestamp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.entry_id.to_string(),
                    entry.direction.to_string(),
                    entry.subject,
                    entry.subject_id.to_string(),
                    entry.status,
                    entry.message,
                    entry.timestamp,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_for_subject(&self, subject: &str, subject_id: Uuid) -> Result<Vec<AuditEntry>> {
        let pool = self.pool.clone();
        let subject = subject.to_owned();
        task::spawn_blocking(move || -> Result<Vec<AuditEntry>> {
            let conn = pool.get().map_err(map_pool_error)?;
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM audit_log WHERE subject = ?1 AND subject_id = ?2
                     ORDER BY timestamp",
                )
                .map_err(map_sql_error)?;
            stmt.query_map(params![subject, subject_id.to_string()], Self::row_to_entry)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}
