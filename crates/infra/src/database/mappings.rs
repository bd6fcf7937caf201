//! SQLite-backed `MappingRepository`. `forge_repo`/`forge_number` and the
//! three `sheet_*` columns stay NULL until a binding exists; the schema's
//! partial unique indexes are what actually enforce "one Task maps to at
//! most one forge issue / sheet record" (see `database/schema.sql`).

use std::str::FromStr;

use async_trait::async_trait;
use forgesheet_core::store::MappingRepository;
use forgesheet_domain::{ForgeIssueRef, Mapping, Result, SheetRecordRef, SyncStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use uuid::Uuid;

use super::pool::SqlitePool;
use super::support::{map_join_error, map_pool_error, map_sql_error};

pub struct SqliteMappingRepository {
    pool: SqlitePool,
}

impl SqliteMappingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn upsert(conn: &Connection, mapping: &Mapping) -> Result<()> {
        let (forge_repo, forge_number) = match &mapping.forge_issue_ref {
            Some(r) => (Some(r.repo.clone()), Some(r.number)),
            None => (None, None),
        };
        let (sheet_app_token, sheet_table_id, sheet_record_id) = match &mapping.sheet_record_ref {
            Some(r) => (Some(r.app_token.clone()), Some(r.table_id.clone()), Some(r.record_id.clone())),
            None => (None, None, None),
        };

        conn.execute(
            "INSERT INTO mappings (
                mapping_id, task_id, forge_repo, forge_number,
                sheet_app_token, sheet_table_id, sheet_record_id,
                sync_status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(mapping_id) DO UPDATE SET
                forge_repo = excluded.forge_repo,
                forge_number = excluded.forge_number,
                sheet_app_token = excluded.sheet_app_token,
                sheet_table_id = excluded.sheet_table_id,
                sheet_record_id = excluded.sheet_record_id,
                sync_status = excluded.sync_status,
                updated_at = excluded.updated_at",
            params![
                mapping.mapping_id.to_string(),
                mapping.task_id.to_string(),
                forge_repo,
                forge_number,
                sheet_app_token,
                sheet_table_id,
                sheet_record_id,
                mapping.sync_status.to_string(),
                mapping.created_at,
                mapping.updated_at,
            ],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    pub(crate) fn row_to_mapping(row: &Row<'_>) -> rusqlite::Result<Mapping> {
        let mapping_id: String = row.get("mapping_id")?;
        let task_id: String = row.get("task_id")?;
        let sync_status: String = row.get("sync_status")?;
        let forge_repo: Option<String> = row.get("forge_repo")?;
        let forge_number: Option<i64> = row.get("forge_number")?;
        let sheet_app_token: Option<String> = row.get("sheet_app_token")?;
        let sheet_table_id: Option<String> = row.get("sheet_table_id")?;
        let sheet_record_id: Option<String> = row.get("sheet_record_id")?;

        let invalid = |msg: String| {
            rusqlite::Error::InvalidColumnType(0, msg, rusqlite::types::Type::Text)
        };

        Ok(Mapping {
            mapping_id: Uuid::parse_str(&mapping_id).map_err(|e| invalid(e.to_string()))?,
            task_id: Uuid::parse_str(&task_id).map_err(|e| invalid(e.to_string()))?,
            forge_issue_ref: match (forge_repo, forge_number) {
                (Some(repo), Some(number)) => Some(ForgeIssueRef { repo, number }),
                _ => None,
            },
            sheet_record_ref: match (sheet_app_token, sheet_table_id, sheet_record_id) {
                (Some(app_token), Some(table_id), Some(record_id)) => {
                    Some(SheetRecordRef { app_token, table_id, record_id })
                }
                _ => None,
            },
            sync_status: SyncStatus::from_str(&sync_status).map_err(invalid)?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[async_trait]
impl MappingRepository for SqliteMappingRepository {
    async fn create(&self, mapping: &Mapping) -> Result<()> {
        let pool = self.pool.clone();
        let mapping = mapping.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(map_pool_error)?;
            Self::upsert(&conn, &mapping)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, mapping: &Mapping) -> Result<()> {
        self.create(mapping).await
    }

    async fn get(&self, mapping_id: Uuid) -> Result<Option<Mapping>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Option<Mapping>> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.query_row(
                "SELECT * FROM mappings WHERE mapping_id = ?1",
                params![mapping_id.to_string()],
                Self::row_to_mapping,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_by_task(&self, task_id: Uuid) -> Result<Option<Mapping>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Option<Mapping>> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.query_row(
                "SELECT * FROM mappings WHERE task_id = ?1",
                params![task_id.to_string()],
                Self::row_to_mapping,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_by_forge_ref(&self, repo: &str, number: i64) -> Result<Option<Mapping>> {
        let pool = self.pool.clone();
        let repo = repo.to_owned();
        task::spawn_blocking(move || -> Result<Option<Mapping>> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.query_row(
                "SELECT * FROM mappings WHERE forge_repo = ?1 AND forge_number = ?2",
                params![repo, number],
                Self::row_to_mapping,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_by_sheet_ref(
        &self,
        app_token: &str,
        table_id: &str,
        record_id: &str,
    ) -> Result<Option<Mapping>> {
        let pool = self.pool.clone();
        let app_token = app_token.to_owned();
        let table_id = table_id.to_owned();
        let record_id = record_id.to_owned();
        task::spawn_blocking(move || -> Result<Option<Mapping>> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.query_row(
                "SELECT * FROM mappings
                 WHERE sheet_app_token = ?1 AND sheet_table_id = ?2 AND sheet_record_id = ?3",
                params![app_token, table_id, record_id],
                Self::row_to_mapping,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}
