//! SQLite-backed `CursorRepository`.

use async_trait::async_trait;
use forgesheet_core::store::CursorRepository;
use forgesheet_domain::{Result, SyncCursor, SyncSource};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;

use super::pool::SqlitePool;
use super::support::{map_join_error, map_pool_error, map_sql_error, parse_enum};

pub struct SqliteCursorRepository {
    pool: SqlitePool,
}

impl SqliteCursorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn row_to_cursor(row: &Row<'_>) -> rusqlite::Result<SyncCursor> {
        let source: String = row.get("source")?;
        Ok(SyncCursor {
            source: parse_enum(&source, "sync source")
                .map_err(|e| rusqlite::Error::InvalidColumnType(0, e.to_string(), rusqlite::types::Type::Text))?,
            value: row.get("value")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[async_trait]
impl CursorRepository for SqliteCursorRepository {
    async fn get(&self, source: SyncSource) -> Result<Option<SyncCursor>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Option<SyncCursor>> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.query_row(
                "SELECT * FROM sync_cursors WHERE source = ?1",
                params![source.to_string()],
                Self::row_to_cursor,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert(&self, cursor: &SyncCursor) -> Result<()> {
        let pool = self.pool.clone();
        let cursor = cursor.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.execute(
                "INSERT INTO sync_cursors (source, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(source) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![cursor.source.to_string(), cursor.value, cursor.updated_at],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}
