//! SQLite-backed `SheetTableRegistryRepository`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use forgesheet_core::store::SheetTableRegistryRepository;
use forgesheet_domain::{Result, SheetTableRegistryEntry};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;

use super::pool::SqlitePool;
use super::support::{from_json, map_join_error, map_pool_error, map_sql_error, to_json};

pub struct SqliteSheetTableRegistryRepository {
    pool: SqlitePool,
}

impl SqliteSheetTableRegistryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn upsert_row(conn: &Connection, entry: &SheetTableRegistryEntry) -> Result<()> {
        let field_name_map = to_json(&entry.field_name_map)?;
        let label_column_map = to_json(&entry.label_column_map)?;
        conn.execute(
            "INSERT INTO sheet_tables_registry (
                app_token, table_id, display_name, field_name_map, label_column_map, is_default
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(app_token, table_id) DO UPDATE SET
                display_name = excluded.display_name,
                field_name_map = excluded.field_name_map,
                label_column_map = excluded.label_column_map,
                is_default = excluded.is_default",
            params![
                entry.app_token,
                entry.table_id,
                entry.display_name,
                field_name_map,
                label_column_map,
                entry.is_default as i64,
            ],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    pub(crate) fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<SheetTableRegistryEntry> {
        let field_name_map: String = row.get("field_name_map")?;
        let label_column_map: String = row.get("label_column_map")?;
        let is_default: i64 = row.get("is_default")?;

        Ok(SheetTableRegistryEntry {
            app_token: row.get("app_token")?,
            table_id: row.get("table_id")?,
            display_name: row.get("display_name")?,
            field_name_map: from_json::<BTreeMap<String, String>>(&field_name_map)
                .unwrap_or_default(),
            label_column_map: from_json::<BTreeMap<String, String>>(&label_column_map)
                .unwrap_or_default(),
            is_default: is_default != 0,
        })
    }
}

#[async_trait]
impl SheetTableRegistryRepository for SqliteSheetTableRegistryRepository {
    async fn upsert(&self, entry: &SheetTableRegistryEntry) -> Result<()> {
        let pool = self.pool.clone();
        let entry = entry.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(map_pool_error)?;
            Self::upsert_row(&conn, &entry)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get(&self, app_token: &str, table_id: &str) -> Result<Option<SheetTableRegistryEntry>> {
        let pool = self.pool.clone();
        let app_token = app_token.to_owned();
        let table_id = table_id.to_owned();
        task::spawn_blocking(move || -> Result<Option<SheetTableRegistryEntry>> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.query_row(
                "SELECT * FROM sheet_tables_registry WHERE app_token = ?1 AND table_id = ?2",
                params![app_token, table_id],
                Self::row_to_entry,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_default(&self) -> Result<Option<SheetTableRegistryEntry>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Option<SheetTableRegistryEntry>> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.query_row(
                "SELECT * FROM sheet_tables_registry WHERE is_default = 1 LIMIT 1",
                [],
                Self::row_to_entry,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list(&self) -> Result<Vec<SheetTableRegistryEntry>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Vec<SheetTableRegistryEntry>> {
            let conn = pool.get().map_err(map_pool_error)?;
            let mut stmt = conn
                .prepare("SELECT * FROM sheet_tables_registry ORDER BY app_token, table_id")
                .map_err(map_sql_error)?;
            stmt.query_map([], Self::row_to_entry)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}
