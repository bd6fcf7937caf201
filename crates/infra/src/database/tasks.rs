//! SQLite-backed `TaskRepository`.

use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use forgesheet_core::store::TaskRepository;
use forgesheet_domain::{Task, TaskPriority, TaskSource, TaskStatus};
use forgesheet_domain::Result;
use rusqlite::{params, Connection, Row};
use tokio::task;
use uuid::Uuid;

use super::pool::SqlitePool;
use super::support::{from_json, map_join_error, map_pool_error, map_sql_error, to_json};

pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn upsert(conn: &Connection, task: &Task) -> Result<()> {
        let labels = to_json(&task.labels)?;
        conn.execute(
            "INSERT INTO tasks (
                task_id, title, body, status, priority, source, assignee_member_id,
                labels, target_table, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(task_id) DO UPDATE SET
                title = excluded.title,
                body = excluded.body,
                status = excluded.status,
                priority = excluded.priority,
                source = excluded.source,
                assignee_member_id = excluded.assignee_member_id,
                labels = excluded.labels,
                target_table = excluded.target_table,
                updated_at = excluded.updated_at",
            params![
                task.task_id.to_string(),
                task.title,
                task.body,
                task.status.to_string(),
                task.priority.to_string(),
                task.source.to_string(),
                task.assignee_member_id.map(|id| id.to_string()),
                labels,
                task.target_table,
                task.created_at,
                task.updated_at,
            ],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    pub(crate) fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
        let task_id: String = row.get("task_id")?;
        let status: String = row.get("status")?;
        let priority: String = row.get("priority")?;
        let source: String = row.get("source")?;
        let assignee: Option<String> = row.get("assignee_member_id")?;
        let labels: String = row.get("labels")?;

        let invalid = |msg: String| {
            rusqlite::Error::InvalidColumnType(0, msg, rusqlite::types::Type::Text)
        };

        Ok(Task {
            task_id: Uuid::parse_str(&task_id).map_err(|e| invalid(e.to_string()))?,
            title: row.get("title")?,
            body: row.get("body")?,
            status: TaskStatus::from_str(&status).map_err(invalid)?,
            priority: TaskPriority::from_str(&priority).map_err(invalid)?,
            source: TaskSource::from_str(&source).map_err(invalid)?,
            assignee_member_id: assignee
                .map(|id| Uuid::parse_str(&id))
                .transpose()
                .map_err(|e| invalid(e.to_string()))?,
            labels: from_json::<BTreeSet<String>>(&labels).unwrap_or_default(),
            target_table: row.get("target_table")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> Result<()> {
        let pool = self.pool.clone();
        let task = task.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(map_pool_error)?;
            Self::upsert(&conn, &task)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, task: &Task) -> Result<()> {
        self.create(task).await
    }

    async fn get(&self, task_id: Uuid) -> Result<Option<Task>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Option<Task>> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.query_row(
                "SELECT * FROM tasks WHERE task_id = ?1",
                params![task_id.to_string()],
                Self::row_to_task,
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(map_sql_error(other)),
            })
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list(&self) -> Result<Vec<Task>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Vec<Task>> {
            let conn = pool.get().map_err(map_pool_error)?;
            let mut stmt = conn
                .prepare("SELECT * FROM tasks ORDER BY created_at")
                .map_err(map_sql_error)?;
            stmt.query_map([], Self::row_to_task)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_by_assignee(&self, member_id: Uuid) -> Result<Vec<Task>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Vec<Task>> {
            let conn = pool.get().map_err(map_pool_error)?;
            let mut stmt = conn
                .prepare("SELECT * FROM tasks WHERE assignee_member_id = ?1 ORDER BY created_at")
                .map_err(map_sql_error)?;
            stmt.query_map(params![member_id.to_string()], Self::row_to_task)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}
