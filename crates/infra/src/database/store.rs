//! The concrete `Store`/`StoreTx` adapter. Non-transactional reads/writes
//! delegate straight to the per-entity repository structs; `transaction`
//! opens one `rusqlite::Transaction` on a blocking-pool thread and exposes
//! it through `SqliteStoreTx`, which implements every `*Tx` trait directly
//! against that transaction (`rusqlite::Transaction` derefs to
//! `Connection`, so the same row-mapping helpers the async repositories use
//! are reused here).

use std::sync::Arc;

use async_trait::async_trait;
use forgesheet_core::store::{
    AuditRepository, AuditRepositoryTx, CursorRepository, CursorRepositoryTx, MappingRepository,
    MappingRepositoryTx, MemberRepository, MemberRepositoryTx, OutboxRepository,
    OutboxRepositoryTx, SheetTableRegistryRepository, SheetTableRegistryRepositoryTx, Store,
    StoreTx, TaskRepository, TaskRepositoryTx,
};
use forgesheet_domain::{
    AuditEntry, Mapping, Member, OutboxEvent, Result, SheetTableRegistryEntry, SyncCursor,
    SyncError, SyncSource, Task,
};
use rusqlite::{params, OptionalExtension};
use tokio::task;
use uuid::Uuid;

use super::audit::SqliteAuditRepository;
use super::cursors::SqliteCursorRepository;
use super::mappings::SqliteMappingRepository;
use super::members::SqliteMemberRepository;
use super::outbox::SqliteOutboxRepository;
use super::pool::SqlitePool;
use super::registry::SqliteSheetTableRegistryRepository;
use super::support::{map_join_error, map_pool_error, map_sql_error, parse_enum};
use super::tasks::SqliteTaskRepository;

pub struct SqliteStore {
    pool: SqlitePool,
    members: Arc<dyn MemberRepository>,
    tasks: Arc<dyn TaskRepository>,
    mappings: Arc<dyn MappingRepository>,
    registry: Arc<dyn SheetTableRegistryRepository>,
    outbox: Arc<dyn OutboxRepository>,
    cursors: Arc<dyn CursorRepository>,
    audit: Arc<dyn AuditRepository>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            members: Arc::new(SqliteMemberRepository::new(pool.clone())),
            tasks: Arc::new(SqliteTaskRepository::new(pool.clone())),
            mappings: Arc::new(SqliteMappingRepository::new(pool.clone())),
            registry: Arc::new(SqliteSheetTableRegistryRepository::new(pool.clone())),
            outbox: Arc::new(SqliteOutboxRepository::new(pool.clone())),
            cursors: Arc::new(SqliteCursorRepository::new(pool.clone())),
            audit: Arc::new(SqliteAuditRepository::new(pool.clone())),
            pool,
        }
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn members(&self) -> &dyn MemberRepository {
        self.members.as_ref()
    }
    fn tasks(&self) -> &dyn TaskRepository {
        self.tasks.as_ref()
    }
    fn mappings(&self) -> &dyn MappingRepository {
        self.mappings.as_ref()
    }
    fn registry(&self) -> &dyn SheetTableRegistryRepository {
        self.registry.as_ref()
    }
    fn outbox(&self) -> &dyn OutboxRepository {
        self.outbox.as_ref()
    }
    fn cursors(&self) -> &dyn CursorRepository {
        self.cursors.as_ref()
    }
    fn audit(&self) -> &dyn AuditRepository {
        self.audit.as_ref()
    }

    async fn transaction(
        &self,
        f: Box<dyn FnOnce(&dyn StoreTx) -> Result<()> + Send + '_>,
    ) -> Result<()> {
        // `f` borrows from the caller's stack frame, so it cannot be moved
        // into a `'static` `spawn_blocking` closure; `block_in_place` runs it
        // on the current (blocking-capable) worker thread instead, which
        // needs no such bound. Requires the multi-threaded runtime.
        task::block_in_place(|| {
            let mut conn = self.pool.get().map_err(map_pool_error)?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            let store_tx = SqliteStoreTx { tx: &tx };
            match f(&store_tx) {
                Ok(()) => {
                    tx.commit().map_err(map_sql_error)?;
                    Ok(())
                }
                Err(err) => {
                    let _ = tx.rollback();
                    Err(err)
                }
            }
        })
    }
}

struct SqliteStoreTx<'conn> {
    tx: &'conn rusqlite::Transaction<'conn>,
}

impl StoreTx for SqliteStoreTx<'_> {
    fn members(&self) -> &dyn MemberRepositoryTx {
        self
    }
    fn tasks(&self) -> &dyn TaskRepositoryTx {
        self
    }
    fn mappings(&self) -> &dyn MappingRepositoryTx {
        self
    }
    fn registry(&self) -> &dyn SheetTableRegistryRepositoryTx {
        self
    }
    fn outbox(&self) -> &dyn OutboxRepositoryTx {
        self
    }
    fn cursors(&self) -> &dyn CursorRepositoryTx {
        self
    }
    fn audit(&self) -> &dyn AuditRepositoryTx {
        self
    }
}

impl MemberRepositoryTx for SqliteStoreTx<'_> {
    fn create(&self, member: &Member) -> Result<()> {
        SqliteMemberRepository::upsert(self.tx, member)
    }

    fn update(&self, member: &Member) -> Result<()> {
        SqliteMemberRepository::upsert(self.tx, member)
    }

    fn get(&self, member_id: Uuid) -> Result<Option<Member>> {
        self.tx
            .query_row(
                "SELECT * FROM members WHERE member_id = ?1",
                params![member_id.to_string()],
                SqliteMemberRepository::row_to_member,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn get_by_email(&self, email: &str) -> Result<Option<Member>> {
        self.tx
            .query_row(
                "SELECT * FROM members WHERE email = ?1",
                params![email],
                SqliteMemberRepository::row_to_member,
            )
            .optional()
            .map_err(map_sql_error)
    }
}

impl TaskRepositoryTx for SqliteStoreTx<'_> {
    fn create(&self, task: &Task) -> Result<()> {
        SqliteTaskRepository::upsert(self.tx, task)
    }

    fn update(&self, task: &Task) -> Result<()> {
        SqliteTaskRepository::upsert(self.tx, task)
    }

    fn get(&self, task_id: Uuid) -> Result<Option<Task>> {
        self.tx
            .query_row(
                "SELECT * FROM tasks WHERE task_id = ?1",
                params![task_id.to_string()],
                SqliteTaskRepository::row_to_task,
            )
            .optional()
            .map_err(map_sql_error)
    }
}

impl MappingRepositoryTx for SqliteStoreTx<'_> {
    fn create(&self, mapping: &Mapping) -> Result<()> {
        SqliteMappingRepository::upsert(self.tx, mapping)
    }

    fn update(&self, mapping: &Mapping) -> Result<()> {
        SqliteMappingRepository::upsert(self.tx, mapping)
    }

    fn get_by_task(&self, task_id: Uuid) -> Result<Option<Mapping>> {
        self.tx
            .query_row(
                "SELECT * FROM mappings WHERE task_id = ?1",
                params![task_id.to_string()],
                SqliteMappingRepository::row_to_mapping,
            )
            .optional()
            .map_err(map_sql_error)
    }
}

impl SheetTableRegistryRepositoryTx for SqliteStoreTx<'_> {
    fn get(&self, app_token: &str, table_id: &str) -> Result<Option<SheetTableRegistryEntry>> {
        self.tx
            .query_row(
                "SELECT * FROM sheet_tables_registry WHERE app_token = ?1 AND table_id = ?2",
                params![app_token, table_id],
                SqliteSheetTableRegistryRepository::row_to_entry,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn get_default(&self) -> Result<Option<SheetTableRegistryEntry>> {
        self.tx
            .query_row(
                "SELECT * FROM sheet_tables_registry WHERE is_default = 1 LIMIT 1",
                [],
                SqliteSheetTableRegistryRepository::row_to_entry,
            )
            .optional()
            .map_err(map_sql_error)
    }
}

impl OutboxRepositoryTx for SqliteStoreTx<'_> {
    fn enqueue(&self, event: &OutboxEvent) -> Result<()> {
        SqliteOutboxRepository::insert(self.tx, event)
    }

    fn mark_sent(&self, event_id: Uuid) -> Result<()> {
        SqliteOutboxRepository::mark_sent_conn(self.tx, event_id)
    }

    fn mark_failed(
        &self,
        event_id: Uuid,
        error: &str,
        next_not_before: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        SqliteOutboxRepository::mark_failed_conn(self.tx, event_id, error, next_not_before)
    }

    fn mark_dead(&self, event_id: Uuid, error: &str) -> Result<()> {
        SqliteOutboxRepository::mark_dead_conn(self.tx, event_id, error)
    }
}

impl CursorRepositoryTx for SqliteStoreTx<'_> {
    fn get(&self, source: SyncSource) -> Result<Option<SyncCursor>> {
        self.tx
            .query_row(
                "SELECT * FROM sync_cursors WHERE source = ?1",
                params![source.to_string()],
                |row| {
                    let source: String = row.get("source")?;
                    Ok(SyncCursor {
                        source: parse_enum(&source, "sync source").map_err(|e| {
                            rusqlite::Error::InvalidColumnType(
                                0,
                                e.to_string(),
                                rusqlite::types::Type::Text,
                            )
                        })?,
                        value: row.get("value")?,
                        updated_at: row.get("updated_at")?,
                    })
                },
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn upsert(&self, cursor: &SyncCursor) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO sync_cursors (source, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(source) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![cursor.source.to_string(), cursor.value, cursor.updated_at],
            )
            .map_err(map_sql_error)?;
        Ok(())
    }
}

impl AuditRepositoryTx for SqliteStoreTx<'_> {
    fn append(&self, entry: &AuditEntry) -> Result<()> {
        self.tx
            .execute(
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
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use forgesheet_domain::{TaskPriority, TaskSource, TaskStatus};
    use tempfile::TempDir;

    use super::*;
    use crate::database::pool::open_pool;

    #[tokio::test(flavor = "multi_thread")]
    async fn transaction_commits_task_and_mapping_together() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("s.db"), 4).unwrap();
        let store = SqliteStore::new(pool);

        let task = Task {
            task_id: Uuid::new_v4(),
            title: "Ship it".to_string(),
            body: String::new(),
            status: TaskStatus::ToDo,
            priority: TaskPriority::Medium,
            source: TaskSource::Intent,
            assignee_member_id: None,
            labels: Default::default(),
            target_table: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let task_id = task.task_id;

        store
            .transaction(Box::new(move |tx| {
                tx.tasks().create(&task)?;
                tx.mappings().create(&Mapping::new(task_id))?;
                Ok(())
            }))
            .await
            .unwrap();

        let fetched = store.tasks().get(task_id).await.unwrap();
        assert!(fetched.is_some());
        let mapping = store.mappings().get_by_task(task_id).await.unwrap();
        assert!(mapping.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transaction_rolls_back_on_error() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("s.db"), 4).unwrap();
        let store = SqliteStore::new(pool);

        let task = Task {
            task_id: Uuid::new_v4(),
            title: "Never lands".to_string(),
            body: String::new(),
            status: TaskStatus::ToDo,
            priority: TaskPriority::Medium,
            source: TaskSource::Intent,
            assignee_member_id: None,
            labels: Default::default(),
            target_table: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let task_id = task.task_id;

        let outcome = store
            .transaction(Box::new(move |tx| {
                tx.tasks().create(&task)?;
                Err(SyncError::Internal("simulated failure".to_string()))
            }))
            .await;

        assert!(outcome.is_err());
        assert!(store.tasks().get(task_id).await.unwrap().is_none());
    }
}
