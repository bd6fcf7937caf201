//! The transaction facade. The Intent API's mutating calls need one atomic
//! view across several repositories (e.g. task + mapping + outbox enqueue);
//! `Store::transaction` is the seam that gives them that without leaking
//! `rusqlite` into this crate.
//!
//! `rusqlite::Transaction` is inherently synchronous, so unlike the
//! non-transactional `Store` repository accessors (which are `async_trait`
//! and each individually atomic at the row level, wrapped over
//! `spawn_blocking` by the adapter), `StoreTx`'s repository handles are
//! plain synchronous traits — there is no `.await` available inside the
//! closure `transaction` runs.

use forgesheet_domain::{
    AuditEntry, Mapping, Member, OutboxEvent, Result, SheetTableRegistryEntry, SyncCursor, Task,
};
use uuid::Uuid;

use super::ports::{
    AuditRepository, CursorRepository, MappingRepository, MemberRepository, OutboxRepository,
    SheetTableRegistryRepository, TaskRepository,
};

pub trait MemberRepositoryTx {
    fn create(&self, member: &Member) -> Result<()>;
    fn update(&self, member: &Member) -> Result<()>;
    fn get(&self, member_id: Uuid) -> Result<Option<Member>>;
    fn get_by_email(&self, email: &str) -> Result<Option<Member>>;
}

pub trait TaskRepositoryTx {
    fn create(&self, task: &Task) -> Result<()>;
    fn update(&self, task: &Task) -> Result<()>;
    fn get(&self, task_id: Uuid) -> Result<Option<Task>>;
}

pub trait MappingRepositoryTx {
    fn create(&self, mapping: &Mapping) -> Result<()>;
    fn update(&self, mapping: &Mapping) -> Result<()>;
    fn get_by_task(&self, task_id: Uuid) -> Result<Option<Mapping>>;
}

pub trait SheetTableRegistryRepositoryTx {
    fn get(&self, app_token: &str, table_id: &str) -> Result<Option<SheetTableRegistryEntry>>;
    fn get_default(&self) -> Result<Option<SheetTableRegistryEntry>>;
}

pub trait OutboxRepositoryTx {
    fn enqueue(&self, event: &OutboxEvent) -> Result<()>;
    fn mark_sent(&self, event_id: Uuid) -> Result<()>;
    fn mark_failed(
        &self,
        event_id: Uuid,
        error: &str,
        next_not_before: chrono::DateTime<chrono::Utc>,
    ) -> Result<()>;
    fn mark_dead(&self, event_id: Uuid, error: &str) -> Result<()>;
}

pub trait CursorRepositoryTx {
    fn get(&self, source: forgesheet_domain::SyncSource) -> Result<Option<SyncCursor>>;
    fn upsert(&self, cursor: &SyncCursor) -> Result<()>;
}

pub trait AuditRepositoryTx {
    fn append(&self, entry: &AuditEntry) -> Result<()>;
}

/// The exclusive-write handle passed into a `Store::transaction` closure.
pub trait StoreTx {
    fn members(&self) -> &dyn MemberRepositoryTx;
    fn tasks(&self) -> &dyn TaskRepositoryTx;
    fn mappings(&self) -> &dyn MappingRepositoryTx;
    fn registry(&self) -> &dyn SheetTableRegistryRepositoryTx;
    fn outbox(&self) -> &dyn OutboxRepositoryTx;
    fn cursors(&self) -> &dyn CursorRepositoryTx;
    fn audit(&self) -> &dyn AuditRepositoryTx;
}

/// The top-level handle to the durable store. Non-transactional reads/writes
/// may go straight through the async repository accessors; any sequence of
/// writes that must be atomic goes through `transaction`.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    fn members(&self) -> &dyn MemberRepository;
    fn tasks(&self) -> &dyn TaskRepository;
    fn mappings(&self) -> &dyn MappingRepository;
    fn registry(&self) -> &dyn SheetTableRegistryRepository;
    fn outbox(&self) -> &dyn OutboxRepository;
    fn cursors(&self) -> &dyn CursorRepository;
    fn audit(&self) -> &dyn AuditRepository;

    /// Runs `f` against a `StoreTx` bound to one database transaction,
    /// committing on `Ok` and rolling back on `Err`. `f` is synchronous
    /// (see module docs) and runs on a blocking-pool thread.
    ///
    /// Non-generic so `Store` stays object-safe behind `Arc<dyn Store>` (the
    /// Intent API holds one); callers that need a value out of the
    /// transaction capture it into a local the closure writes through before
    /// returning.
    async fn transaction(
        &self,
        f: Box<dyn FnOnce(&dyn StoreTx) -> Result<()> + Send + '_>,
    ) -> Result<()>;
}
