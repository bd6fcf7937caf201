//! One trait per entity family, following the teacher's port-per-repository
//! convention (`forgesheet_domain::sync::ports`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgesheet_domain::{
    AuditEntry, Mapping, Member, OutboxEvent, OutboxStatus, Result, SheetTableRegistryEntry,
    SyncCursor, SyncSource, Task,
};
use uuid::Uuid;

#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn create(&self, member: &Member) -> Result<()>;
    async fn update(&self, member: &Member) -> Result<()>;
    async fn get(&self, member_id: Uuid) -> Result<Option<Member>>;
    async fn get_by_email(&self, email: &str) -> Result<Option<Member>>;
    async fn list(&self) -> Result<Vec<Member>>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> Result<()>;
    async fn update(&self, task: &Task) -> Result<()>;
    async fn get(&self, task_id: Uuid) -> Result<Option<Task>>;
    async fn list(&self) -> Result<Vec<Task>>;
    async fn list_by_assignee(&self, member_id: Uuid) -> Result<Vec<Task>>;
}

#[async_trait]
pub trait MappingRepository: Send + Sync {
    async fn create(&self, mapping: &Mapping) -> Result<()>;
    async fn update(&self, mapping: &Mapping) -> Result<()>;
    async fn get(&self, mapping_id: Uuid) -> Result<Option<Mapping>>;
    async fn get_by_task(&self, task_id: Uuid) -> Result<Option<Mapping>>;
    async fn get_by_forge_ref(&self, repo: &str, number: i64) -> Result<Option<Mapping>>;
    async fn get_by_sheet_ref(
        &self,
        app_token: &str,
        table_id: &str,
        record_id: &str,
    ) -> Result<Option<Mapping>>;
}

#[async_trait]
pub trait SheetTableRegistryRepository: Send + Sync {
    async fn upsert(&self, entry: &SheetTableRegistryEntry) -> Result<()>;
    async fn get(&self, app_token: &str, table_id: &str) -> Result<Option<SheetTableRegistryEntry>>;
    async fn get_default(&self) -> Result<Option<SheetTableRegistryEntry>>;
    async fn list(&self) -> Result<Vec<SheetTableRegistryEntry>>;
}

/// The outbox repository carries the claim/complete/dead-letter lifecycle
/// that makes at-most-one-effect dispatch possible; `claim` and
/// `reclaim_stale` are the two operations the per-task exclusivity guarantee
/// (P1) and crash safety (P5) rest on.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn enqueue(&self, event: &OutboxEvent) -> Result<()>;

    /// Atomically claims up to `limit` pending events whose `not_before` has
    /// elapsed, excluding any event whose task already has another event in
    /// `processing`, and marks them `processing`.
    async fn claim(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<OutboxEvent>>;

    async fn mark_sent(&self, event_id: Uuid) -> Result<()>;

    /// Records a failed attempt. Caller decides `next_not_before` (the
    /// backoff delay) and whether this failure exhausts `max_attempts`; if it
    /// does, the repository transitions the event to `Dead` instead of
    /// `Pending`.
    async fn mark_failed(
        &self,
        event_id: Uuid,
        error: &str,
        next_not_before: DateTime<Utc>,
    ) -> Result<()>;

    async fn mark_dead(&self, event_id: Uuid, error: &str) -> Result<()>;

    /// Returns `processing` events whose `claimed_at` is older than
    /// `threshold` back to `Pending`, for a dispatcher recovering from a
    /// crash mid-dispatch.
    async fn reclaim_stale(&self, now: DateTime<Utc>, threshold: chrono::Duration)
        -> Result<usize>;

    async fn get(&self, event_id: Uuid) -> Result<Option<OutboxEvent>>;
    async fn list_by_status(&self, status: OutboxStatus) -> Result<Vec<OutboxEvent>>;
}

#[async_trait]
pub trait CursorRepository: Send + Sync {
    async fn get(&self, source: SyncSource) -> Result<Option<SyncCursor>>;
    async fn upsert(&self, cursor: &SyncCursor) -> Result<()>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<()>;
    async fn list_for_subject(&self, subject: &str, subject_id: Uuid) -> Result<Vec<AuditEntry>>;
}
