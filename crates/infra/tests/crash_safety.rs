//! P5 — crash safety: at every instant an outbox event is in one of
//! `{pending, processing, sent, dead}`; a `processing` row left behind by a
//! killed process becomes `pending` again once it's older than the reclaim
//! threshold, and redispatching it after that never duplicates the external
//! effect already performed before the crash.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use forgesheet_core::dispatcher::{dispatch_event, DispatchOutcome};
use forgesheet_core::gateway::{ForgeGateway, ForgeIssue, GatewayError, SheetGateway, SheetRecord};
use forgesheet_core::identity::IdentityResolver;
use forgesheet_core::store::Store;
use forgesheet_domain::{
    Config, DatabaseConfig, ForgeConfig, ForgeCreateIssuePayload, ForgeIssueRef, OutboxEvent,
    OutboxEventKind, OutboxStatus, Result as SyncResult, SheetAuthMode, SheetConfig,
    SheetFieldNames, SyncConfig, Task, TaskPriority, TaskSource, TaskStatus,
};
use forgesheet_infra::{open_pool, SqliteStore};
use serde_json::Value;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn test_config() -> Config {
    Config {
        forge: ForgeConfig {
            token: "tok".to_string(),
            base_url: "https://forge.test".to_string(),
            owner: "acme".to_string(),
            repo: "acme/widgets".to_string(),
            api_version: "2022-11-28".to_string(),
            request_timeout: std::time::Duration::from_secs(5),
        },
        sheet: SheetConfig {
            app_token: "app_1".to_string(),
            oauth_mode: SheetAuthMode::TenantAppToken,
            default_app_token: None,
            default_table_id: None,
            field_names: SheetFieldNames::default(),
            rpc_command: "sheet-bridge".to_string(),
            rpc_args: Vec::new(),
            request_timeout: std::time::Duration::from_secs(5),
        },
        database: DatabaseConfig { path: ":memory:".to_string(), pool_size: 4 },
        sync: SyncConfig::default(),
    }
}

struct FakeForgeGateway {
    issues: Mutex<Vec<ForgeIssue>>,
    next_number: std::sync::atomic::AtomicI64,
}

impl FakeForgeGateway {
    fn new() -> Self {
        Self { issues: Mutex::new(Vec::new()), next_number: std::sync::atomic::AtomicI64::new(1) }
    }
}

#[async_trait]
impl ForgeGateway for FakeForgeGateway {
    async fn create_issue(&self, repo: &str, title: &str, body: &str, labels: &[String], _cancel: &CancellationToken) -> Result<ForgeIssueRef, GatewayError> {
        let number = self.next_number.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.issues.lock().unwrap().push(ForgeIssue {
            number,
            title: title.to_string(),
            body: body.to_string(),
            state: "open".to_string(),
            state_reason: None,
            labels: labels.to_vec(),
            assignee_login: None,
            updated_at: Utc::now(),
        });
        Ok(ForgeIssueRef { repo: repo.to_string(), number })
    }
    async fn get_issue(&self, _repo: &str, number: i64, _cancel: &CancellationToken) -> Result<ForgeIssue, GatewayError> {
        self.issues.lock().unwrap().iter().find(|i| i.number == number).cloned().ok_or(GatewayError::NotFound)
    }
    async fn patch_issue(&self, _repo: &str, _number: i64, _fields: &Value, _cancel: &CancellationToken) -> Result<(), GatewayError> {
        Ok(())
    }
    async fn close_issue(&self, _repo: &str, _number: i64, _reason: &str, _cancel: &CancellationToken) -> Result<(), GatewayError> {
        Ok(())
    }
    async fn list_issues_since(&self, _repo: &str, since: Option<&str>, _cancel: &CancellationToken) -> Result<Vec<ForgeIssue>, GatewayError> {
        let cutoff: Option<chrono::DateTime<Utc>> = since.and_then(|s| s.parse().ok());
        Ok(self.issues.lock().unwrap().iter().filter(|i| cutoff.map_or(true, |c| i.updated_at > c)).cloned().collect())
    }
    async fn add_comment(&self, _repo: &str, _number: i64, _body: &str, _cancel: &CancellationToken) -> Result<(), GatewayError> {
        Ok(())
    }
}

struct NoopSheetGateway;

#[async_trait]
impl SheetGateway for NoopSheetGateway {
    async fn create_record(&self, _app_token: &str, _table_id: &str, _fields: &Value, _cancel: &CancellationToken) -> Result<forgesheet_domain::SheetRecordRef, GatewayError> {
        Err(GatewayError::NotFound)
    }
    async fn get_record(&self, _app_token: &str, _table_id: &str, _record_id: &str, _cancel: &CancellationToken) -> Result<SheetRecord, GatewayError> {
        Err(GatewayError::NotFound)
    }
    async fn update_record(&self, _app_token: &str, _table_id: &str, _record_id: &str, _fields: &Value, _cancel: &CancellationToken) -> Result<(), GatewayError> {
        Ok(())
    }
    async fn search_record(&self, _app_token: &str, _table_id: &str, _key_field: &str, _key_value: &str, _cancel: &CancellationToken) -> Result<Option<forgesheet_domain::SheetRecordRef>, GatewayError> {
        Ok(None)
    }
    async fn list_records_since(&self, _app_token: &str, _table_id: &str, _since: Option<&str>, _cancel: &CancellationToken) -> Result<Vec<SheetRecord>, GatewayError> {
        Ok(Vec::new())
    }
    async fn list_tables(&self, _app_token: &str, _cancel: &CancellationToken) -> Result<Vec<String>, GatewayError> {
        Ok(Vec::new())
    }
    async fn create_table(&self, _app_token: &str, display_name: &str, _cancel: &CancellationToken) -> Result<String, GatewayError> {
        Ok(display_name.to_string())
    }
    async fn resolve_contact_by_email(&self, _email: &str, _cancel: &CancellationToken) -> Result<Option<String>, GatewayError> {
        Ok(None)
    }
    async fn send_message(&self, _open_id: &str, _message: &str, _cancel: &CancellationToken) -> Result<(), GatewayError> {
        Ok(())
    }
}

struct NoopIdentityResolver;

#[async_trait]
impl IdentityResolver for NoopIdentityResolver {
    async fn resolve(&self, _email: &str) -> SyncResult<forgesheet_core::identity::ResolvedIdentity> {
        Ok(forgesheet_core::identity::ResolvedIdentity::default())
    }
    async fn invalidate(&self, _member_id: Uuid) -> SyncResult<()> {
        Ok(())
    }
}

async fn seed_task(store: &Arc<dyn Store>) -> Uuid {
    let now = Utc::now();
    let task = Task {
        task_id: Uuid::new_v4(),
        title: "Crash safety".to_string(),
        body: String::new(),
        status: TaskStatus::ToDo,
        priority: TaskPriority::Medium,
        source: TaskSource::Intent,
        assignee_member_id: None,
        labels: Default::default(),
        target_table: None,
        created_at: now,
        updated_at: now,
    };
    store.tasks().create(&task).await.unwrap();
    store.mappings().create(&forgesheet_domain::Mapping::new(task.task_id)).await.unwrap();
    task.task_id
}

#[tokio::test]
async fn stale_processing_event_reclaims_to_pending_and_redispatch_is_idempotent() {
    let dir = tempfile::TempDir::new().unwrap();
    let pool = open_pool(dir.path().join("crash.db"), 4).unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let config = test_config();
    let cancel = CancellationToken::new();

    let forge = Arc::new(FakeForgeGateway::new());
    let sheet: Arc<dyn SheetGateway> = Arc::new(NoopSheetGateway);
    let identity: Arc<dyn IdentityResolver> = Arc::new(NoopIdentityResolver);

    let task_id = seed_task(&store).await;
    let event = OutboxEvent::new(OutboxEventKind::ForgeCreateIssue(ForgeCreateIssuePayload { task_id }), 5);
    store.outbox().enqueue(&event).await.unwrap();

    // The dispatcher claims the event...
    let claimed = store.outbox().claim(Utc::now(), 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(store.outbox().get(event.event_id).await.unwrap().unwrap().status, OutboxStatus::Processing);

    // ...and performs the external effect directly, modeling a process that
    // is killed before it can commit `mark_sent`/the mapping update. The
    // event is left `processing` forever from the store's point of view.
    let task = store.tasks().get(task_id).await.unwrap().unwrap();
    let title = forgesheet_core::mapper::title_with_prefix(task_id, &task.title);
    forge.create_issue(&config.forge.repo, &title, &task.body, &[], &cancel).await.unwrap();

    // Before the reclaim threshold has elapsed, the event is still
    // legitimately in flight — reclaim must leave it alone.
    let reclaimed_too_soon = store.outbox().reclaim_stale(Utc::now(), chrono::Duration::seconds(120)).await.unwrap();
    assert_eq!(reclaimed_too_soon, 0);
    assert_eq!(store.outbox().get(event.event_id).await.unwrap().unwrap().status, OutboxStatus::Processing);

    // "Restart": a sweep run well after the claim, past the threshold,
    // returns the stale claim to pending.
    let reclaimed = store
        .outbox()
        .reclaim_stale(Utc::now() + chrono::Duration::hours(1), chrono::Duration::seconds(120))
        .await
        .unwrap();
    assert_eq!(reclaimed, 1);
    assert_eq!(store.outbox().get(event.event_id).await.unwrap().unwrap().status, OutboxStatus::Pending);

    // Redispatching after the simulated restart must find the issue already
    // created (via the title pre-check) rather than creating a duplicate.
    let reclaimed_event = store.outbox().get(event.event_id).await.unwrap().unwrap();
    let outcome = dispatch_event(&reclaimed_event, store.as_ref(), forge.as_ref(), sheet.as_ref(), identity.as_ref(), &config, &cancel).await;
    assert!(matches!(outcome, DispatchOutcome::Sent));
    store.outbox().mark_sent(reclaimed_event.event_id).await.unwrap();

    let issues = forge.list_issues_since(&config.forge.repo, None, &cancel).await.unwrap();
    assert_eq!(issues.len(), 1, "no duplicate issue must be created on redispatch after a crash");

    let final_event = store.outbox().get(event.event_id).await.unwrap().unwrap();
    assert_eq!(final_event.status, OutboxStatus::Sent);
}

#[tokio::test]
async fn every_event_is_always_in_a_valid_lifecycle_state() {
    let dir = tempfile::TempDir::new().unwrap();
    let pool = open_pool(dir.path().join("crash2.db"), 4).unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));

    let task_id = seed_task(&store).await;
    let event = OutboxEvent::new(OutboxEventKind::ForgeCreateIssue(ForgeCreateIssuePayload { task_id }), 5);
    store.outbox().enqueue(&event).await.unwrap();

    let valid = |status: OutboxStatus| {
        matches!(status, OutboxStatus::Pending | OutboxStatus::Processing | OutboxStatus::Sent | OutboxStatus::Dead)
    };
    assert!(valid(store.outbox().get(event.event_id).await.unwrap().unwrap().status));

    store.outbox().claim(Utc::now(), 10).await.unwrap();
    assert!(valid(store.outbox().get(event.event_id).await.unwrap().unwrap().status));

    // A failed attempt that hasn't exhausted `max_attempts` returns to
    // `pending` for retry, never lingering in an intermediate `failed` state.
    store.outbox().mark_failed(event.event_id, "transient", Utc::now()).await.unwrap();
    let retried = store.outbox().get(event.event_id).await.unwrap().unwrap();
    assert!(valid(retried.status));
    assert_eq!(retried.status, OutboxStatus::Pending);

    store.outbox().mark_dead(event.event_id, "exhausted").await.unwrap();
    assert_eq!(store.outbox().get(event.event_id).await.unwrap().unwrap().status, OutboxStatus::Dead);
}
