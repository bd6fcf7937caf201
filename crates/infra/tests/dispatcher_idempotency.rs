//! P2/P6 — at-most-one external creation per binding, and executing the same
//! handler twice converges on the same final state. Exercises
//! `forgesheet_core::dispatcher::dispatch_event` directly against a fake
//! `ForgeGateway`, skipping the background poll loop for determinism.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgesheet_core::dispatcher::{dispatch_event, DispatchOutcome};
use forgesheet_core::gateway::{ForgeGateway, ForgeIssue, GatewayError, SheetGateway, SheetRecord};
use forgesheet_core::identity::IdentityResolver;
use forgesheet_core::store::Store;
use forgesheet_domain::{
    Config, DatabaseConfig, ForgeConfig, ForgeCreateIssuePayload, ForgeIssueRef, OutboxEvent,
    OutboxEventKind, Result as SyncResult, SheetAuthMode, SheetConfig, SheetFieldNames, SyncConfig,
    Task, TaskPriority, TaskSource, TaskStatus,
};
use forgesheet_infra::{open_pool, SqliteStore};
use serde_json::Value;
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
    next_number: AtomicI64,
    creates_seen: AtomicI64,
}

impl FakeForgeGateway {
    fn new() -> Self {
        Self { issues: Mutex::new(Vec::new()), next_number: AtomicI64::new(1), creates_seen: AtomicI64::new(0) }
    }

    fn creates_seen(&self) -> i64 {
        self.creates_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForgeGateway for FakeForgeGateway {
    async fn create_issue(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        labels: &[String],
        _cancel: &CancellationToken,
    ) -> Result<ForgeIssueRef, GatewayError> {
        self.creates_seen.fetch_add(1, Ordering::SeqCst);
        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
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
        let cutoff: Option<DateTime<Utc>> = since.and_then(|s| s.parse().ok());
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
        title: "Idempotency".to_string(),
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
async fn dispatching_the_same_create_event_twice_creates_one_issue() {
    let dir = tempfile::TempDir::new().unwrap();
    let pool = open_pool(dir.path().join("idem.db"), 4).unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let config = test_config();
    let cancel = CancellationToken::new();

    let forge = Arc::new(FakeForgeGateway::new());
    let sheet: Arc<dyn SheetGateway> = Arc::new(NoopSheetGateway);
    let identity: Arc<dyn IdentityResolver> = Arc::new(NoopIdentityResolver);

    let task_id = seed_task(&store).await;
    let event = OutboxEvent::new(OutboxEventKind::ForgeCreateIssue(ForgeCreateIssuePayload { task_id }), 5);
    store.outbox().enqueue(&event).await.unwrap();

    let first = dispatch_event(&event, store.as_ref(), forge.as_ref(), sheet.as_ref(), identity.as_ref(), &config, &cancel).await;
    assert!(matches!(first, DispatchOutcome::Sent));
    store.outbox().mark_sent(event.event_id).await.unwrap();

    // The handler commits the mapping's forge binding itself. Dispatching
    // an equivalent event a second time must not create a second issue.
    let mapping = store.mappings().get_by_task(task_id).await.unwrap().unwrap();
    assert!(mapping.has_forge_binding());

    let replay = OutboxEvent::new(OutboxEventKind::ForgeCreateIssue(ForgeCreateIssuePayload { task_id }), 5);
    let second = dispatch_event(&replay, store.as_ref(), forge.as_ref(), sheet.as_ref(), identity.as_ref(), &config, &cancel).await;
    assert!(matches!(second, DispatchOutcome::Sent));

    assert_eq!(forge.creates_seen(), 1);
    let issues = forge.list_issues_since(&config.forge.repo, None, &cancel).await.unwrap();
    assert_eq!(issues.len(), 1);
}

#[tokio::test]
async fn pre_check_finds_an_issue_created_before_the_mapping_was_written() {
    // Models the crash window: the external create already happened but the
    // mapping write never landed, so only the forge-side list lookup (not
    // the mapping) can reveal it already exists.
    let dir = tempfile::TempDir::new().unwrap();
    let pool = open_pool(dir.path().join("idem2.db"), 4).unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let config = test_config();
    let cancel = CancellationToken::new();

    let forge = Arc::new(FakeForgeGateway::new());
    let sheet: Arc<dyn SheetGateway> = Arc::new(NoopSheetGateway);
    let identity: Arc<dyn IdentityResolver> = Arc::new(NoopIdentityResolver);

    let task_id = seed_task(&store).await;
    let task = store.tasks().get(task_id).await.unwrap().unwrap();
    let title = forgesheet_core::mapper::title_with_prefix(task_id, &task.title);
    forge.create_issue(&config.forge.repo, &title, &task.body, &[], &cancel).await.unwrap();

    let event = OutboxEvent::new(OutboxEventKind::ForgeCreateIssue(ForgeCreateIssuePayload { task_id }), 5);
    let outcome = dispatch_event(&event, store.as_ref(), forge.as_ref(), sheet.as_ref(), identity.as_ref(), &config, &cancel).await;
    assert!(matches!(outcome, DispatchOutcome::Sent));

    assert_eq!(forge.creates_seen(), 1, "the pre-check must adopt the existing issue, not create another");
    let mapping = store.mappings().get_by_task(task_id).await.unwrap().unwrap();
    assert!(mapping.has_forge_binding());
}
