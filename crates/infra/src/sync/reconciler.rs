//! `Reconciler` — one instance per external source, pulling changes back
//! into local state on a fixed interval (spec.md §4.5). Lifecycle mirrors
//! `OutboxDispatcher`: `start`/`stop`, a `CancellationToken`, a tracked
//! `JoinHandle`, `Drop` cancels outstanding work.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use forgesheet_core::gateway::{ForgeGateway, ForgeIssue, SheetGateway, SheetRecord};
use forgesheet_core::identity::IdentityResolver;
use forgesheet_core::mapper::{self, IdentityView};
use forgesheet_core::reconciler::{decide, last_write_wins, ReconcileDecision};
use forgesheet_core::store::Store;
use forgesheet_domain::{
    AuditDirection, Config, ForgeIssueRef, ForgeUpdateIssuePayload, Mapping, NotifyMemberPayload,
    OutboxEvent, OutboxEventKind, Result, SheetRecordRef, SheetUpdateRecordPayload, SyncCursor,
    SyncError, SyncSource, SyncStatus, Task,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub struct Reconciler {
    source: SyncSource,
    store: Arc<dyn Store>,
    forge: Arc<dyn ForgeGateway>,
    sheet: Arc<dyn SheetGateway>,
    identity: Arc<dyn IdentityResolver>,
    config: Config,
    interval: Duration,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl Reconciler {
    pub fn new(
        source: SyncSource,
        store: Arc<dyn Store>,
        forge: Arc<dyn ForgeGateway>,
        sheet: Arc<dyn SheetGateway>,
        identity: Arc<dyn IdentityResolver>,
        config: Config,
    ) -> Self {
        let interval = config.sync.reconcile_interval;
        Self {
            source,
            store,
            forge,
            sheet,
            identity,
            config,
            interval,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    #[instrument(skip(self), fields(source = ?self.source))]
    pub fn start(&mut self) {
        if self.is_running() {
            warn!("reconciler already running");
            return;
        }
        self.cancellation = CancellationToken::new();
        let source = self.source;
        let store = Arc::clone(&self.store);
        let forge = Arc::clone(&self.forge);
        let sheet = Arc::clone(&self.sheet);
        let identity = Arc::clone(&self.identity);
        let config = self.config.clone();
        let interval = self.interval;
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            run_loop(source, store, forge, sheet, identity, config, interval, cancel).await;
        });
        self.task_handle = Some(handle);
        info!("reconciler started");
    }

    #[instrument(skip(self), fields(source = ?self.source))]
    pub async fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.cancellation.cancel();
        if let Some(handle) = self.task_handle.take() {
            if let Err(err) = handle.await {
                warn!(%err, "reconciler task panicked");
            }
        }
        info!("reconciler stopped");
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        if self.is_running() {
            self.cancellation.cancel();
        }
    }
}

async fn run_loop(
    source: SyncSource,
    store: Arc<dyn Store>,
    forge: Arc<dyn ForgeGateway>,
    sheet: Arc<dyn SheetGateway>,
    identity: Arc<dyn IdentityResolver>,
    config: Config,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("reconciler loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                let result = match source {
                    SyncSource::Forge => tick_forge(&store, &forge, &identity, &config, &cancel).await,
                    SyncSource::Sheet => tick_sheet(&store, &sheet, &identity, &config, &cancel).await,
                };
                if let Err(err) = result {
                    error!(?source, %err, "reconciler tick failed");
                }
            }
        }
    }
}

async fn identity_view_for(
    store: &dyn Store,
    identity: &dyn IdentityResolver,
    task: &Task,
) -> Result<IdentityView> {
    let Some(member_id) = task.assignee_member_id else {
        return Ok(IdentityView::default());
    };
    let Some(member) = store.members().get(member_id).await? else {
        return Ok(IdentityView::default());
    };
    let resolved = identity.resolve(&member.email).await?;
    Ok(IdentityView {
        forge_username: resolved.forge_username,
        sheet_open_id: resolved.sheet_open_id,
    })
}

fn forge_patch_value(task: &Task, identity_view: &IdentityView) -> Value {
    let payload = mapper::task_to_forge_issue(task, identity_view);
    let mut obj = serde_json::Map::new();
    obj.insert("title".to_string(), json!(payload.title));
    obj.insert("body".to_string(), json!(payload.body));
    obj.insert("labels".to_string(), json!(payload.labels));
    obj.insert("state".to_string(), json!(payload.state));
    if let Some(reason) = payload.state_reason {
        obj.insert("state_reason".to_string(), json!(reason));
    }
    Value::Object(obj)
}

/// Computes the `SheetUpdateRecord` event a forge-side change should mirror
/// to the sheet, without enqueuing it — the caller folds the enqueue into
/// the same transaction that commits the forge-side change, per spec.md §7's
/// "remote-wins branch (upsert task, enqueue opposite event, one
/// transaction)".
async fn opposite_event_for_forge_change(
    store: &dyn Store,
    identity: &dyn IdentityResolver,
    task: &Task,
    mapping: &Mapping,
) -> Result<Option<OutboxEvent>> {
    let Some(_sheet_ref) = &mapping.sheet_record_ref else {
        return Ok(None);
    };
    let registry = store.registry().get_default().await?;
    let Some(registry) = registry else {
        return Ok(None);
    };
    let identity_view = identity_view_for(store, identity, task).await?;
    let payload = mapper::task_to_sheet_record(task, &registry, &identity_view);
    Ok(Some(OutboxEvent::new(
        OutboxEventKind::SheetUpdateRecord(SheetUpdateRecordPayload {
            task_id: task.task_id,
            fields: payload.fields,
        }),
        5,
    )))
}

/// Sheet-side mirror of `opposite_event_for_forge_change`.
async fn opposite_event_for_sheet_change(
    store: &dyn Store,
    identity: &dyn IdentityResolver,
    task: &Task,
    mapping: &Mapping,
) -> Result<Option<OutboxEvent>> {
    let Some(_forge_ref) = &mapping.forge_issue_ref else {
        return Ok(None);
    };
    let identity_view = identity_view_for(store, identity, task).await?;
    let fields = forge_patch_value(task, &identity_view);
    Ok(Some(OutboxEvent::new(
        OutboxEventKind::ForgeUpdateIssue(ForgeUpdateIssuePayload { task_id: task.task_id, fields }),
        5,
    )))
}

async fn notify_conflict(store: &dyn Store, task: &Task) -> Result<()> {
    let event = OutboxEvent::new(
        OutboxEventKind::NotifyMember(NotifyMemberPayload {
            member_id: task.assignee_member_id,
            message: format!("task {} has conflicting edits on both sides", task.task_id),
        }),
        5,
    );
    store.outbox().enqueue(&event).await
}

async fn tick_forge(
    store: &Arc<dyn Store>,
    forge: &Arc<dyn ForgeGateway>,
    identity: &Arc<dyn IdentityResolver>,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<()> {
    let repo = &config.forge.repo;
    let cursor = store.cursors().get(SyncSource::Forge).await?;
    let since = cursor.as_ref().map(|c| c.value.as_str());

    let issues = forge.list_issues_since(repo, since, cancel).await.map_err(SyncError::from)?;
    if issues.is_empty() {
        return Ok(());
    }
    info!(count = issues.len(), "pulled forge issues");

    let mut max_seen: Option<DateTime<Utc>> = None;
    for issue in &issues {
        if let Err(err) = reconcile_forge_issue(store, identity, repo, issue).await {
            error!(number = issue.number, %err, "failed to reconcile forge issue");
            continue;
        }
        max_seen = Some(max_seen.map_or(issue.updated_at, |m| m.max(issue.updated_at)));
    }

    if let Some(max_seen) = max_seen {
        store.cursors().upsert(&SyncCursor::new(SyncSource::Forge, max_seen.to_rfc3339())).await?;
    }
    Ok(())
}

async fn reconcile_forge_issue(
    store: &Arc<dyn Store>,
    identity: &Arc<dyn IdentityResolver>,
    repo: &str,
    issue: &ForgeIssue,
) -> Result<()> {
    let existing_mapping = store.mappings().get_by_forge_ref(repo, issue.number).await?;

    let Some(mapping) = existing_mapping else {
        let (task, _substituted) = mapper::forge_issue_to_task(issue, None);
        let mapping = Mapping {
            mapping_id: uuid::Uuid::new_v4(),
            task_id: task.task_id,
            forge_issue_ref: Some(ForgeIssueRef { repo: repo.to_string(), number: issue.number }),
            sheet_record_ref: None,
            sync_status: SyncStatus::Synced,
            created_at: task.created_at,
            updated_at: task.updated_at,
        };
        let task_clone = task.clone();
        let mapping_clone = mapping.clone();
        store
            .transaction(Box::new(move |tx| {
                tx.tasks().create(&task_clone)?;
                tx.mappings().create(&mapping_clone)?;
                Ok(())
            }))
            .await?;
        return Ok(());
    };

    let Some(existing_task) = store.tasks().get(mapping.task_id).await? else {
        warn!(task_id = %mapping.task_id, "mapping references a missing task; skipping");
        return Ok(());
    };

    let (candidate, _substituted) = mapper::forge_issue_to_task(issue, Some(&existing_task));
    let values_differ = candidate.title != existing_task.title
        || candidate.status != existing_task.status
        || candidate.priority != existing_task.priority
        || candidate.labels != existing_task.labels;

    let decision =
        decide(Some(existing_task.updated_at), issue.updated_at, Some(mapping.updated_at), values_differ);

    match decision {
        // `NewFromRemote` is unreachable here since `existing_task` is
        // `Some`, but `decide` isn't specialized per call site; fold it
        // into `RemoteWins` rather than matching on an impossible case.
        ReconcileDecision::NewFromRemote | ReconcileDecision::RemoteWins => {
            apply_remote_forge_win(store, identity, candidate, mapping).await?;
        }
        ReconcileDecision::LocalWinsSilently => {}
        ReconcileDecision::Conflict => {
            let winning_updated_at = last_write_wins(existing_task.updated_at, issue.updated_at);
            let mut task = candidate;
            task.updated_at = winning_updated_at;
            let mut mapping = mapping;
            mapping.sync_status = SyncStatus::Conflict;
            mapping.updated_at = Utc::now();

            append_audit(
                store,
                AuditDirection::ForgeToLocal,
                "task",
                task.task_id,
                "conflict",
                &format!(
                    "local title={:?} updated_at={} vs remote title={:?} updated_at={}",
                    existing_task.title, existing_task.updated_at, issue.title, issue.updated_at
                ),
            )
            .await?;

            let opposite_event =
                opposite_event_for_forge_change(store.as_ref(), identity.as_ref(), &task, &mapping).await?;

            let task_clone = task.clone();
            let mapping_clone = mapping.clone();
            store
                .transaction(Box::new(move |tx| {
                    tx.tasks().update(&task_clone)?;
                    tx.mappings().update(&mapping_clone)?;
                    if let Some(event) = &opposite_event {
                        tx.outbox().enqueue(event)?;
                    }
                    Ok(())
                }))
                .await?;

            notify_conflict(store.as_ref(), &task).await?;
        }
    }

    Ok(())
}

async fn apply_remote_forge_win(
    store: &Arc<dyn Store>,
    identity: &Arc<dyn IdentityResolver>,
    task: Task,
    mapping: Mapping,
) -> Result<()> {
    let opposite_event =
        opposite_event_for_forge_change(store.as_ref(), identity.as_ref(), &task, &mapping).await?;
    let task_clone = task.clone();
    store
        .transaction(Box::new(move |tx| {
            tx.tasks().update(&task_clone)?;
            if let Some(event) = &opposite_event {
                tx.outbox().enqueue(event)?;
            }
            Ok(())
        }))
        .await
}

/// Content-hash state for the sheet source, round-tripped through the
/// cursor's opaque `value` string since the sheet API has no native
/// modified-since filter; detects unchanged rows across repeated full scans.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SheetCursorState {
    hashes: BTreeMap<String, String>,
}

fn content_hash(fields: &Value) -> String {
    let canonical = serde_json::to_vec(fields).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    format!("{digest:x}")
}

async fn tick_sheet(
    store: &Arc<dyn Store>,
    sheet: &Arc<dyn SheetGateway>,
    identity: &Arc<dyn IdentityResolver>,
    _config: &Config,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some(registry) = store.registry().get_default().await? else {
        debug!("no default sheet table registered; skipping sheet reconciliation");
        return Ok(());
    };

    let cursor = store.cursors().get(SyncSource::Sheet).await?;
    let mut state: SheetCursorState = cursor
        .as_ref()
        .and_then(|c| serde_json::from_str(&c.value).ok())
        .unwrap_or_default();

    let records = sheet
        .list_records_since(&registry.app_token, &registry.table_id, None, cancel)
        .await
        .map_err(SyncError::from)?;
    if records.is_empty() {
        return Ok(());
    }
    info!(count = records.len(), "pulled sheet records for full scan");

    let mut next_hashes = BTreeMap::new();
    for record in &records {
        let hash = content_hash(&record.fields);
        next_hashes.insert(record.record_id.clone(), hash.clone());

        if state.hashes.get(&record.record_id) == Some(&hash) {
            continue;
        }
        if let Err(err) =
            reconcile_sheet_record(store, identity, &registry.app_token, &registry.table_id, record).await
        {
            error!(record_id = %record.record_id, %err, "failed to reconcile sheet record");
        }
    }

    state.hashes = next_hashes;
    let value = serde_json::to_string(&state)
        .map_err(|e| SyncError::Internal(format!("failed to serialize sheet cursor state: {e}")))?;
    store.cursors().upsert(&SyncCursor::new(SyncSource::Sheet, value)).await?;
    Ok(())
}

async fn reconcile_sheet_record(
    store: &Arc<dyn Store>,
    identity: &Arc<dyn IdentityResolver>,
    app_token: &str,
    table_id: &str,
    record: &SheetRecord,
) -> Result<()> {
    let existing_mapping =
        store.mappings().get_by_sheet_ref(app_token, table_id, &record.record_id).await?;
    let registry = store
        .registry()
        .get(app_token, table_id)
        .await?
        .ok_or_else(|| SyncError::Internal("registry entry disappeared mid-tick".to_string()))?;

    let Some(mapping) = existing_mapping else {
        let (task, _substituted) = mapper::sheet_record_to_task(record, &registry, None);
        let mapping = Mapping {
            mapping_id: uuid::Uuid::new_v4(),
            task_id: task.task_id,
            forge_issue_ref: None,
            sheet_record_ref: Some(SheetRecordRef {
                app_token: app_token.to_string(),
                table_id: table_id.to_string(),
                record_id: record.record_id.clone(),
            }),
            sync_status: SyncStatus::Synced,
            created_at: task.created_at,
            updated_at: task.updated_at,
        };
        let task_clone = task.clone();
        let mapping_clone = mapping.clone();
        store
            .transaction(Box::new(move |tx| {
                tx.tasks().create(&task_clone)?;
                tx.mappings().create(&mapping_clone)?;
                Ok(())
            }))
            .await?;
        return Ok(());
    };

    let Some(existing_task) = store.tasks().get(mapping.task_id).await? else {
        warn!(task_id = %mapping.task_id, "mapping references a missing task; skipping");
        return Ok(());
    };

    let (candidate, _substituted) = mapper::sheet_record_to_task(record, &registry, Some(&existing_task));
    let values_differ = candidate.title != existing_task.title
        || candidate.status != existing_task.status
        || candidate.priority != existing_task.priority;

    let decision = decide(
        Some(existing_task.updated_at),
        record.updated_at,
        Some(mapping.updated_at),
        values_differ,
    );

    match decision {
        ReconcileDecision::NewFromRemote | ReconcileDecision::RemoteWins => {
            apply_remote_sheet_win(store, identity, candidate, mapping).await?;
        }
        ReconcileDecision::LocalWinsSilently => {}
        ReconcileDecision::Conflict => {
            let winning_updated_at = last_write_wins(existing_task.updated_at, record.updated_at);
            let mut task = candidate;
            task.updated_at = winning_updated_at;
            let mut mapping = mapping;
            mapping.sync_status = SyncStatus::Conflict;
            mapping.updated_at = Utc::now();

            append_audit(
                store,
                AuditDirection::SheetToLocal,
                "task",
                task.task_id,
                "conflict",
                &format!(
                    "local title={:?} updated_at={} vs remote record {} updated_at={}",
                    existing_task.title, existing_task.updated_at, record.record_id, record.updated_at
                ),
            )
            .await?;

            let opposite_event =
                opposite_event_for_sheet_change(store.as_ref(), identity.as_ref(), &task, &mapping).await?;

            let task_clone = task.clone();
            let mapping_clone = mapping.clone();
            store
                .transaction(Box::new(move |tx| {
                    tx.tasks().update(&task_clone)?;
                    tx.mappings().update(&mapping_clone)?;
                    if let Some(event) = &opposite_event {
                        tx.outbox().enqueue(event)?;
                    }
                    Ok(())
                }))
                .await?;

            notify_conflict(store.as_ref(), &task).await?;
        }
    }

    Ok(())
}

async fn apply_remote_sheet_win(
    store: &Arc<dyn Store>,
    identity: &Arc<dyn IdentityResolver>,
    task: Task,
    mapping: Mapping,
) -> Result<()> {
    let opposite_event =
        opposite_event_for_sheet_change(store.as_ref(), identity.as_ref(), &task, &mapping).await?;
    let task_clone = task.clone();
    store
        .transaction(Box::new(move |tx| {
            tx.tasks().update(&task_clone)?;
            if let Some(event) = &opposite_event {
                tx.outbox().enqueue(event)?;
            }
            Ok(())
        }))
        .await
}

async fn append_audit(
    store: &Arc<dyn Store>,
    direction: AuditDirection,
    subject: &str,
    subject_id: uuid::Uuid,
    status: &str,
    message: &str,
) -> Result<()> {
    store
        .audit()
        .append(&forgesheet_domain::AuditEntry::new(direction, subject, subject_id, status, message))
        .await
}
