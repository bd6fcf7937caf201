//! The dispatch decision logic: one handler per `OutboxEventKind`, written
//! against the Store/Gateway ports only. `forgesheet_infra::sync::dispatcher`
//! owns the actual worker loop (claim batches, spawn workers, schedule
//! ticks); this module is what each worker calls per claimed event.
//!
//! Every branch that returns `DispatchOutcome::Sent` commits its own
//! `mark_sent` as part of the same effect it produced: either inside the
//! `store.transaction()` that also updates the mapping/task and appends the
//! audit entry, or as a lone write when there is nothing else to combine it
//! with (idempotent pre-checks, `NotifyMember`). The worker loop in
//! `forgesheet_infra::sync::dispatcher` no longer marks events sent itself —
//! a crash between a handler's effect and a separate outer `mark_sent` would
//! otherwise leave a fully-applied event stuck `processing` forever.

use chrono::Utc;
use forgesheet_domain::{
    AuditDirection, AuditEntry, Config, ForgeIssueRef, Mapping, OutboxEvent, OutboxEventKind,
    SheetRecordRef, SyncStatus, Task, TaskSource,
};
use tokio_util::sync::CancellationToken;

use crate::gateway::{ForgeGateway, GatewayError, SheetGateway};
use crate::identity::IdentityResolver;
use crate::mapper::{self, IdentityView};
use crate::store::Store;

/// What the worker loop should do with the claimed event next.
#[derive(Debug)]
pub enum DispatchOutcome {
    Sent,
    Transient(String),
    Dead(String),
}

async fn identity_view_for(
    store: &dyn Store,
    identity: &dyn IdentityResolver,
    task: &Task,
) -> Result<IdentityView, forgesheet_domain::SyncError> {
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

/// Dispatches one claimed event to its kind's handler. Returns the outcome
/// the worker loop uses to decide whether to mark the event `pending` with
/// backoff or `dead` — `Sent` handlers have already committed their own
/// `mark_sent`. Never panics on a gateway error — those translate to
/// `Transient`/`Dead` via `GatewayError::is_retryable`.
pub async fn dispatch_event(
    event: &OutboxEvent,
    store: &dyn Store,
    forge: &dyn ForgeGateway,
    sheet: &dyn SheetGateway,
    identity: &dyn IdentityResolver,
    config: &Config,
    cancel: &CancellationToken,
) -> DispatchOutcome {
    let result = match &event.kind {
        OutboxEventKind::ForgeCreateIssue(p) => {
            handle_forge_create_issue(event.event_id, p.task_id, store, forge, identity, config, cancel)
                .await
        }
        OutboxEventKind::ForgeUpdateIssue(p) => {
            handle_forge_update_issue(event.event_id, p.task_id, &p.fields, store, forge, config, cancel)
                .await
        }
        OutboxEventKind::ForgeCloseIssue(p) => {
            handle_forge_close_issue(event.event_id, p.task_id, &p.reason, store, forge, config, cancel)
                .await
        }
        OutboxEventKind::SheetCreateRecord(p) => {
            handle_sheet_create_record(
                event.event_id,
                p.task_id,
                &p.table_ref,
                store,
                sheet,
                identity,
                cancel,
            )
            .await
        }
        OutboxEventKind::SheetUpdateRecord(p) => {
            handle_sheet_update_record(event.event_id, p.task_id, &p.fields, store, sheet, cancel).await
        }
        OutboxEventKind::ConvertForgeToSheet(p) => {
            handle_convert_forge_to_sheet(
                event.event_id,
                &p.forge_issue_ref,
                &p.table_ref,
                store,
                forge,
                cancel,
            )
            .await
        }
        OutboxEventKind::ConvertSheetToForge(p) => {
            handle_convert_sheet_to_forge(event.event_id, &p.sheet_record_ref, store, sheet, cancel)
                .await
        }
        OutboxEventKind::NotifyMember(p) => {
            handle_notify_member(event.event_id, p.member_id, &p.message, store, sheet, identity, cancel)
                .await
        }
    };

    match result {
        Ok(outcome) => outcome,
        Err(err) => {
            if err.is_retryable() {
                DispatchOutcome::Transient(err.to_string())
            } else {
                DispatchOutcome::Dead(err.to_string())
            }
        }
    }
}

type HandlerResult = Result<DispatchOutcome, forgesheet_domain::SyncError>;

async fn handle_forge_create_issue(
    event_id: uuid::Uuid,
    task_id: uuid::Uuid,
    store: &dyn Store,
    forge: &dyn ForgeGateway,
    identity: &dyn IdentityResolver,
    config: &Config,
    cancel: &CancellationToken,
) -> HandlerResult {
    let Some(task) = store.tasks().get(task_id).await? else {
        return Ok(DispatchOutcome::Dead(format!("task {task_id} not found")));
    };
    let mapping = store.mappings().get_by_task(task_id).await?;
    if let Some(existing) = &mapping {
        if existing.has_forge_binding() {
            // Already created — idempotent pre-check via mapping.
            store.outbox().mark_sent(event_id).await?;
            return Ok(DispatchOutcome::Sent);
        }
    }

    // Deterministic-lookup pre-check: a prior crash may have created the
    // issue successfully before the completion transaction committed.
    let title = mapper::title_with_prefix(task_id, &task.title);
    let found = forge
        .list_issues_since(&config.forge.repo, None, cancel)
        .await
        .map_err(forgesheet_domain::SyncError::from)?
        .into_iter()
        .find(|issue| issue.title == title);

    let issue_ref = if let Some(issue) = found {
        ForgeIssueRef { repo: config.forge.repo.clone(), number: issue.number }
    } else {
        let identity_view = identity_view_for(store, identity, &task).await?;
        let payload = mapper::task_to_forge_issue(&task, &identity_view);
        forge
            .create_issue(&config.forge.repo, &payload.title, &payload.body, &payload.labels, cancel)
            .await
            .map_err(forgesheet_domain::SyncError::from)?
    };

    let mut mapping = mapping.unwrap_or_else(|| Mapping::new(task_id));
    mapping.forge_issue_ref = Some(issue_ref);
    mapping.updated_at = Utc::now();
    commit_mapping_sent(store, event_id, mapping).await?;
    Ok(DispatchOutcome::Sent)
}

async fn handle_forge_update_issue(
    event_id: uuid::Uuid,
    task_id: uuid::Uuid,
    fields: &serde_json::Value,
    store: &dyn Store,
    forge: &dyn ForgeGateway,
    _config: &Config,
    cancel: &CancellationToken,
) -> HandlerResult {
    let Some(mapping) = store.mappings().get_by_task(task_id).await? else {
        return Ok(DispatchOutcome::Dead(format!("no mapping for task {task_id}")));
    };
    let Some(issue_ref) = &mapping.forge_issue_ref else {
        return Ok(DispatchOutcome::Transient("forge issue not yet created".to_string()));
    };
    forge
        .patch_issue(&issue_ref.repo, issue_ref.number, fields, cancel)
        .await
        .map_err(forgesheet_domain::SyncError::from)?;
    commit_audit_sent(
        store,
        event_id,
        AuditDirection::IntentToForge,
        "task",
        task_id,
        "forge update applied",
    )
    .await?;
    Ok(DispatchOutcome::Sent)
}

async fn handle_forge_close_issue(
    event_id: uuid::Uuid,
    task_id: uuid::Uuid,
    reason: &str,
    store: &dyn Store,
    forge: &dyn ForgeGateway,
    config: &Config,
    cancel: &CancellationToken,
) -> HandlerResult {
    let Some(mapping) = store.mappings().get_by_task(task_id).await? else {
        return Ok(DispatchOutcome::Dead(format!("no mapping for task {task_id}")));
    };
    let Some(issue_ref) = &mapping.forge_issue_ref else {
        return Ok(DispatchOutcome::Transient("forge issue not yet created".to_string()));
    };
    let _ = config;
    forge
        .close_issue(&issue_ref.repo, issue_ref.number, reason, cancel)
        .await
        .map_err(forgesheet_domain::SyncError::from)?;
    commit_audit_sent(
        store,
        event_id,
        AuditDirection::IntentToForge,
        "task",
        task_id,
        "forge issue closed",
    )
    .await?;
    Ok(DispatchOutcome::Sent)
}

async fn handle_sheet_create_record(
    event_id: uuid::Uuid,
    task_id: uuid::Uuid,
    table_ref: &(String, String),
    store: &dyn Store,
    sheet: &dyn SheetGateway,
    identity: &dyn IdentityResolver,
    cancel: &CancellationToken,
) -> HandlerResult {
    let Some(task) = store.tasks().get(task_id).await? else {
        return Ok(DispatchOutcome::Dead(format!("task {task_id} not found")));
    };
    let mapping = store.mappings().get_by_task(task_id).await?;
    if let Some(existing) = &mapping {
        if existing.has_sheet_binding() {
            store.outbox().mark_sent(event_id).await?;
            return Ok(DispatchOutcome::Sent);
        }
    }

    let (app_token, table_id) = table_ref;
    let Some(registry) = store.registry().get(app_token, table_id).await? else {
        return Ok(DispatchOutcome::Dead(format!("no registry entry for table {table_id}")));
    };

    let identity_view = identity_view_for(store, identity, &task).await?;
    let payload = mapper::task_to_sheet_record(&task, &registry, &identity_view);

    let key_field = registry.column_for("title").unwrap_or("Task Name");
    let key_value = mapper::title_with_prefix(task_id, &task.title);
    let found = sheet
        .search_record(app_token, table_id, key_field, &key_value, cancel)
        .await
        .map_err(forgesheet_domain::SyncError::from)?;

    let record_ref = if let Some(existing_ref) = found {
        existing_ref
    } else {
        sheet
            .create_record(app_token, table_id, &payload.fields, cancel)
            .await
            .map_err(forgesheet_domain::SyncError::from)?
    };

    let mapping = mapping.unwrap_or_else(|| Mapping::new(task_id));
    let mut updated = mapping;
    updated.sheet_record_ref = Some(record_ref);
    updated.updated_at = Utc::now();
    commit_mapping_sent(store, event_id, updated).await?;
    Ok(DispatchOutcome::Sent)
}

async fn handle_sheet_update_record(
    event_id: uuid::Uuid,
    task_id: uuid::Uuid,
    fields: &serde_json::Value,
    store: &dyn Store,
    sheet: &dyn SheetGateway,
    cancel: &CancellationToken,
) -> HandlerResult {
    let Some(mapping) = store.mappings().get_by_task(task_id).await? else {
        return Ok(DispatchOutcome::Dead(format!("no mapping for task {task_id}")));
    };
    let Some(record_ref) = &mapping.sheet_record_ref else {
        return Ok(DispatchOutcome::Transient("sheet record not yet created".to_string()));
    };
    sheet
        .update_record(&record_ref.app_token, &record_ref.table_id, &record_ref.record_id, fields, cancel)
        .await
        .map_err(forgesheet_domain::SyncError::from)?;
    commit_audit_sent(
        store,
        event_id,
        AuditDirection::IntentToSheet,
        "task",
        task_id,
        "sheet update applied",
    )
    .await?;
    Ok(DispatchOutcome::Sent)
}

async fn handle_convert_forge_to_sheet(
    event_id: uuid::Uuid,
    issue_ref: &ForgeIssueRef,
    table_ref: &(String, String),
    store: &dyn Store,
    forge: &dyn ForgeGateway,
    cancel: &CancellationToken,
) -> HandlerResult {
    let issue = forge
        .get_issue(&issue_ref.repo, issue_ref.number, cancel)
        .await
        .map_err(forgesheet_domain::SyncError::from)?;
    let existing = store.mappings().get_by_forge_ref(&issue_ref.repo, issue_ref.number).await?;
    let existing_task = match &existing {
        Some(m) => store.tasks().get(m.task_id).await?,
        None => None,
    };
    let (mut task, _) = mapper::forge_issue_to_task(&issue, existing_task.as_ref());
    task.source = TaskSource::ForgePull;
    task.target_table = Some(table_ref.1.clone());

    let mut mapping = existing.unwrap_or_else(|| Mapping::new(task.task_id));
    mapping.forge_issue_ref = Some(issue_ref.clone());
    mapping.sync_status = SyncStatus::Pending;
    mapping.updated_at = Utc::now();

    commit_conversion(
        store,
        event_id,
        task.clone(),
        mapping,
        OutboxEventKind::SheetCreateRecord(forgesheet_domain::SheetCreateRecordPayload {
            task_id: task.task_id,
            table_ref: table_ref.clone(),
        }),
    )
    .await?;
    Ok(DispatchOutcome::Sent)
}

async fn handle_convert_sheet_to_forge(
    event_id: uuid::Uuid,
    record_ref: &SheetRecordRef,
    store: &dyn Store,
    sheet: &dyn SheetGateway,
    cancel: &CancellationToken,
) -> HandlerResult {
    let record = sheet
        .get_record(&record_ref.app_token, &record_ref.table_id, &record_ref.record_id, cancel)
        .await
        .map_err(forgesheet_domain::SyncError::from)?;
    let Some(registry) = store.registry().get(&record_ref.app_token, &record_ref.table_id).await?
    else {
        return Ok(DispatchOutcome::Dead(format!(
            "no registry entry for table {}",
            record_ref.table_id
        )));
    };
    let existing = store
        .mappings()
        .get_by_sheet_ref(&record_ref.app_token, &record_ref.table_id, &record_ref.record_id)
        .await?;
    let existing_task = match &existing {
        Some(m) => store.tasks().get(m.task_id).await?,
        None => None,
    };
    let (mut task, _) = mapper::sheet_record_to_task(&record, &registry, existing_task.as_ref());
    task.source = TaskSource::SheetPull;

    let mut mapping = existing.unwrap_or_else(|| Mapping::new(task.task_id));
    mapping.sheet_record_ref = Some(record_ref.clone());
    mapping.sync_status = SyncStatus::Pending;
    mapping.updated_at = Utc::now();

    commit_conversion(
        store,
        event_id,
        task.clone(),
        mapping,
        OutboxEventKind::ForgeCreateIssue(forgesheet_domain::ForgeCreateIssuePayload {
            task_id: task.task_id,
        }),
    )
    .await?;
    Ok(DispatchOutcome::Sent)
}

async fn handle_notify_member(
    event_id: uuid::Uuid,
    member_id: Option<uuid::Uuid>,
    message: &str,
    store: &dyn Store,
    sheet: &dyn SheetGateway,
    identity: &dyn IdentityResolver,
    cancel: &CancellationToken,
) -> HandlerResult {
    let Some(member_id) = member_id else {
        tracing::warn!(message, "notifyMember with no member_id, dropping");
        store.outbox().mark_sent(event_id).await?;
        return Ok(DispatchOutcome::Sent);
    };
    let Some(member) = store.members().get(member_id).await? else {
        return Ok(DispatchOutcome::Dead(format!("member {member_id} not found")));
    };
    let Some(open_id) = &member.sheet_open_id else {
        return Ok(DispatchOutcome::Dead(format!("member {member_id} has no sheet open id")));
    };
    if let Err(err) = sheet.send_message(open_id, message, cancel).await {
        if matches!(err, GatewayError::NotFound) {
            // The cached open id no longer resolves on the sheet side —
            // drop it so the next resolve re-derives it from the contact
            // email instead of dead-lettering every future event for them.
            identity.invalidate(member_id).await?;
        }
        return Err(err.into());
    }
    store.outbox().mark_sent(event_id).await?;
    Ok(DispatchOutcome::Sent)
}

/// Commits a mapping create-or-update, this event's `mark_sent`, and an
/// audit entry in one transaction.
async fn commit_mapping_sent(
    store: &dyn Store,
    event_id: uuid::Uuid,
    mapping: Mapping,
) -> Result<(), forgesheet_domain::SyncError> {
    let audit = AuditEntry::new(
        AuditDirection::IntentToForge,
        "mapping",
        mapping.mapping_id,
        "sent",
        "external binding created",
    );
    store
        .transaction(Box::new(move |tx| {
            let exists = tx.mappings().get_by_task(mapping.task_id)?.is_some();
            if exists {
                tx.mappings().update(&mapping)?;
            } else {
                tx.mappings().create(&mapping)?;
            }
            tx.outbox().mark_sent(event_id)?;
            tx.audit().append(&audit)?;
            Ok(())
        }))
        .await
}

/// Commits this event's `mark_sent` and an audit entry in one transaction,
/// for handlers whose effect is a pure passthrough with no mapping/task
/// mutation of its own.
async fn commit_audit_sent(
    store: &dyn Store,
    event_id: uuid::Uuid,
    direction: AuditDirection,
    subject: &str,
    subject_id: uuid::Uuid,
    message: &str,
) -> Result<(), forgesheet_domain::SyncError> {
    let audit = AuditEntry::new(direction, subject, subject_id, "sent", message);
    store
        .transaction(Box::new(move |tx| {
            tx.outbox().mark_sent(event_id)?;
            tx.audit().append(&audit)?;
            Ok(())
        }))
        .await
}

/// Commits a task/mapping upsert, the enqueue of the opposite-direction
/// event the conversion produces, and this event's own `mark_sent` in one
/// transaction.
async fn commit_conversion(
    store: &dyn Store,
    event_id: uuid::Uuid,
    task: Task,
    mapping: Mapping,
    next_event_kind: OutboxEventKind,
) -> Result<(), forgesheet_domain::SyncError> {
    let next_event = OutboxEvent::new(next_event_kind, 5);
    store
        .transaction(Box::new(move |tx| {
            let task_exists = tx.tasks().get(task.task_id)?.is_some();
            if task_exists {
                tx.tasks().update(&task)?;
            } else {
                tx.tasks().create(&task)?;
            }
            let mapping_exists = tx.mappings().get_by_task(mapping.task_id)?.is_some();
            if mapping_exists {
                tx.mappings().update(&mapping)?;
            } else {
                tx.mappings().create(&mapping)?;
            }
            tx.outbox().enqueue(&next_event)?;
            tx.outbox().mark_sent(event_id)?;
            Ok(())
        }))
        .await
}
