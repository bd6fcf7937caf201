//! The Intent API — the frontend-facing surface that never touches a
//! Gateway. Every mutating call commits one `Store::transaction` and
//! enqueues whatever outbox events the change implies; user-visible success
//! is the local commit, external effect is eventual.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use forgesheet_core::mapper::{self, IdentityView};
use forgesheet_core::store::Store;
use forgesheet_domain::{
    ConvertForgeToSheetPayload, ConvertSheetToForgePayload, ForgeCloseIssuePayload,
    ForgeCreateIssuePayload, ForgeIssueRef, ForgeUpdateIssuePayload, Mapping, Member, MemberRole,
    MemberStatus, OutboxEvent, OutboxEventKind, Result, SheetCreateRecordPayload, SheetRecordRef,
    SheetUpdateRecordPayload, SyncError, Task, TaskPriority, TaskSource, TaskStatus,
};
use serde_json::{json, Value};
use uuid::Uuid;

/// Input for [`IntentApi::create_task`].
#[derive(Debug, Clone, Default)]
pub struct CreateTaskInput {
    pub title: String,
    pub body: String,
    pub assignee_email: Option<String>,
    pub labels: BTreeSet<String>,
    pub target_table: Option<(String, String)>,
    /// When set and `target_table` is given, a `SheetCreateRecord` event is
    /// enqueued alongside the forge create, mirroring the task onto both
    /// stores immediately instead of leaving the sheet side for a later
    /// manual `convert_forge_to_sheet`.
    pub also_convert: bool,
}

/// A partial update to a [`Task`]; `None` fields are left unchanged.
/// `assignee_member_id: Some(None)` clears the assignee.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_member_id: Option<Option<Uuid>>,
    pub labels: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee_member_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum MemberIdentifier {
    Id(Uuid),
    Email(String),
}

#[derive(Debug, Clone)]
pub struct MemberWork {
    pub member: Member,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone)]
pub struct CreateMemberInput {
    pub email: String,
    pub forge_username: Option<String>,
    pub role: MemberRole,
    pub table_assignments: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemberPatch {
    pub email: Option<String>,
    pub forge_username: Option<Option<String>>,
    pub role: Option<MemberRole>,
    pub table_assignments: Option<BTreeSet<String>>,
}

/// Mirrors `forgesheet_infra::sync::reconciler`'s private `forge_patch_value`
/// helper: translates a `Task` into the raw patch body
/// `OutboxEventKind::ForgeUpdateIssue` carries. Kept local rather than
/// shared because the two crates sit on either side of the core/infra
/// boundary and neither depends on the other's internals.
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

/// The Intent API. Holds only a `Store` handle — no Gateway, no
/// `IdentityResolver` — so none of its methods can block on network I/O.
pub struct IntentApi {
    store: Arc<dyn Store>,
}

impl IntentApi {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn require_member_by_email(&self, email: &str) -> Result<Member> {
        self.store
            .members()
            .get_by_email(email)
            .await?
            .ok_or_else(|| SyncError::Validation(format!("no member with email {email}")))
    }

    /// Builds an `IdentityView` straight from the Member row, without
    /// resolving an unpopulated `sheet_open_id` through a Gateway — that
    /// resolution is the Identity Resolver's job, which the Intent API
    /// deliberately never reaches.
    async fn cached_identity_view(&self, assignee_member_id: Option<Uuid>) -> Result<IdentityView> {
        let Some(member_id) = assignee_member_id else {
            return Ok(IdentityView::default());
        };
        let Some(member) = self.store.members().get(member_id).await? else {
            return Ok(IdentityView::default());
        };
        Ok(IdentityView { forge_username: member.forge_username, sheet_open_id: member.sheet_open_id })
    }

    pub async fn create_task(&self, input: CreateTaskInput) -> Result<Uuid> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(SyncError::Validation("task title must not be empty".to_string()));
        }
        let assignee_member_id = match &input.assignee_email {
            Some(email) => Some(self.require_member_by_email(email).await?.member_id),
            None => None,
        };
        if let Some((app_token, table_id)) = &input.target_table {
            if self.store.registry().get(app_token, table_id).await?.is_none() {
                return Err(SyncError::Validation(format!(
                    "unknown sheet table {app_token}/{table_id}"
                )));
            }
        }

        let now = Utc::now();
        let task = Task {
            task_id: Uuid::new_v4(),
            title: title.to_string(),
            body: input.body,
            status: TaskStatus::ToDo,
            priority: TaskPriority::Medium,
            source: TaskSource::Intent,
            assignee_member_id,
            labels: input.labels,
            target_table: input.target_table.as_ref().map(|(_, table_id)| table_id.clone()),
            created_at: now,
            updated_at: now,
        };
        let mapping = Mapping::new(task.task_id);
        let task_id = task.task_id;

        let forge_event =
            OutboxEvent::new(OutboxEventKind::ForgeCreateIssue(ForgeCreateIssuePayload { task_id }), 5);
        let sheet_event = if input.also_convert {
            input.target_table.map(|table_ref| {
                OutboxEvent::new(
                    OutboxEventKind::SheetCreateRecord(SheetCreateRecordPayload { task_id, table_ref }),
                    5,
                )
            })
        } else {
            None
        };

        self.store
            .transaction(Box::new(move |tx| {
                tx.tasks().create(&task)?;
                tx.mappings().create(&mapping)?;
                tx.outbox().enqueue(&forge_event)?;
                if let Some(event) = &sheet_event {
                    tx.outbox().enqueue(event)?;
                }
                Ok(())
            }))
            .await?;

        Ok(task_id)
    }

    pub async fn update_task(&self, task_id: Uuid, patch: TaskPatch) -> Result<()> {
        let Some(current) = self.store.tasks().get(task_id).await? else {
            return Err(SyncError::NotFound(format!("task {task_id} not found")));
        };
        let Some(mapping) = self.store.mappings().get_by_task(task_id).await? else {
            return Err(SyncError::Internal(format!("task {task_id} has no mapping")));
        };
        if let Some(Some(member_id)) = patch.assignee_member_id {
            if self.store.members().get(member_id).await?.is_none() {
                return Err(SyncError::Validation(format!("unknown member {member_id}")));
            }
        }

        let mut updated = current.clone();
        let mut changed = false;
        if let Some(title) = patch.title {
            if title != updated.title {
                updated.title = title;
                changed = true;
            }
        }
        if let Some(body) = patch.body {
            if body != updated.body {
                updated.body = body;
                changed = true;
            }
        }
        if let Some(status) = patch.status {
            changed |= status != updated.status;
            updated.status = status;
        }
        if let Some(priority) = patch.priority {
            changed |= priority != updated.priority;
            updated.priority = priority;
        }
        if let Some(assignee) = patch.assignee_member_id {
            changed |= assignee != updated.assignee_member_id;
            updated.assignee_member_id = assignee;
        }
        if let Some(labels) = patch.labels {
            changed |= labels != updated.labels;
            updated.labels = labels;
        }

        if !changed {
            return Ok(());
        }
        updated.updated_at = Utc::now();

        let identity_view = self.cached_identity_view(updated.assignee_member_id).await?;
        let registry = self.store.registry().get_default().await?;

        let forge_event = mapping.has_forge_binding().then(|| {
            OutboxEvent::new(
                OutboxEventKind::ForgeUpdateIssue(ForgeUpdateIssuePayload {
                    task_id,
                    fields: forge_patch_value(&updated, &identity_view),
                }),
                5,
            )
        });
        let sheet_event = match (mapping.has_sheet_binding(), &registry) {
            (true, Some(registry)) => Some(OutboxEvent::new(
                OutboxEventKind::SheetUpdateRecord(SheetUpdateRecordPayload {
                    task_id,
                    fields: mapper::task_to_sheet_record(&updated, registry, &identity_view).fields,
                }),
                5,
            )),
            _ => None,
        };

        self.store
            .transaction(Box::new(move |tx| {
                tx.tasks().update(&updated)?;
                if let Some(event) = &forge_event {
                    tx.outbox().enqueue(event)?;
                }
                if let Some(event) = &sheet_event {
                    tx.outbox().enqueue(event)?;
                }
                Ok(())
            }))
            .await
    }

    pub async fn close_task(&self, task_id: Uuid, reason: String) -> Result<()> {
        let Some(mut task) = self.store.tasks().get(task_id).await? else {
            return Err(SyncError::NotFound(format!("task {task_id} not found")));
        };
        let Some(mapping) = self.store.mappings().get_by_task(task_id).await? else {
            return Err(SyncError::Internal(format!("task {task_id} has no mapping")));
        };
        task.status = TaskStatus::Done;
        task.updated_at = Utc::now();

        let identity_view = self.cached_identity_view(task.assignee_member_id).await?;
        let registry = self.store.registry().get_default().await?;

        let forge_event = mapping.has_forge_binding().then(|| {
            OutboxEvent::new(
                OutboxEventKind::ForgeCloseIssue(ForgeCloseIssuePayload { task_id, reason: reason.clone() }),
                5,
            )
        });
        let sheet_event = match (mapping.has_sheet_binding(), &registry) {
            (true, Some(registry)) => Some(OutboxEvent::new(
                OutboxEventKind::SheetUpdateRecord(SheetUpdateRecordPayload {
                    task_id,
                    fields: mapper::task_to_sheet_record(&task, registry, &identity_view).fields,
                }),
                5,
            )),
            _ => None,
        };

        self.store
            .transaction(Box::new(move |tx| {
                tx.tasks().update(&task)?;
                if let Some(event) = &forge_event {
                    tx.outbox().enqueue(event)?;
                }
                if let Some(event) = &sheet_event {
                    tx.outbox().enqueue(event)?;
                }
                Ok(())
            }))
            .await
    }

    pub async fn convert_forge_to_sheet(
        &self,
        forge_issue_ref: ForgeIssueRef,
        table_ref: (String, String),
    ) -> Result<()> {
        if self.store.registry().get(&table_ref.0, &table_ref.1).await?.is_none() {
            return Err(SyncError::Validation(format!(
                "unknown sheet table {}/{}",
                table_ref.0, table_ref.1
            )));
        }
        if self
            .store
            .mappings()
            .get_by_forge_ref(&forge_issue_ref.repo, forge_issue_ref.number)
            .await?
            .is_some()
        {
            return Err(SyncError::Validation(format!(
                "forge issue {}#{} is already mapped",
                forge_issue_ref.repo, forge_issue_ref.number
            )));
        }
        self.store
            .outbox()
            .enqueue(&OutboxEvent::new(
                OutboxEventKind::ConvertForgeToSheet(ConvertForgeToSheetPayload {
                    forge_issue_ref,
                    table_ref,
                }),
                5,
            ))
            .await
    }

    pub async fn convert_sheet_to_forge(&self, sheet_record_ref: SheetRecordRef) -> Result<()> {
        if self
            .store
            .mappings()
            .get_by_sheet_ref(
                &sheet_record_ref.app_token,
                &sheet_record_ref.table_id,
                &sheet_record_ref.record_id,
            )
            .await?
            .is_some()
        {
            return Err(SyncError::Validation("sheet record is already mapped".to_string()));
        }
        self.store
            .outbox()
            .enqueue(&OutboxEvent::new(
                OutboxEventKind::ConvertSheetToForge(ConvertSheetToForgePayload { sheet_record_ref }),
                5,
            ))
            .await
    }

    pub async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let tasks = match filter.assignee_member_id {
            Some(member_id) => self.store.tasks().list_by_assignee(member_id).await?,
            None => self.store.tasks().list().await?,
        };
        Ok(tasks.into_iter().filter(|t| filter.status.map_or(true, |s| t.status == s)).collect())
    }

    pub async fn get_member_work(&self, identifier: MemberIdentifier) -> Result<MemberWork> {
        let member = match identifier {
            MemberIdentifier::Id(id) => self.store.members().get(id).await?,
            MemberIdentifier::Email(email) => self.store.members().get_by_email(&email).await?,
        };
        let Some(member) = member else {
            return Err(SyncError::NotFound("member not found".to_string()));
        };
        let tasks = self.store.tasks().list_by_assignee(member.member_id).await?;
        Ok(MemberWork { member, tasks })
    }

    pub async fn create_member(&self, input: CreateMemberInput) -> Result<Uuid> {
        if self.store.members().get_by_email(&input.email).await?.is_some() {
            return Err(SyncError::Validation(format!(
                "member with email {} already exists",
                input.email
            )));
        }
        let now = Utc::now();
        let member = Member {
            member_id: Uuid::new_v4(),
            email: input.email,
            forge_username: input.forge_username,
            sheet_open_id: None,
            role: input.role,
            status: MemberStatus::Active,
            table_assignments: input.table_assignments,
            created_at: now,
            updated_at: now,
        };
        self.store.members().create(&member).await?;
        Ok(member.member_id)
    }

    pub async fn update_member(&self, member_id: Uuid, patch: MemberPatch) -> Result<()> {
        let Some(mut member) = self.store.members().get(member_id).await? else {
            return Err(SyncError::NotFound(format!("member {member_id} not found")));
        };
        if let Some(email) = &patch.email {
            if email != &member.email && self.store.members().get_by_email(email).await?.is_some() {
                return Err(SyncError::Validation(format!("member with email {email} already exists")));
            }
            member.email = email.clone();
        }
        if let Some(role) = patch.role {
            member.role = role;
        }
        if let Some(forge_username) = patch.forge_username {
            member.forge_username = forge_username;
        }
        if let Some(table_assignments) = patch.table_assignments {
            member.table_assignments = table_assignments;
        }
        member.updated_at = Utc::now();
        self.store.members().update(&member).await
    }

    pub async fn deactivate_member(&self, member_id: Uuid) -> Result<()> {
        let Some(mut member) = self.store.members().get(member_id).await? else {
            return Err(SyncError::NotFound(format!("member {member_id} not found")));
        };
        member.status = MemberStatus::Inactive;
        member.updated_at = Utc::now();
        self.store.members().update(&member).await
    }

    pub async fn get_member(&self, member_id: Uuid) -> Result<Option<Member>> {
        self.store.members().get(member_id).await
    }

    pub async fn list_members(&self) -> Result<Vec<Member>> {
        self.store.members().list().await
    }
}
