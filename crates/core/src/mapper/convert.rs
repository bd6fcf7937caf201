use std::collections::BTreeSet;

use chrono::Utc;
use forgesheet_domain::{SheetTableRegistryEntry, Task, TaskPriority, TaskSource};
use serde_json::{json, Value};
use uuid::Uuid;

use super::status;
use crate::gateway::{ForgeIssue, SheetRecord};

const TITLE_PREFIX: &str = "[AUTO][task:";
const PRIORITY_LABEL_PREFIX: &str = "priority:";

/// The already-resolved per-side identity the mapper needs. Resolution
/// itself happens one layer up, through the Identity Resolver — the mapper
/// stays pure and I/O-free.
#[derive(Debug, Clone, Default)]
pub struct IdentityView {
    pub forge_username: Option<String>,
    pub sheet_open_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ForgeIssuePayload {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub state: &'static str,
    pub state_reason: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct SheetRecordPayload {
    pub fields: Value,
}

/// Builds the `[AUTO][task:<taskId>] <title>` convention used to recognize a
/// task's forge issue by deterministic lookup when no mapping ref exists yet.
pub fn title_with_prefix(task_id: Uuid, title: &str) -> String {
    format!("{TITLE_PREFIX}{task_id}] {title}")
}

/// Strips the `[AUTO][task:<id>]` prefix if present, returning the
/// recovered task id (if the prefix parses) and the remaining title.
pub fn strip_prefix(raw_title: &str) -> (Option<Uuid>, String) {
    let Some(rest) = raw_title.strip_prefix(TITLE_PREFIX) else {
        return (None, raw_title.to_string());
    };
    let Some(close) = rest.find(']') else {
        return (None, raw_title.to_string());
    };
    let (id_str, after) = rest.split_at(close);
    let task_id = id_str.parse::<Uuid>().ok();
    let title = after.trim_start_matches(']').trim_start().to_string();
    (task_id, title)
}

fn priority_label(priority: TaskPriority) -> String {
    format!("{PRIORITY_LABEL_PREFIX}{priority}")
}

fn priority_from_labels(labels: &[String]) -> Option<TaskPriority> {
    labels.iter().find_map(|l| {
        l.strip_prefix(PRIORITY_LABEL_PREFIX)
            .and_then(|level| level.parse::<TaskPriority>().ok())
    })
}

pub fn task_to_forge_issue(task: &Task, identity: &IdentityView) -> ForgeIssuePayload {
    let (state, state_reason) = status::to_forge(task.status);
    let mut labels: Vec<String> = task.labels.iter().cloned().collect();
    labels.push(priority_label(task.priority));

    ForgeIssuePayload {
        title: title_with_prefix(task.task_id, &task.title),
        body: task.body.clone(),
        labels,
        assignees: identity.forge_username.clone().into_iter().collect(),
        state,
        state_reason,
    }
}

pub fn task_to_sheet_record(
    task: &Task,
    registry: &SheetTableRegistryEntry,
    identity: &IdentityView,
) -> SheetRecordPayload {
    let mut fields = serde_json::Map::new();

    if let Some(col) = registry.column_for("title") {
        fields.insert(col.to_string(), json!(task.title));
    }
    if let Some(col) = registry.column_for("status") {
        fields.insert(col.to_string(), json!(status::to_sheet(task.status)));
    }
    if let Some(col) = registry.column_for("assignee") {
        let value = match &identity.sheet_open_id {
            Some(open_id) => json!([{ "id": open_id }]),
            None => Value::Null,
        };
        fields.insert(col.to_string(), value);
    }
    if let Some(col) = registry.column_for("priority") {
        fields.insert(col.to_string(), json!(task.priority.to_string()));
    }
    for label in &task.labels {
        if let Some(col) = registry.label_column_map.get(label) {
            fields.insert(col.clone(), json!(true));
        }
    }

    SheetRecordPayload { fields: Value::Object(fields) }
}

/// Converts a pulled forge issue into (or onto) a Task. `existing` supplies
/// the tie-break for ambiguous `open` status and the id/created_at to
/// preserve if this is an update rather than a fresh Task. Returns whether
/// the title had to be substituted with the `(untitled)` placeholder, so
/// the caller can suppress writing that placeholder back out.
pub fn forge_issue_to_task(issue: &ForgeIssue, existing: Option<&Task>) -> (Task, bool) {
    let (_, stripped_title) = strip_prefix(&issue.title);
    let (title, substituted) = if stripped_title.trim().is_empty() {
        ("(untitled)".to_string(), true)
    } else {
        (stripped_title, false)
    };

    let status = status::from_forge(
        &issue.state,
        issue.state_reason.as_deref(),
        existing.map(|t| t.status),
    );
    let priority = priority_from_labels(&issue.labels).unwrap_or(TaskPriority::Medium);
    let labels: BTreeSet<String> = issue
        .labels
        .iter()
        .filter(|l| !l.starts_with(PRIORITY_LABEL_PREFIX))
        .cloned()
        .collect();

    let task = Task {
        task_id: existing.map(|t| t.task_id).unwrap_or_else(Uuid::new_v4),
        title,
        body: issue.body.clone(),
        status,
        priority,
        source: TaskSource::ForgePull,
        assignee_member_id: existing.and_then(|t| t.assignee_member_id),
        labels,
        target_table: existing.and_then(|t| t.target_table.clone()),
        created_at: existing.map(|t| t.created_at).unwrap_or_else(Utc::now),
        updated_at: issue.updated_at,
    };
    (task, substituted)
}

/// Converts a pulled sheet record into (or onto) a Task. A status literal
/// outside the lattice yields `existing`'s status unchanged (`from_sheet`
/// returns `None`); the caller is responsible for marking
/// `syncStatus=conflict` and logging the raw value, since that's an audit
/// concern the mapper itself doesn't have access to.
pub fn sheet_record_to_task(
    record: &SheetRecord,
    registry: &SheetTableRegistryEntry,
    existing: Option<&Task>,
) -> (Task, bool) {
    let fields = record.fields.as_object();

    let title_raw = registry
        .column_for("title")
        .and_then(|col| fields.and_then(|f| f.get(col)))
        .and_then(Value::as_str)
        .unwrap_or("");
    let (title, substituted) = if title_raw.trim().is_empty() {
        ("(untitled)".to_string(), true)
    } else {
        (title_raw.to_string(), false)
    };

    let status_raw = registry
        .column_for("status")
        .and_then(|col| fields.and_then(|f| f.get(col)))
        .and_then(Value::as_str);
    let status = status_raw
        .and_then(status::from_sheet)
        .or_else(|| existing.map(|t| t.status))
        .unwrap_or(forgesheet_domain::TaskStatus::ToDo);

    let priority = registry
        .column_for("priority")
        .and_then(|col| fields.and_then(|f| f.get(col)))
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<TaskPriority>().ok())
        .unwrap_or(TaskPriority::Medium);

    let task = Task {
        task_id: existing.map(|t| t.task_id).unwrap_or_else(Uuid::new_v4),
        title,
        body: existing.map(|t| t.body.clone()).unwrap_or_default(),
        status,
        priority,
        source: TaskSource::SheetPull,
        assignee_member_id: existing.and_then(|t| t.assignee_member_id),
        labels: existing.map(|t| t.labels.clone()).unwrap_or_default(),
        target_table: existing.and_then(|t| t.target_table.clone()),
        created_at: existing.map(|t| t.created_at).unwrap_or_else(Utc::now),
        updated_at: record.updated_at,
    };
    (task, substituted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            task_id: Uuid::new_v4(),
            title: "Write docs".to_string(),
            body: "body".to_string(),
            status: forgesheet_domain::TaskStatus::ToDo,
            priority: TaskPriority::High,
            source: TaskSource::Intent,
            assignee_member_id: None,
            labels: BTreeSet::from(["bug".to_string()]),
            target_table: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn title_prefix_round_trips() {
        let id = Uuid::new_v4();
        let prefixed = title_with_prefix(id, "Write docs");
        let (recovered_id, title) = strip_prefix(&prefixed);
        assert_eq!(recovered_id, Some(id));
        assert_eq!(title, "Write docs");
    }

    #[test]
    fn strip_prefix_is_noop_on_plain_title() {
        let (id, title) = strip_prefix("Write docs");
        assert_eq!(id, None);
        assert_eq!(title, "Write docs");
    }

    #[test]
    fn task_to_forge_issue_encodes_priority_label() {
        let task = sample_task();
        let identity = IdentityView { forge_username: Some("a-gh".to_string()), sheet_open_id: None };
        let payload = task_to_forge_issue(&task, &identity);
        assert!(payload.labels.contains(&"priority:high".to_string()));
        assert_eq!(payload.assignees, vec!["a-gh".to_string()]);
        assert_eq!(payload.state, "open");
        assert!(payload.title.starts_with("[AUTO][task:"));
    }

    #[test]
    fn forge_issue_to_task_substitutes_untitled_for_empty_title() {
        let issue = ForgeIssue {
            number: 1,
            title: "".to_string(),
            body: String::new(),
            state: "open".to_string(),
            state_reason: None,
            labels: vec![],
            assignee_login: None,
            updated_at: Utc::now(),
        };
        let (task, substituted) = forge_issue_to_task(&issue, None);
        assert_eq!(task.title, "(untitled)");
        assert!(substituted);
    }

    #[test]
    fn forge_issue_to_task_preserves_in_progress_on_open() {
        let mut existing = sample_task();
        existing.status = forgesheet_domain::TaskStatus::InProgress;
        let issue = ForgeIssue {
            number: 1,
            title: title_with_prefix(existing.task_id, "Write docs"),
            body: String::new(),
            state: "open".to_string(),
            state_reason: None,
            labels: vec![],
            assignee_login: None,
            updated_at: Utc::now(),
        };
        let (task, _) = forge_issue_to_task(&issue, Some(&existing));
        assert_eq!(task.status, forgesheet_domain::TaskStatus::InProgress);
    }
}
