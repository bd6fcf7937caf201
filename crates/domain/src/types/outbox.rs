//! OutboxEvent — a durable intent to perform an external side-effect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mapping::{ForgeIssueRef, SheetRecordRef};
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    Pending,
    Processing,
    Sent,
    Failed,
    Dead,
}

impl_domain_status_conversions!(OutboxStatus {
    Pending => "pending",
    Processing => "processing",
    Sent => "sent",
    Failed => "failed",
    Dead => "dead",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeCreateIssuePayload {
    pub task_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeUpdateIssuePayload {
    pub task_id: Uuid,
    /// Patch fields, already mapper-translated to forge wire names.
    pub fields: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeCloseIssuePayload {
    pub task_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetCreateRecordPayload {
    pub task_id: Uuid,
    pub table_ref: (String, String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetUpdateRecordPayload {
    pub task_id: Uuid,
    pub fields: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertForgeToSheetPayload {
    pub forge_issue_ref: ForgeIssueRef,
    pub table_ref: (String, String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertSheetToForgePayload {
    pub sheet_record_ref: SheetRecordRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyMemberPayload {
    pub member_id: Option<Uuid>,
    pub message: String,
}

/// The tagged variant the dispatcher is a total function over. Adding a new
/// kind means adding one variant here and one handler branch in
/// `forgesheet_infra::sync::dispatcher`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum OutboxEventKind {
    ForgeCreateIssue(ForgeCreateIssuePayload),
    ForgeUpdateIssue(ForgeUpdateIssuePayload),
    ForgeCloseIssue(ForgeCloseIssuePayload),
    SheetCreateRecord(SheetCreateRecordPayload),
    SheetUpdateRecord(SheetUpdateRecordPayload),
    ConvertForgeToSheet(ConvertForgeToSheetPayload),
    ConvertSheetToForge(ConvertSheetToForgePayload),
    NotifyMember(NotifyMemberPayload),
}

impl OutboxEventKind {
    /// The Task this event pertains to, if any — used by the claim query's
    /// per-task exclusivity predicate. `NotifyMember` has no associated Task
    /// and is therefore never serialized against another event.
    pub fn task_id(&self) -> Option<Uuid> {
        match self {
            OutboxEventKind::ForgeCreateIssue(p) => Some(p.task_id),
            OutboxEventKind::ForgeUpdateIssue(p) => Some(p.task_id),
            OutboxEventKind::ForgeCloseIssue(p) => Some(p.task_id),
            OutboxEventKind::SheetCreateRecord(p) => Some(p.task_id),
            OutboxEventKind::SheetUpdateRecord(p) => Some(p.task_id),
            OutboxEventKind::ConvertForgeToSheet(_) => None,
            OutboxEventKind::ConvertSheetToForge(_) => None,
            OutboxEventKind::NotifyMember(_) => None,
        }
    }

    /// Stable name used for logging/metrics labels.
    pub fn label(&self) -> &'static str {
        match self {
            OutboxEventKind::ForgeCreateIssue(_) => "forge_create_issue",
            OutboxEventKind::ForgeUpdateIssue(_) => "forge_update_issue",
            OutboxEventKind::ForgeCloseIssue(_) => "forge_close_issue",
            OutboxEventKind::SheetCreateRecord(_) => "sheet_create_record",
            OutboxEventKind::SheetUpdateRecord(_) => "sheet_update_record",
            OutboxEventKind::ConvertForgeToSheet(_) => "convert_forge_to_sheet",
            OutboxEventKind::ConvertSheetToForge(_) => "convert_sheet_to_forge",
            OutboxEventKind::NotifyMember(_) => "notify_member",
        }
    }
}

/// A durable, at-most-one-effect intent to mutate an external store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub event_id: Uuid,
    pub kind: OutboxEventKind,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub not_before: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Set when a worker claims the event; used to detect and reclaim stale
    /// `processing` rows after a crash (see spec.md §5 reclaim threshold).
    pub claimed_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    pub fn new(kind: OutboxEventKind, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            event_id: Uuid::new_v4(),
            kind,
            status: OutboxStatus::Pending,
            attempts: 0,
            max_attempts,
            last_error: None,
            not_before: now,
            created_at: now,
            claimed_at: None,
        }
    }
}
