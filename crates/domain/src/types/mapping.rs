//! Mapping — the durable bridge between one Task and its external bindings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_domain_status_conversions;

/// Identifies one issue on the forge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeIssueRef {
    pub repo: String,
    pub number: i64,
}

/// Identifies one record on the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRecordRef {
    pub app_token: String,
    pub table_id: String,
    pub record_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Synced,
    Pending,
    Conflict,
    Error,
}

impl_domain_status_conversions!(SyncStatus {
    Synced => "synced",
    Pending => "pending",
    Conflict => "conflict",
    Error => "error",
});

/// The bridge between one local Task and up to one binding per external
/// store.
///
/// Once a reference is set it is immutable for the Task's lifetime — it is
/// how the dispatcher/reconciler finds the external row again, and changing
/// it out from under a Task would orphan whatever external object it used to
/// point at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mapping {
    pub mapping_id: Uuid,
    pub task_id: Uuid,
    pub forge_issue_ref: Option<ForgeIssueRef>,
    pub sheet_record_ref: Option<SheetRecordRef>,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mapping {
    pub fn new(task_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            mapping_id: Uuid::new_v4(),
            task_id,
            forge_issue_ref: None,
            sheet_record_ref: None,
            sync_status: SyncStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_forge_binding(&self) -> bool {
        self.forge_issue_ref.is_some()
    }

    pub fn has_sheet_binding(&self) -> bool {
        self.sheet_record_ref.is_some()
    }
}
