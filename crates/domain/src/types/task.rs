//! Task — the local record of a work item.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::TaskStatus;
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl_domain_status_conversions!(TaskPriority {
    Critical => "critical",
    High => "high",
    Medium => "medium",
    Low => "low",
});

/// Which side a Task's current state most recently originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskSource {
    Intent,
    ForgePull,
    SheetPull,
}

impl_domain_status_conversions!(TaskSource {
    Intent => "intent",
    ForgePull => "forge_pull",
    SheetPull => "sheet_pull",
});

/// The local durable record of a work item.
///
/// Every mutation must increment `updated_at` and have its prior state
/// recorded in the audit log by the caller — `Task` itself carries no
/// history, it is the repository's job to snapshot before overwrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub title: String,
    pub body: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub source: TaskSource,
    pub assignee_member_id: Option<Uuid>,
    pub labels: BTreeSet<String>,
    pub target_table: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// True when pulling this task in from an external store required the
    /// `(untitled)` placeholder because the remote title was empty. Callers
    /// use this to suppress writing the placeholder back out.
    pub fn has_placeholder_title(&self) -> bool {
        self.title == "(untitled)"
    }
}
