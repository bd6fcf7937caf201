//! AuditEntry — an append-only record of a sync decision or mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_domain_status_conversions;

/// Which way the recorded effect flowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditDirection {
    IntentToForge,
    IntentToSheet,
    ForgeToLocal,
    SheetToLocal,
    Internal,
}

impl_domain_status_conversions!(AuditDirection {
    IntentToForge => "intent_to_forge",
    IntentToSheet => "intent_to_sheet",
    ForgeToLocal => "forge_to_local",
    SheetToLocal => "sheet_to_local",
    Internal => "internal",
});

/// One line of the append-only trail used to explain "why does this Task
/// look like this" after the fact. Never updated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: Uuid,
    pub direction: AuditDirection,
    /// What kind of thing this entry is about, e.g. `"task"`, `"mapping"`.
    pub subject: String,
    pub subject_id: Uuid,
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        direction: AuditDirection,
        subject: impl Into<String>,
        subject_id: Uuid,
        status: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            direction,
            subject: subject.into(),
            subject_id,
            status: status.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
