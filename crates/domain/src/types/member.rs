//! Member — canonical identity shared across both external stores.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRole {
    Admin,
    Manager,
    Developer,
    Designer,
    Qa,
    Member,
}

impl_domain_status_conversions!(MemberRole {
    Admin => "admin",
    Manager => "manager",
    Developer => "developer",
    Designer => "designer",
    Qa => "qa",
    Member => "member",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    Active,
    Inactive,
}

impl_domain_status_conversions!(MemberStatus {
    Active => "active",
    Inactive => "inactive",
});

/// A person whose work is tracked across the forge and the sheet.
///
/// `email` is the stable identity key: two Members never share an email, and
/// a Member is never hard-deleted — `status` is set to `Inactive` instead so
/// historical Task/Mapping rows keep a valid `assigneeMemberId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub member_id: Uuid,
    pub email: String,
    pub forge_username: Option<String>,
    pub sheet_open_id: Option<String>,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub table_assignments: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}
