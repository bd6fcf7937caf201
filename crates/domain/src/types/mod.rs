//! Domain entity types, one module per entity family.

mod audit;
mod cursor;
mod mapping;
mod member;
mod outbox;
mod registry;
mod status;
mod task;

pub use audit::{AuditDirection, AuditEntry};
pub use cursor::{SyncCursor, SyncSource};
pub use mapping::{ForgeIssueRef, Mapping, SheetRecordRef, SyncStatus};
pub use member::{Member, MemberRole, MemberStatus};
pub use outbox::{
    ConvertForgeToSheetPayload, ConvertSheetToForgePayload, ForgeCloseIssuePayload,
    ForgeCreateIssuePayload, ForgeUpdateIssuePayload, NotifyMemberPayload, OutboxEvent,
    OutboxEventKind, OutboxStatus, SheetCreateRecordPayload, SheetUpdateRecordPayload,
};
pub use registry::SheetTableRegistryEntry;
pub use status::TaskStatus;
pub use task::{Task, TaskPriority, TaskSource};
