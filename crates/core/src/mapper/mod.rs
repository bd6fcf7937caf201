//! The Field Mapper — pure, deterministic translation between forge-issue
//! shape, sheet-record shape, and the internal `Task` shape. No I/O; identity
//! resolution happens one layer up and is passed in as an `IdentityView`.

pub mod status;

mod convert;

pub use convert::{
    forge_issue_to_task, sheet_record_to_task, strip_prefix, task_to_forge_issue,
    task_to_sheet_record, title_with_prefix, ForgeIssuePayload, IdentityView, SheetRecordPayload,
};
