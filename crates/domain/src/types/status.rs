//! The internal status lattice shared by both sync directions.

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// The closed set of internal task statuses.
///
/// This is the single source of truth mapped onto both the forge's
/// `state`/`state_reason` pair and the sheet's single-select status column.
/// See `forgesheet_core::mapper::status` for the bidirectional mapping
/// functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    ToDo,
    InProgress,
    Done,
    Cancelled,
}

impl_domain_status_conversions!(TaskStatus {
    ToDo => "todo",
    InProgress => "in_progress",
    Done => "done",
    Cancelled => "cancelled",
});
