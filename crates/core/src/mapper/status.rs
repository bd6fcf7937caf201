//! The internal status lattice's single source of truth for both wire
//! representations. `TaskStatus`'s own `Display`/`FromStr` (see
//! `forgesheet_domain::types::status`) cover only the internal lowercase
//! form used in the database; this module covers the forge's
//! `state`/`state_reason` pair and the sheet's literal status strings.

use forgesheet_domain::TaskStatus;

/// Translates an internal status to the forge's `(state, state_reason)`
/// pair. `ToDo` and `InProgress` both write `open` — the forge has no
/// separate "in progress" state, so the distinction only survives
/// internally and round-trips back out via `from_forge`'s tie-break.
pub fn to_forge(status: TaskStatus) -> (&'static str, Option<&'static str>) {
    match status {
        TaskStatus::ToDo | TaskStatus::InProgress => ("open", None),
        TaskStatus::Done => ("closed", Some("completed")),
        TaskStatus::Cancelled => ("closed", Some("not_planned")),
    }
}

/// Translates a forge `(state, state_reason)` pair back to an internal
/// status. `open` is ambiguous between `ToDo` and `InProgress`; the
/// existing task's status breaks the tie in favor of `InProgress` so a
/// task already being worked on doesn't silently revert to `ToDo` on
/// every pull.
pub fn from_forge(state: &str, state_reason: Option<&str>, existing: Option<TaskStatus>) -> TaskStatus {
    match (state, state_reason) {
        ("open", _) => {
            if existing == Some(TaskStatus::InProgress) {
                TaskStatus::InProgress
            } else {
                TaskStatus::ToDo
            }
        }
        ("closed", Some("not_planned")) => TaskStatus::Cancelled,
        ("closed", _) => TaskStatus::Done,
        _ => existing.unwrap_or(TaskStatus::ToDo),
    }
}

/// The sheet side's literal status-column strings.
pub fn to_sheet(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::ToDo => "To Do",
        TaskStatus::InProgress => "In Progress",
        TaskStatus::Done => "Done",
        TaskStatus::Cancelled => "Cancelled",
    }
}

/// Parses the sheet's status-column literal. Returns `None` for anything
/// outside the four recognized strings; the caller records the raw value in
/// the audit log and marks `syncStatus=conflict` without touching the local
/// status (spec's tie-break rule for statuses outside the lattice).
pub fn from_sheet(raw: &str) -> Option<TaskStatus> {
    match raw {
        "To Do" => Some(TaskStatus::ToDo),
        "In Progress" => Some(TaskStatus::InProgress),
        "Done" => Some(TaskStatus::Done),
        "Cancelled" => Some(TaskStatus::Cancelled),
        _ => None,
    }
}
