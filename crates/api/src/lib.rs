//! # Forge/Sheet Intent API
//!
//! The library half of the synchronizer's "external collaborator" frontend:
//! [`intent::IntentApi`] is the only surface a caller needs to create,
//! update, close, and list tasks, convert a bare external object into a
//! mapped one, and manage Members — without ever awaiting a Gateway.
//!
//! The `sync-cli` binary (`src/main.rs`) wires this together with
//! `forgesheet_infra`'s adapters and worker loops; it is a thin frontend,
//! never a place business rules live.

pub mod intent;

pub use intent::{
    CreateMemberInput, CreateTaskInput, IntentApi, MemberIdentifier, MemberPatch, MemberWork,
    TaskFilter, TaskPatch,
};
