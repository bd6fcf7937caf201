//! Argument parsing and exit-code mapping for the `sync-cli` binary.
//! Subcommands mirror the Intent API one-for-one; the binary itself never
//! implements a business rule, it only parses, calls, and prints.

use std::collections::BTreeSet;

use clap::{Parser, Subcommand};
use forgesheet_domain::SyncError;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "sync-cli", about = "Forge/Sheet task synchronizer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a task and enqueue its forge-side creation.
    CreateTask {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        body: String,
        #[arg(long)]
        assignee_email: Option<String>,
        #[arg(long, value_delimiter = ',')]
        labels: Vec<String>,
        #[arg(long)]
        target_app_token: Option<String>,
        #[arg(long)]
        target_table_id: Option<String>,
        #[arg(long)]
        also_convert: bool,
    },
    /// Update a task's title, body, status, assignee, or labels.
    UpdateTask {
        #[arg(long)]
        task_id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        assignee_member_id: Option<Uuid>,
        #[arg(long, value_delimiter = ',')]
        labels: Option<Vec<String>>,
    },
    /// Close a task, writing its status and notifying both sides.
    CloseTask {
        #[arg(long)]
        task_id: Uuid,
        #[arg(long)]
        reason: String,
    },
    /// List tasks, optionally filtered by status or assignee.
    ListTasks {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        assignee_member_id: Option<Uuid>,
    },
    /// Convert a bare external object into a mapped task.
    #[command(subcommand)]
    Convert(ConvertCommand),
    /// Show a member's assigned tasks.
    MemberWork {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        member_id: Option<Uuid>,
    },
    /// Run the dispatcher and both reconcilers until a shutdown signal.
    Serve,
}

#[derive(Debug, Subcommand)]
pub enum ConvertCommand {
    /// Adopt an existing forge issue onto a sheet table.
    ForgeToSheet {
        #[arg(long)]
        repo: String,
        #[arg(long)]
        issue_number: i64,
        #[arg(long)]
        app_token: String,
        #[arg(long)]
        table_id: String,
    },
    /// Adopt an existing sheet record onto the forge.
    SheetToForge {
        #[arg(long)]
        app_token: String,
        #[arg(long)]
        table_id: String,
        #[arg(long)]
        record_id: String,
    },
}

pub fn parse_labels(labels: Vec<String>) -> BTreeSet<String> {
    labels.into_iter().filter(|l| !l.trim().is_empty()).collect()
}

/// Maps a `SyncError` to the process exit code spec'd for the CLI: 0
/// success, 64 invalid configuration, 65 unrecoverable auth failure, 70
/// internal error, 75 transient failure.
pub fn exit_code_for_error(err: &SyncError) -> i32 {
    match err {
        SyncError::Config(_) => 64,
        SyncError::Auth(_) => 65,
        SyncError::Transient(_) | SyncError::Network(_) => 75,
        SyncError::Validation(_) | SyncError::NotFound(_) | SyncError::Conflict(_) => 70,
        SyncError::Database(_) | SyncError::Internal(_) => 70,
    }
}
