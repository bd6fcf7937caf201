//! Configuration structures for the synchronizer.
//!
//! Values are loaded once at startup (see `forgesheet_infra::config::load`)
//! into this immutable struct and injected into every component; nothing
//! reads the environment after startup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Full process configuration, assembled from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub forge: ForgeConfig,
    pub sheet: SheetConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
}

/// Forge (code-hosting issue tracker) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Bearer token used for all forge API calls.
    #[serde(skip_serializing)]
    pub token: String,
    pub base_url: String,
    pub owner: String,
    pub repo: String,
    pub api_version: String,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

/// Sheet (spreadsheet-database) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    #[serde(skip_serializing)]
    pub app_token: String,
    pub oauth_mode: SheetAuthMode,
    pub default_app_token: Option<String>,
    pub default_table_id: Option<String>,
    pub field_names: SheetFieldNames,
    /// The vendor-provided broker binary the `JsonRpcSheetGateway` spawns
    /// as a subprocess, plus any fixed arguments it needs.
    pub rpc_command: String,
    pub rpc_args: Vec<String>,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

/// How the sheet gateway authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetAuthMode {
    OAuthUser,
    TenantAppToken,
}

/// Overridable column names on the default registered sheet table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetFieldNames {
    pub title_field: String,
    pub status_field: String,
    pub assignee_field: String,
    pub forge_issue_field: String,
    pub last_sync_field: String,
}

impl Default for SheetFieldNames {
    fn default() -> Self {
        Self {
            title_field: "Task Name".to_string(),
            status_field: "Status".to_string(),
            assignee_field: "Assignee".to_string(),
            forge_issue_field: "GitHub Issue".to_string(),
            last_sync_field: "Last Synced".to_string(),
        }
    }
}

/// Local durable store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// Dispatcher/reconciler scheduling and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(with = "duration_secs")]
    pub reconcile_interval: Duration,
    pub dispatcher_batch_size: usize,
    pub dispatcher_workers: usize,
    pub retry_max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    #[serde(with = "duration_secs")]
    pub reclaim_threshold: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(300),
            dispatcher_batch_size: 50,
            dispatcher_workers: 4,
            retry_max_attempts: 5,
            backoff_base_ms: 500,
            backoff_cap_ms: 60_000,
            reclaim_threshold: Duration::from_secs(120),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
