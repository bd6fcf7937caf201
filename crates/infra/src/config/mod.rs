//! Configuration loading from environment variables (+ optional `.env` via
//! `dotenvy`), grounded on the teacher's `config::loader` module. Unlike the
//! teacher, there is no file-based fallback here — the synchronizer runs as
//! a service/CLI where env vars are the natural source; missing required
//! keys fail fast at startup (exit code 64 for the CLI, see
//! `forgesheet_api::cli`).
//!
//! ## Environment variables
//! - `FORGESHEET_FORGE_TOKEN`, `FORGESHEET_FORGE_OWNER`, `FORGESHEET_FORGE_REPO`
//! - `FORGESHEET_SHEET_APP_TOKEN`, `FORGESHEET_SHEET_OAUTH_MODE` (`oauth_user` | `tenant_app_token`)
//! - `FORGESHEET_DB_PATH`, `FORGESHEET_DB_POOL_SIZE`
//! - `FORGESHEET_RECONCILE_INTERVAL_SECS`, `FORGESHEET_DISPATCHER_WORKERS`

use std::time::Duration;

use forgesheet_domain::{
    Config, DatabaseConfig, ForgeConfig, Result, SheetAuthMode, SheetConfig, SheetFieldNames,
    SyncConfig, SyncError,
};

/// Loads `.env` (if present) then assembles `Config` from the environment.
pub fn load() -> Result<Config> {
    if let Err(err) = dotenvy::dotenv() {
        tracing::debug!(%err, "no .env file loaded");
    }
    load_from_env()
}

fn load_from_env() -> Result<Config> {
    let forge = ForgeConfig {
        token: required_var("FORGESHEET_FORGE_TOKEN")?,
        base_url: optional_var("FORGESHEET_FORGE_BASE_URL", "https://api.github.com"),
        owner: required_var("FORGESHEET_FORGE_OWNER")?,
        repo: required_var("FORGESHEET_FORGE_REPO")?,
        api_version: optional_var("FORGESHEET_FORGE_API_VERSION", "2022-11-28"),
        request_timeout: Duration::from_secs(timeout_secs("FORGESHEET_FORGE_TIMEOUT_SECS", 30)?),
    };

    let oauth_mode = match optional_var("FORGESHEET_SHEET_OAUTH_MODE", "tenant_app_token").as_str()
    {
        "oauth_user" => SheetAuthMode::OAuthUser,
        "tenant_app_token" => SheetAuthMode::TenantAppToken,
        other => {
            return Err(SyncError::Config(format!(
                "invalid FORGESHEET_SHEET_OAUTH_MODE: {other}"
            )))
        }
    };

    let sheet = SheetConfig {
        app_token: required_var("FORGESHEET_SHEET_APP_TOKEN")?,
        oauth_mode,
        default_app_token: std::env::var("FORGESHEET_SHEET_DEFAULT_APP_TOKEN").ok(),
        default_table_id: std::env::var("FORGESHEET_SHEET_DEFAULT_TABLE_ID").ok(),
        field_names: SheetFieldNames::default(),
        rpc_command: optional_var("FORGESHEET_SHEET_RPC_COMMAND", "sheet-bridge"),
        rpc_args: std::env::var("FORGESHEET_SHEET_RPC_ARGS")
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        request_timeout: Duration::from_secs(timeout_secs("FORGESHEET_SHEET_TIMEOUT_SECS", 30)?),
    };

    let database = DatabaseConfig {
        path: optional_var("FORGESHEET_DB_PATH", "forgesheet.db"),
        pool_size: parsed_var("FORGESHEET_DB_POOL_SIZE", 8)?,
    };

    let mut sync = SyncConfig::default();
    if let Ok(secs) = std::env::var("FORGESHEET_RECONCILE_INTERVAL_SECS") {
        sync.reconcile_interval = Duration::from_secs(
            secs.parse()
                .map_err(|e| SyncError::Config(format!("invalid reconcile interval: {e}")))?,
        );
    }
    if let Ok(workers) = std::env::var("FORGESHEET_DISPATCHER_WORKERS") {
        sync.dispatcher_workers = workers
            .parse()
            .map_err(|e| SyncError::Config(format!("invalid dispatcher worker count: {e}")))?;
    }

    Ok(Config { forge, sheet, database, sync })
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| SyncError::Config(format!("missing required env var {name}")))
}

fn optional_var(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| SyncError::Config(format!("invalid {name}"))),
        Err(_) => Ok(default),
    }
}

fn timeout_secs(name: &str, default: u64) -> Result<u64> {
    parsed_var(name, default)
}
