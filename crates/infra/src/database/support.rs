//! Small shared helpers for the repository implementations: error mapping
//! from `rusqlite`/`r2d2`/`tokio::task::JoinError` into `SyncError`, and
//! JSON (de)serialization for the set/map-valued domain fields that don't
//! have their own columns.

use forgesheet_domain::{Result, SyncError};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn map_sql_error(err: rusqlite::Error) -> SyncError {
    SyncError::Database(err.to_string())
}

pub fn map_pool_error(err: r2d2::Error) -> SyncError {
    SyncError::Database(format!("connection pool error: {err}"))
}

pub fn map_join_error(err: tokio::task::JoinError) -> SyncError {
    SyncError::Internal(format!("blocking task panicked: {err}"))
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|err| SyncError::Internal(err.to_string()))
}

pub fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|err| SyncError::Internal(err.to_string()))
}

pub fn parse_enum<T: std::str::FromStr>(raw: &str, field: &str) -> Result<T> {
    raw.parse().map_err(|_| SyncError::Internal(format!("invalid {field} value: {raw}")))
}
