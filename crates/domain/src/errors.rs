//! Error types used throughout the synchronizer

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the synchronizer.
///
/// Mirrors the error taxonomy the Dispatcher uses to choose retry vs.
/// dead-letter (see `Transient` vs. the rest): gateways and the store
/// surface one of these variants, never a raw string.
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SyncError {
    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether the dispatcher should retry the operation that produced this
    /// error, as opposed to dead-lettering it immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transient(_) | SyncError::Network(_))
    }
}

/// Result type alias for synchronizer operations
pub type Result<T> = std::result::Result<T, SyncError>;
