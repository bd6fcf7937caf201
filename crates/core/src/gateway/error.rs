//! The error taxonomy both gateways return, distinct from `SyncError`
//! because a gateway failure always needs to answer one question first:
//! should the dispatcher retry this, and if so when.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited, reset after {reset_after:?}")]
    RateLimited { reset_after: Duration },

    #[error("transient: {0}")]
    Transient(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// Whether the dispatcher should retry the event that produced this
    /// error rather than dead-lettering it immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::RateLimited { .. } | GatewayError::Transient(_))
    }
}

impl From<GatewayError> for forgesheet_domain::SyncError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unauthorized => forgesheet_domain::SyncError::Auth(err.to_string()),
            GatewayError::NotFound => forgesheet_domain::SyncError::NotFound(err.to_string()),
            GatewayError::Conflict(msg) => forgesheet_domain::SyncError::Conflict(msg),
            GatewayError::RateLimited { .. } => forgesheet_domain::SyncError::Transient(err.to_string()),
            GatewayError::Transient(msg) => forgesheet_domain::SyncError::Transient(msg),
            GatewayError::InvalidRequest(msg) => forgesheet_domain::SyncError::Validation(msg),
        }
    }
}
