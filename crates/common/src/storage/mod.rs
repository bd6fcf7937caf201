//! Generic storage primitives shared by the infra crate's SQLite adapters.
//!
//! Connection pool setup itself (rusqlite + r2d2) lives in
//! `forgesheet_infra::database`; this module holds the backend-agnostic
//! pieces: configuration, error taxonomy, metrics, and trait seams.

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

pub use config::{StorageConfig, StorageConfigBuilder};
pub use error::{StorageError, StorageResult};
pub use metrics::StorageMetrics;
pub use types::{Connection, ConnectionPool, HealthStatus, PoolMetrics, Statement, Transaction};
