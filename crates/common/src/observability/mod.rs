//! Observability primitives - monitoring, metrics, and audit logging.
//!
//! This module consolidates the concerns shared across the sync crates:
//! - Performance metrics (metrics/)
//! - Trait abstractions for audit, metrics, and tracing (traits)
//!
//! Structured logging itself goes through `tracing`, configured once at
//! process startup in `forgesheet_infra::config`; this module only carries
//! the non-logging observability seams.

pub mod metrics;
pub mod traits;

pub use metrics::PerformanceMetrics;
pub use traits::{
    AuditLogEntry, AuditLogger, AuditSeverity, MetricsCollector, NoOpAuditLogger,
    NoOpMetricsCollector, NoOpTracer, TraceSpan, Tracer,
};
