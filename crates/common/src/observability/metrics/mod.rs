//! Metrics module for sync observability.
//!
//! Dispatcher/reconciler-specific counters live alongside their owning
//! components in `forgesheet_infra::sync` and `forgesheet_infra::scheduling`;
//! this module holds the generic, reusable shape.

/// Aggregate performance counters recorded by a long-running component.
#[derive(Debug, Default)]
pub struct PerformanceMetrics {
    // Placeholder for future expansion.
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}
