//! Worker loops over the pure dispatch/reconcile decision logic in
//! `forgesheet_core`: the `OutboxDispatcher` drains the outbox, one
//! `Reconciler` per external source pulls changes back in.

mod dispatcher;
mod reconciler;

pub use dispatcher::{DispatcherConfig, OutboxDispatcher};
pub use reconciler::Reconciler;
