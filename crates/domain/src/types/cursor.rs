//! SyncCursor — per-source progress marker for the pull-side Reconciler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncSource {
    Forge,
    Sheet,
}

impl_domain_status_conversions!(SyncSource {
    Forge => "forge",
    Sheet => "sheet",
});

/// Opaque continuation state for one source's reconciliation pass.
///
/// `value` is whatever the gateway's list API considers a cursor (an RFC3339
/// "updated since" timestamp for the forge, a page/version token for the
/// sheet) — the Reconciler never parses it, only round-trips it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCursor {
    pub source: SyncSource,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl SyncCursor {
    pub fn new(source: SyncSource, value: String) -> Self {
        Self {
            source,
            value,
            updated_at: Utc::now(),
        }
    }
}
