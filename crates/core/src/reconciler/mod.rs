//! Pull-side reconciliation decision logic, written against the ports only.
//! `forgesheet_infra::sync::reconciler` owns the actual polling loop
//! (interval/cron scheduling, gateway listing, cursor storage); this module
//! is the per-entity decision spec.md §4.5 step 3 describes.

use chrono::{DateTime, Utc};

/// What to do with one remote entity observed during a reconciliation tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileDecision {
    /// No local mapping found — treat as a brand-new task pulled from the
    /// remote side.
    NewFromRemote,
    /// The local copy changed more recently; the remote write is ignored —
    /// the pending local outbox event will catch the remote side up on its
    /// own, so nothing is written here.
    LocalWinsSilently,
    /// The remote copy changed more recently and nothing else changed
    /// locally since the last sync; apply the remote value and enqueue the
    /// opposite-direction event.
    RemoteWins,
    /// Both sides changed since the last sync and the values differ
    /// semantically; last-write-wins by `updated_at`, flagged for an
    /// operator notification.
    Conflict,
}

/// Decides what a reconciliation tick should do with one remote entity,
/// given the local and remote `updated_at` timestamps and whether the
/// mapped values differ semantically (decided by the caller, who has the
/// concrete task/record shapes this module intentionally stays agnostic
/// to).
pub fn decide(
    local_updated_at: Option<DateTime<Utc>>,
    remote_updated_at: DateTime<Utc>,
    last_synced_at: Option<DateTime<Utc>>,
    values_differ: bool,
) -> ReconcileDecision {
    let Some(local_updated_at) = local_updated_at else {
        return ReconcileDecision::NewFromRemote;
    };

    if !values_differ {
        return ReconcileDecision::RemoteWins;
    }

    let local_changed_since_sync = match last_synced_at {
        Some(synced) => local_updated_at > synced,
        None => true,
    };
    let remote_changed_since_sync = match last_synced_at {
        Some(synced) => remote_updated_at > synced,
        None => true,
    };

    if local_changed_since_sync && remote_changed_since_sync {
        return ReconcileDecision::Conflict;
    }

    if local_updated_at > remote_updated_at {
        ReconcileDecision::LocalWinsSilently
    } else {
        ReconcileDecision::RemoteWins
    }
}

/// The winning timestamp under last-write-wins, used both for the `Conflict`
/// branch's resolution and for advancing the sync cursor.
pub fn last_write_wins(local_updated_at: DateTime<Utc>, remote_updated_at: DateTime<Utc>) -> DateTime<Utc> {
    local_updated_at.max(remote_updated_at)
}
