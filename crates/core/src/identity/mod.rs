//! Identity Resolver — maps a Member's email to the per-side identifiers the
//! mapper needs (`assigneeLogin` on the forge, an open id on the sheet).

use async_trait::async_trait;
use forgesheet_domain::Result;
use uuid::Uuid;

/// The resolved per-side identifiers for one Member, as of the last
/// resolution. Either field may be `None` if that side has no linked
/// identity yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub forge_username: Option<String>,
    pub sheet_open_id: Option<String>,
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, email: &str) -> Result<ResolvedIdentity>;

    /// Forces re-resolution on the next `resolve` call for this Member,
    /// called when a Gateway reports `NotFound` for a previously cached id.
    async fn invalidate(&self, member_id: Uuid) -> Result<()>;
}
