//! `CachingIdentityResolver` — read-through cache over the `members` table,
//! per spec.md §4.2: `forgeUsername` is supplied at Member creation time or
//! inferred from an existing mapping assignee and never independently
//! re-resolved here; `sheetOpenId` is resolved through the Sheet Gateway's
//! contact lookup and cached back onto the Member row.

use std::sync::Arc;

use async_trait::async_trait;
use forgesheet_core::gateway::SheetGateway;
use forgesheet_core::identity::{IdentityResolver, ResolvedIdentity};
use forgesheet_core::store::Store;
use forgesheet_domain::{Result, SyncError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct CachingIdentityResolver {
    store: Arc<dyn Store>,
    sheet: Arc<dyn SheetGateway>,
}

impl CachingIdentityResolver {
    pub fn new(store: Arc<dyn Store>, sheet: Arc<dyn SheetGateway>) -> Self {
        Self { store, sheet }
    }
}

#[async_trait]
impl IdentityResolver for CachingIdentityResolver {
    async fn resolve(&self, email: &str) -> Result<ResolvedIdentity> {
        let Some(member) = self.store.members().get_by_email(email).await? else {
            return Err(SyncError::NotFound(format!("no member with email {email}")));
        };

        if member.sheet_open_id.is_some() {
            return Ok(ResolvedIdentity {
                forge_username: member.forge_username.clone(),
                sheet_open_id: member.sheet_open_id.clone(),
            });
        }

        let cancel = CancellationToken::new();
        let resolved_open_id =
            self.sheet.resolve_contact_by_email(email, &cancel).await.map_err(SyncError::from)?;

        if let Some(open_id) = &resolved_open_id {
            let mut updated = member.clone();
            updated.sheet_open_id = Some(open_id.clone());
            updated.updated_at = chrono::Utc::now();
            self.store.members().update(&updated).await?;
        }

        Ok(ResolvedIdentity { forge_username: member.forge_username, sheet_open_id: resolved_open_id })
    }

    async fn invalidate(&self, member_id: Uuid) -> Result<()> {
        let Some(mut member) = self.store.members().get(member_id).await? else {
            return Ok(());
        };
        member.sheet_open_id = None;
        member.updated_at = chrono::Utc::now();
        self.store.members().update(&member).await
    }
}
