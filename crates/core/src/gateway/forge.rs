use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgesheet_domain::ForgeIssueRef;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::error::GatewayError;

/// The minimal view of a forge issue the mapper/reconciler need — already
/// normalized away from the forge's own wire shape.
#[derive(Debug, Clone)]
pub struct ForgeIssue {
    pub number: i64,
    pub title: String,
    pub body: String,
    pub state: String,
    pub state_reason: Option<String>,
    pub labels: Vec<String>,
    pub assignee_login: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Port over the hosted forge's issue-tracker REST API.
#[async_trait]
pub trait ForgeGateway: Send + Sync {
    async fn create_issue(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        labels: &[String],
        cancel: &CancellationToken,
    ) -> Result<ForgeIssueRef, GatewayError>;

    async fn get_issue(
        &self,
        repo: &str,
        number: i64,
        cancel: &CancellationToken,
    ) -> Result<ForgeIssue, GatewayError>;

    async fn patch_issue(
        &self,
        repo: &str,
        number: i64,
        fields: &Value,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError>;

    async fn close_issue(
        &self,
        repo: &str,
        number: i64,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError>;

    /// Lists issues updated since `since` (inclusive), for the Reconciler's
    /// pull pass. `since = None` means a full scan.
    async fn list_issues_since(
        &self,
        repo: &str,
        since: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ForgeIssue>, GatewayError>;

    async fn add_comment(
        &self,
        repo: &str,
        number: i64,
        body: &str,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError>;
}
