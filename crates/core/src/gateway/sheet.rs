use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgesheet_domain::SheetRecordRef;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::error::GatewayError;

/// The minimal view of a sheet record the mapper/reconciler need.
#[derive(Debug, Clone)]
pub struct SheetRecord {
    pub record_id: String,
    pub fields: Value,
    pub updated_at: DateTime<Utc>,
}

/// Port over the hosted spreadsheet-database's table API.
#[async_trait]
pub trait SheetGateway: Send + Sync {
    async fn create_record(
        &self,
        app_token: &str,
        table_id: &str,
        fields: &Value,
        cancel: &CancellationToken,
    ) -> Result<SheetRecordRef, GatewayError>;

    async fn get_record(
        &self,
        app_token: &str,
        table_id: &str,
        record_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SheetRecord, GatewayError>;

    async fn update_record(
        &self,
        app_token: &str,
        table_id: &str,
        record_id: &str,
        fields: &Value,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError>;

    /// Searches for a record matching `key_field = key_value`, used for the
    /// dispatcher's idempotent create pre-check by deterministic lookup.
    async fn search_record(
        &self,
        app_token: &str,
        table_id: &str,
        key_field: &str,
        key_value: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<SheetRecordRef>, GatewayError>;

    /// Lists records updated since `since`, for the Reconciler's pull pass.
    /// `since = None` triggers the full-scan + content-hash fallback the
    /// Reconciler applies when the sheet source has no native cursor query.
    async fn list_records_since(
        &self,
        app_token: &str,
        table_id: &str,
        since: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SheetRecord>, GatewayError>;

    async fn list_tables(
        &self,
        app_token: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, GatewayError>;

    async fn create_table(
        &self,
        app_token: &str,
        display_name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError>;

    async fn resolve_contact_by_email(
        &self,
        email: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, GatewayError>;

    async fn send_message(
        &self,
        open_id: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError>;
}
