//! `JsonRpcSheetGateway` — adapter over the hosted spreadsheet-database's
//! table API, spoken as JSON-RPC 2.0 over a long-lived child process. The
//! wire protocol is behind `JsonRpcTransport` so tests substitute an
//! in-memory transport instead of spawning a real subprocess.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgesheet_core::gateway::{GatewayError, SheetGateway, SheetRecord};
use forgesheet_domain::{SheetAuthMode, SheetRecordRef};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// One JSON-RPC call/response round trip, abstracted away from the actual
/// transport (subprocess pipe vs. in-memory, for tests).
#[async_trait]
pub trait JsonRpcTransport: Send + Sync {
    async fn call(
        &self,
        method: &str,
        params: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, GatewayError>;
}

/// Pipes newline-delimited JSON-RPC 2.0 requests to a long-lived child
/// process's stdin and reads matching responses from its stdout. Calls are
/// serialized — one in-flight request at a time — which is sufficient for
/// the dispatcher/reconciler's sequential gateway usage.
pub struct ChildProcessTransport {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl ChildProcessTransport {
    pub fn spawn(
        command: &str,
        args: &[String],
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let mut child = tokio::process::Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| GatewayError::Transient(format!("failed to spawn sheet bridge: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GatewayError::Transient("sheet bridge has no stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GatewayError::Transient("sheet bridge has no stdout".to_string()))?;

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            next_id: AtomicU64::new(1),
            request_timeout,
        })
    }

    async fn call_inner(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let mut line = serde_json::to_string(&request)
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
        line.push('\n');

        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        stdin.flush().await.map_err(|e| GatewayError::Transient(e.to_string()))?;
        drop(stdin);

        let mut stdout = self.stdout.lock().await;
        let mut response_line = String::new();
        stdout
            .read_line(&mut response_line)
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        if response_line.is_empty() {
            return Err(GatewayError::Transient("sheet bridge closed stdout".to_string()));
        }

        let response: JsonRpcResponse = serde_json::from_str(&response_line)
            .map_err(|e| GatewayError::Transient(format!("malformed JSON-RPC response: {e}")))?;
        if let Some(error) = response.error {
            return Err(GatewayError::InvalidRequest(error.message));
        }
        response
            .result
            .ok_or_else(|| GatewayError::Transient("JSON-RPC response had no result".to_string()))
    }
}

#[async_trait]
impl JsonRpcTransport for ChildProcessTransport {
    async fn call(
        &self,
        method: &str,
        params: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, GatewayError> {
        if cancel.is_cancelled() {
            return Err(GatewayError::Transient("cancelled".to_string()));
        }
        tokio::select! {
            result = tokio::time::timeout(self.request_timeout, self.call_inner(method, params)) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(GatewayError::Transient("sheet bridge call timed out".to_string())),
                }
            }
            _ = cancel.cancelled() => Err(GatewayError::Transient("cancelled".to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

pub struct JsonRpcSheetGateway<T: JsonRpcTransport> {
    transport: T,
    auth_mode: SheetAuthMode,
    credential: String,
}

impl<T: JsonRpcTransport> JsonRpcSheetGateway<T> {
    pub fn new(transport: T, auth_mode: SheetAuthMode, credential: impl Into<String>) -> Self {
        Self { transport, auth_mode, credential: credential.into() }
    }

    fn auth_params(&self) -> Value {
        match self.auth_mode {
            SheetAuthMode::OAuthUser => json!({ "authMode": "oauth_user", "token": self.credential }),
            SheetAuthMode::TenantAppToken => {
                json!({ "authMode": "tenant_app_token", "token": self.credential })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    record_id: String,
    fields: Value,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl<T: JsonRpcTransport> SheetGateway for JsonRpcSheetGateway<T> {
    async fn create_record(
        &self,
        app_token: &str,
        table_id: &str,
        fields: &Value,
        cancel: &CancellationToken,
    ) -> Result<SheetRecordRef, GatewayError> {
        let params = json!({
            "auth": self.auth_params(), "appToken": app_token, "tableId": table_id, "fields": fields,
        });
        let result = self.transport.call("records.create", params, cancel).await?;
        let record: RecordResponse =
            serde_json::from_value(result).map_err(|e| GatewayError::Transient(e.to_string()))?;
        Ok(SheetRecordRef {
            app_token: app_token.to_string(),
            table_id: table_id.to_string(),
            record_id: record.record_id,
        })
    }

    async fn get_record(
        &self,
        app_token: &str,
        table_id: &str,
        record_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SheetRecord, GatewayError> {
        let params = json!({
            "auth": self.auth_params(), "appToken": app_token, "tableId": table_id, "recordId": record_id,
        });
        let result = self.transport.call("records.get", params, cancel).await?;
        let record: RecordResponse =
            serde_json::from_value(result).map_err(|e| GatewayError::Transient(e.to_string()))?;
        Ok(SheetRecord { record_id: record.record_id, fields: record.fields, updated_at: record.updated_at })
    }

    async fn update_record(
        &self,
        app_token: &str,
        table_id: &str,
        record_id: &str,
        fields: &Value,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError> {
        let params = json!({
            "auth": self.auth_params(), "appToken": app_token, "tableId": table_id,
            "recordId": record_id, "fields": fields,
        });
        self.transport.call("records.update", params, cancel).await?;
        Ok(())
    }

    async fn search_record(
        &self,
        app_token: &str,
        table_id: &str,
        key_field: &str,
        key_value: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<SheetRecordRef>, GatewayError> {
        let params = json!({
            "auth": self.auth_params(), "appToken": app_token, "tableId": table_id,
            "keyField": key_field, "keyValue": key_value,
        });
        let result = self.transport.call("records.search", params, cancel).await?;
        let found: Option<RecordResponse> =
            serde_json::from_value(result).map_err(|e| GatewayError::Transient(e.to_string()))?;
        Ok(found.map(|r| SheetRecordRef {
            app_token: app_token.to_string(),
            table_id: table_id.to_string(),
            record_id: r.record_id,
        }))
    }

    async fn list_records_since(
        &self,
        app_token: &str,
        table_id: &str,
        since: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SheetRecord>, GatewayError> {
        let params = json!({
            "auth": self.auth_params(), "appToken": app_token, "tableId": table_id, "since": since,
        });
        let result = self.transport.call("records.listSince", params, cancel).await?;
        let records: Vec<RecordResponse> =
            serde_json::from_value(result).map_err(|e| GatewayError::Transient(e.to_string()))?;
        Ok(records
            .into_iter()
            .map(|r| SheetRecord { record_id: r.record_id, fields: r.fields, updated_at: r.updated_at })
            .collect())
    }

    async fn list_tables(
        &self,
        app_token: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, GatewayError> {
        let params = json!({ "auth": self.auth_params(), "appToken": app_token });
        let result = self.transport.call("tables.list", params, cancel).await?;
        serde_json::from_value(result).map_err(|e| GatewayError::Transient(e.to_string()))
    }

    async fn create_table(
        &self,
        app_token: &str,
        display_name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let params = json!({
            "auth": self.auth_params(), "appToken": app_token, "displayName": display_name,
        });
        let result = self.transport.call("tables.create", params, cancel).await?;
        #[derive(Deserialize)]
        struct TableCreated {
            table_id: String,
        }
        let created: TableCreated =
            serde_json::from_value(result).map_err(|e| GatewayError::Transient(e.to_string()))?;
        Ok(created.table_id)
    }

    async fn resolve_contact_by_email(
        &self,
        email: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, GatewayError> {
        let params = json!({ "auth": self.auth_params(), "email": email });
        let result = self.transport.call("contacts.resolveByEmail", params, cancel).await?;
        #[derive(Deserialize)]
        struct ContactResolved {
            open_id: Option<String>,
        }
        let resolved: ContactResolved =
            serde_json::from_value(result).map_err(|e| GatewayError::Transient(e.to_string()))?;
        Ok(resolved.open_id)
    }

    async fn send_message(
        &self,
        open_id: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError> {
        let params = json!({ "auth": self.auth_params(), "openId": open_id, "message": message });
        self.transport.call("messages.send", params, cancel).await?;
        Ok(())
    }
}
