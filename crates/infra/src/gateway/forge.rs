//! `ReqwestForgeGateway` — REST adapter over the hosted forge's issue
//! tracker, grounded in the teacher's `HttpClient` retry/backoff pattern.
//! Endpoints and rate-limit handling per spec.md §6.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgesheet_core::gateway::{ForgeGateway, ForgeIssue, GatewayError};
use forgesheet_domain::ForgeIssueRef;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::http::HttpClient;

pub struct ReqwestForgeGateway {
    http: HttpClient,
    base_url: String,
    token: String,
    api_version: String,
}

impl ReqwestForgeGateway {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            http: HttpClient::new(timeout)?,
            base_url: base_url.into(),
            token: token.into(),
            api_version: api_version.into(),
        })
    }

    fn headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", &self.api_version)
    }

    /// Sends a request, honoring one internal retry on rate-limit responses
    /// by sleeping until `X-RateLimit-Reset`, per spec.md §6.
    async fn send_with_rate_limit_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, GatewayError> {
        for attempt in 0..2 {
            if cancel.is_cancelled() {
                return Err(GatewayError::Transient("cancelled".to_string()));
            }
            let mut builder = self.headers(self.http.request(method.clone(), url));
            if let Some(b) = body {
                builder = builder.json(b);
            }
            let response = self.http.send(builder).await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
                if let Some(reset_after) = rate_limit_reset_after(&response) {
                    if attempt == 0 {
                        debug!(?reset_after, "forge rate limited, sleeping once");
                        tokio::time::sleep(reset_after).await;
                        continue;
                    }
                    return Err(GatewayError::RateLimited { reset_after });
                }
            }
            return Ok(response);
        }
        Err(GatewayError::Transient("rate limit retry exhausted".to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn rate_limit_reset_after(response: &reqwest::Response) -> Option<Duration> {
    let reset_epoch: i64 = response.headers().get("X-RateLimit-Reset")?.to_str().ok()?.parse().ok()?;
    let now = Utc::now().timestamp();
    Some(Duration::from_secs(reset_epoch.saturating_sub(now).max(0) as u64))
}

async fn classify_error(response: reqwest::Response) -> GatewayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED => GatewayError::Unauthorized,
        StatusCode::NOT_FOUND => GatewayError::NotFound,
        StatusCode::CONFLICT => GatewayError::Conflict(body),
        s if s.is_client_error() => GatewayError::InvalidRequest(body),
        _ => GatewayError::Transient(body),
    }
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    number: i64,
    title: Option<String>,
    body: Option<String>,
    state: String,
    state_reason: Option<String>,
    labels: Vec<LabelResponse>,
    assignee: Option<UserResponse>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

impl From<IssueResponse> for ForgeIssue {
    fn from(r: IssueResponse) -> Self {
        ForgeIssue {
            number: r.number,
            title: r.title.unwrap_or_default(),
            body: r.body.unwrap_or_default(),
            state: r.state,
            state_reason: r.state_reason,
            labels: r.labels.into_iter().map(|l| l.name).collect(),
            assignee_login: r.assignee.map(|u| u.login),
            updated_at: r.updated_at,
        }
    }
}

#[async_trait]
impl ForgeGateway for ReqwestForgeGateway {
    async fn create_issue(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        labels: &[String],
        cancel: &CancellationToken,
    ) -> Result<ForgeIssueRef, GatewayError> {
        let url = self.url(&format!("/repos/{repo}/issues"));
        let payload = json!({ "title": title, "body": body, "labels": labels });
        let response = self
            .send_with_rate_limit_retry(Method::POST, &url, Some(&payload), cancel)
            .await?;
        if response.status() != StatusCode::CREATED {
            return Err(classify_error(response).await);
        }
        let issue: IssueResponse =
            response.json().await.map_err(|e| GatewayError::Transient(e.to_string()))?;
        Ok(ForgeIssueRef { repo: repo.to_string(), number: issue.number })
    }

    async fn get_issue(
        &self,
        repo: &str,
        number: i64,
        cancel: &CancellationToken,
    ) -> Result<ForgeIssue, GatewayError> {
        let url = self.url(&format!("/repos/{repo}/issues/{number}"));
        let response = self.send_with_rate_limit_retry(Method::GET, &url, None, cancel).await?;
        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }
        let issue: IssueResponse =
            response.json().await.map_err(|e| GatewayError::Transient(e.to_string()))?;
        Ok(issue.into())
    }

    async fn patch_issue(
        &self,
        repo: &str,
        number: i64,
        fields: &Value,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError> {
        let url = self.url(&format!("/repos/{repo}/issues/{number}"));
        let response =
            self.send_with_rate_limit_retry(Method::PATCH, &url, Some(fields), cancel).await?;
        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }
        Ok(())
    }

    async fn close_issue(
        &self,
        repo: &str,
        number: i64,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError> {
        let url = self.url(&format!("/repos/{repo}/issues/{number}"));
        let payload = json!({ "state": "closed", "state_reason": reason });
        let response =
            self.send_with_rate_limit_retry(Method::PATCH, &url, Some(&payload), cancel).await?;
        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }
        Ok(())
    }

    async fn list_issues_since(
        &self,
        repo: &str,
        since: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ForgeIssue>, GatewayError> {
        let mut url = self.url(&format!("/repos/{repo}/issues?state=all&per_page=100"));
        if let Some(since) = since {
            url.push_str(&format!("&since={since}"));
        }
        let response = self.send_with_rate_limit_retry(Method::GET, &url, None, cancel).await?;
        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }
        let issues: Vec<IssueResponse> =
            response.json().await.map_err(|e| GatewayError::Transient(e.to_string()))?;
        Ok(issues.into_iter().map(ForgeIssue::from).collect())
    }

    async fn add_comment(
        &self,
        repo: &str,
        number: i64,
        body: &str,
        cancel: &CancellationToken,
    ) -> Result<(), GatewayError> {
        let url = self.url(&format!("/repos/{repo}/issues/{number}/comments"));
        let payload = json!({ "body": body });
        let response =
            self.send_with_rate_limit_retry(Method::POST, &url, Some(&payload), cancel).await?;
        if response.status() != StatusCode::CREATED {
            return Err(classify_error(response).await);
        }
        Ok(())
    }
}
