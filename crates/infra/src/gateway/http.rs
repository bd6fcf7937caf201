//! Minimal HTTP client with retry/backoff, shared by the forge REST
//! gateway. Retries server errors and network failures up to a fixed
//! attempt count with exponential backoff; never retries 4xx.

use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

use forgesheet_core::gateway::GatewayError;

#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        Ok(Self { client, max_attempts: 3, base_backoff: Duration::from_millis(200) })
    }

    pub fn request<U: reqwest::IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Sends `builder`, retrying server errors and network failures.
    /// 4xx responses are returned as-is for the caller to classify.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, GatewayError> {
        let attempts = self.max_attempts.max(1);

        for attempt in 0..attempts {
            let cloned = builder.try_clone().ok_or_else(|| {
                GatewayError::InvalidRequest("request body cannot be cloned for retry".into())
            })?;
            let request =
                cloned.build().map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
            let method = request.method().clone();
            let url = request.url().clone();
            debug!(attempt = attempt + 1, %method, %url, "sending forge request");

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempt + 1 < attempts {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(err) => {
                    if attempt + 1 < attempts && should_retry(&err) {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }
                    return Err(GatewayError::Transient(err.to_string()));
                }
            }
        }

        Err(GatewayError::Transient("exhausted retries without a response".to_string()))
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = retry_number.saturating_sub(1).min(8) as u32;
        self.base_backoff.saturating_mul(1u32 << shift)
    }

    async fn sleep_with_backoff(&self, retry_number: usize) {
        let delay = self.backoff_delay(retry_number);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn should_retry(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_request() || err.is_connect()
}
