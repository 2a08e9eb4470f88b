//! HTTP transport to the Janus REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use rtcvoice_config::GatewayConfig;

use crate::error::{JanusError, Result};

/// Janus holds a long-poll open for up to 30s before answering with a keepalive.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(40);

/// Request/response mechanics for reaching the gateway.
///
/// Paths are relative to the API root: `""` for the root, `"/{session}"`,
/// or `"/{session}/{handle}"`.
#[async_trait]
pub trait JanusTransport: Send + Sync {
    async fn post(&self, path: &str, body: Value) -> Result<Value>;

    /// GET on the API root; used for the event long-poll and `/info`.
    async fn get(&self, path: &str) -> Result<Value>;

    /// POST to the admin API root.
    async fn post_admin(&self, body: Value) -> Result<Value>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    base_uri: String,
    admin_uri: String,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(LONG_POLL_TIMEOUT)
            .build()
            .map_err(|e| JanusError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_uri: config.base_uri.trim_end_matches('/').to_string(),
            admin_uri: config.admin_uri.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = text.chars().take(200).collect::<String>();
            return Err(JanusError::Transport(format!("HTTP {status}: {text}")));
        }
        response
            .json()
            .await
            .map_err(|e| JanusError::Protocol(format!("invalid JSON reply: {e}")))
    }

    fn map_send_error(e: reqwest::Error) -> JanusError {
        if e.is_timeout() {
            JanusError::Timeout
        } else {
            JanusError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl JanusTransport for HttpTransport {
    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}{path}", self.base_uri);
        trace!(%url, janus = %body["janus"], "POST");
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        Self::read_json(response).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let url = format!("{}{path}", self.base_uri);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        Self::read_json(response).await
    }

    async fn post_admin(&self, body: Value) -> Result<Value> {
        if self.admin_uri.is_empty() {
            return Err(JanusError::Transport("no admin_uri configured".into()));
        }
        let response = self
            .http
            .post(&self.admin_uri)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        Self::read_json(response).await
    }
}
