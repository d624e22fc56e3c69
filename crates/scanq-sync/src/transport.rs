//! # Batch Transport
//!
//! The seam between the Sync Engine and the network. The engine only knows
//! [`BatchTransport`]; production uses [`HttpTransport`], tests plug in
//! scripted fakes.
//!
//! ## Failure Classes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  send_batch() result                │ engine reaction                  │
//! │─────────────────────────────────────┼──────────────────────────────────│
//! │  Ok(BatchResponse)                  │ apply per-item outcomes          │
//! │  Err(ConnectionFailed / Timeout)    │ nothing mutated, stays pending   │
//! │  Err(HttpStatus)  (non-2xx)         │ nothing mutated, stays pending   │
//! │  Err(DeserializationFailed)         │ nothing mutated, stays pending   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Authentication is the shared transport layer's business: a bearer token
//! is attached when one is configured and otherwise left alone.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::ScanqConfig;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{BatchRequest, BatchResponse};

/// Longest slice of an error body kept for logs and `last_error`.
const MAX_ERROR_BODY: usize = 200;

/// Sends one batch and returns the endpoint's answer.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn send_batch(&self, request: &BatchRequest) -> SyncResult<BatchResponse>;

    /// Where batches go, for logging.
    fn endpoint(&self) -> &str;
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// POSTs batches as JSON with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    auth_token: Option<String>,
}

impl HttpTransport {
    /// Creates a transport for `endpoint`.
    ///
    /// `request_timeout` is a safety net below the engine's own bounded wait.
    pub fn new(
        endpoint: &str,
        auth_token: Option<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> SyncResult<Self> {
        let endpoint = Url::parse(endpoint)?;
        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                endpoint.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("scanq/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SyncError::Internal(e.to_string()))?;

        Ok(HttpTransport {
            client,
            endpoint,
            auth_token,
        })
    }

    /// Builds the transport described by `config`, or `None` when no endpoint
    /// is configured.
    pub fn from_config(config: &ScanqConfig) -> SyncResult<Option<Self>> {
        match config.endpoint_url() {
            Some(url) => Ok(Some(Self::new(
                url,
                config.sync.auth_token.clone(),
                config.request_timeout(),
                config.connect_timeout(),
            )?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BatchTransport for HttpTransport {
    async fn send_batch(&self, request: &BatchRequest) -> SyncResult<BatchResponse> {
        debug!(
            endpoint = %self.endpoint,
            batch_id = %request.batch_id,
            items = request.len(),
            "Posting scan batch"
        );

        let mut builder = self.client.post(self.endpoint.clone()).json(request);
        if let Some(ref token) = self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
            warn!(status = status.as_u16(), body = %body, "Endpoint rejected the batch");
            return Err(SyncError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SyncError::DeserializationFailed(e.to_string()))
    }

    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

/// Largest index `<= max` that lies on a char boundary of `s`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
