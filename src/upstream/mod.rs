//! Outbound calls to third-party APIs.
//!
//! Every upstream request goes through [`Upstream::send_json`], which issues
//! exactly one request under a shared timeout and concurrency bound and folds
//! every way it can fail into an [`UpstreamError`].

pub mod chat;
pub mod explorer;

pub use chat::ChatBackend;
pub use explorer::ExplorerClient;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::config::UpstreamConfig;

/// Upstream bodies longer than this are cut from error details.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// How an upstream call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused, DNS failure, reset, ...
    Unreachable,
    /// No complete response within the configured timeout.
    Timeout,
    /// Upstream answered with a non-success status.
    Status(u16),
    /// Response body was not the JSON we expected.
    Decode,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Unreachable => write!(f, "unreachable"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Status(code) => write!(f, "status {}", code),
            FailureKind::Decode => write!(f, "decode"),
        }
    }
}

/// A failed upstream call, labelled with the backend that failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{backend} API error: {message}")]
pub struct UpstreamError {
    pub backend: String,
    pub kind: FailureKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(backend: &str, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            backend: backend.to_string(),
            kind,
            message: message.into(),
        }
    }

    fn from_reqwest(backend: &str, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_decode() {
            FailureKind::Decode
        } else {
            FailureKind::Unreachable
        };
        Self::new(backend, kind, err.to_string())
    }
}

/// Shared outbound HTTP client with bounded time and concurrency.
#[derive(Clone)]
pub struct Upstream {
    http: Client,
    permits: Arc<Semaphore>,
}

impl Upstream {
    /// Build the outbound client from config.
    pub fn new(config: &UpstreamConfig) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
        })
    }

    /// The underlying client, for building requests.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Issue `request` once and parse a successful response as JSON.
    pub async fn send_json(
        &self,
        backend: &str,
        request: RequestBuilder,
    ) -> Result<Value, UpstreamError> {
        let _permit = self.permits.acquire().await.map_err(|_| {
            UpstreamError::new(backend, FailureKind::Unreachable, "outbound pool closed")
        })?;

        let response = request.send().await.map_err(|e| {
            let err = UpstreamError::from_reqwest(backend, e);
            tracing::error!(backend = %backend, kind = %err.kind, error = %err.message, "Failed to reach upstream");
            err
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            let err = UpstreamError::from_reqwest(backend, e);
            tracing::error!(backend = %backend, kind = %err.kind, error = %err.message, "Failed to read upstream body");
            err
        })?;

        if !status.is_success() {
            let text = error_body_excerpt(&body);
            tracing::error!(
                backend = %backend,
                status = %status,
                body = %text,
                "Upstream returned error"
            );
            let message = if text.is_empty() {
                format!("upstream returned {}", status)
            } else {
                format!("upstream returned {}: {}", status, text)
            };
            return Err(UpstreamError::new(
                backend,
                FailureKind::Status(status.as_u16()),
                message,
            ));
        }

        serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(backend = %backend, error = %e, "Failed to parse upstream response");
            UpstreamError::new(
                backend,
                FailureKind::Decode,
                format!("invalid JSON response: {}", e),
            )
        })
    }
}

fn error_body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
