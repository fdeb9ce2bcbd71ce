//! Error types for algochat.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::upstream::UpstreamError;

/// Result type alias for algochat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for algochat.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Rendered without a prefix so the detail reads "<backend> API error: ...".
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// Malformed JSON body.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Path segment or query string that fails to parse.
    #[error("Invalid parameter: {0}")]
    InvalidParams(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidParams(_) => StatusCode::BAD_REQUEST,
            // Every upstream failure kind, timeouts included, shares one status.
            Error::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Config(_) | Error::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "detail": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
