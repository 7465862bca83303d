//! Error types
//!
//! [`GitHubError`] is what the extension returns. [`AppError`] is the demo
//! server's error and implements `IntoResponse` for proper HTTP error
//! responses.

use std::fmt;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Non-success response from the GitHub API
///
/// The body is read eagerly so the error can be inspected, logged and
/// forwarded after the connection is gone.
#[derive(Debug, Clone)]
pub struct ApiErrorResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiErrorResponse {
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.text().await {
            Ok(body) => body,
            Err(error) => {
                tracing::debug!(%error, "Failed to read GitHub error response body");
                String::new()
            }
        };
        Self {
            status,
            headers,
            body,
        }
    }

    /// The `message` field GitHub puts in JSON error bodies
    pub fn message(&self) -> Option<String> {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()?
            .get("message")?
            .as_str()
            .map(ToOwned::to_owned)
    }
}

impl fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{}: {}", self.status.as_u16(), message),
            None => write!(f, "{}: None", self.status.as_u16()),
        }
    }
}

/// Errors raised by the GitHub extension
#[derive(Debug, Error)]
pub enum GitHubError {
    /// GitHub answered with a non-2xx status
    #[error("{0}")]
    Api(ApiErrorResponse),

    /// Transport level failure
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Token or caller header is not a valid header value
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// No explicit token was given and no getter is registered
    #[error("No access token getter registered")]
    MissingAccessTokenGetter,
}

impl GitHubError {
    /// HTTP status of the failed API call, if there was one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GitHubError::Api(response) => Some(response.status),
            GitHubError::HttpClient(error) => error.status(),
            _ => None,
        }
    }
}

/// Demo server error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// GitHub call failed (provider status or 502)
    #[error("GitHub error: {0}")]
    GitHub(#[from] GitHubError),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing failure (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// GitHub API failures keep the provider's status and body so the browser
    /// sees what GitHub said; everything else becomes a JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        if let AppError::GitHub(GitHubError::Api(api)) = &self {
            crate::metrics::ERRORS_TOTAL
                .with_label_values(&["github_api"])
                .inc();
            return (api.status, api.body.clone()).into_response();
        }

        let (status, error_message, error_type) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), "unauthorized"),
            AppError::GitHub(_) => (StatusCode::BAD_GATEWAY, self.to_string(), "github"),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Encryption(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "encryption")
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using GitHubError
pub type Result<T> = std::result::Result<T, GitHubError>;
