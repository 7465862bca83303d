//! github-axum - Authorize users with GitHub and call the GitHub API from axum
//!
//! # Flow
//!
//! ```text
//! browser ── GET /login ──> GitHub::authorize() ──303──> GitHub consent screen
//!                                                              │
//! GitHub ── GET /github-callback?code=.. ──> Authorized extractor
//!                                              └─ POST {auth_url}access_token
//! handler gets Option<String> ──> app stores the token
//!
//! GitHub::get("/user") ── Authorization: Bearer <token> ──> api.github.com
//! ```
//!
//! # Modules
//!
//! - `github`: the extension (redirect, token exchange, API forwarding)
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments
//! - `auth`, `api`: demo application signing users in with a session cookie

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod github;
pub mod metrics;

use std::sync::Arc;

use axum::extract::FromRef;

pub use config::GitHubConfig;
pub use error::GitHubError;
pub use github::{AccessTokenGetter, ApiResponse, AuthorizeParams, Authorized, GitHub, RequestOptions};

/// Demo application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// GitHub OAuth app and API client
    pub github: GitHub,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Errors
    /// Returns error if the GitHub configuration is incomplete
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let github = GitHub::new(config.github.clone())?;
        tracing::info!(
            client_id = %config.github.client_id,
            base_url = %config.github.base_url,
            "GitHub client initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            github,
        })
    }
}

impl FromRef<AppState> for GitHub {
    fn from_ref(state: &AppState) -> Self {
        state.github.clone()
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router(&state.config.oauth.callback_path))
        .merge(api::github_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
