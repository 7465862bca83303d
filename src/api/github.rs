//! GitHub API endpoints for the signed-in user
//!
//! Each handler forwards one call with the session's access token.

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::github::ApiResponse;

/// Create GitHub forwarding router
///
/// Routes:
/// - GET /user - The authenticated GitHub user
/// - GET /repo - The configured demo repository
pub fn github_router() -> Router<AppState> {
    Router::new()
        .route("/user", get(user))
        .route("/repo", get(repo))
}

/// GET /user
async fn user(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Response, AppError> {
    let response = state
        .github
        .with_access_token(session.access_token)
        .get("/user")
        .await?;
    into_http_response(response).await
}

/// GET /repo
async fn repo(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Response, AppError> {
    let resource = format!("/repos/{}", state.config.demo.repository);
    let response = state
        .github
        .with_access_token(session.access_token)
        .get(&resource)
        .await?;
    into_http_response(response).await
}

async fn into_http_response(response: ApiResponse) -> Result<Response, AppError> {
    match response {
        ApiResponse::Json(value) => Ok(Json(value).into_response()),
        ApiResponse::Raw(raw) => {
            let status = raw.status();
            let body = raw
                .bytes()
                .await
                .map_err(|e| AppError::GitHub(e.into()))?;
            Ok((status, body).into_response())
        }
    }
}
