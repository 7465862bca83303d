//! Session extractors
//!
//! Resolve the signed `session` cookie into a [`Session`].

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::CookieJar;

use super::session::{Session, verify_session_token};
use crate::AppState;
use crate::error::AppError;

/// Name of the cookie holding the signed session token
pub const SESSION_COOKIE: &str = "session";

fn session_from_headers(headers: &HeaderMap, state: &AppState) -> Option<Session> {
    let jar = CookieJar::from_headers(headers);
    let token = jar.get(SESSION_COOKIE)?.value().to_owned();
    match verify_session_token(&token, &state.config.session.secret) {
        Ok(session) => Some(session),
        Err(error) => {
            tracing::debug!(%error, "Ignoring invalid session cookie");
            None
        }
    }
}

/// Extractor for current authenticated user
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(session): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", session.github_login)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(CurrentUser(session));
        }

        let state = AppState::from_ref(state);
        let session = session_from_headers(&parts.headers, &state).ok_or(AppError::Unauthorized)?;
        parts.extensions.insert(session.clone());

        Ok(CurrentUser(session))
    }
}

/// Optional current user extractor
///
/// Returns None if not authenticated, instead of error.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(MaybeUser(Some(session)));
        }

        let app_state = AppState::from_ref(state);
        let session = session_from_headers(&parts.headers, &app_state);
        if let Some(session) = &session {
            parts.extensions.insert(session.clone());
        }

        Ok(MaybeUser(session))
    }
}
