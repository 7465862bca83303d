//! GitHub sign-in routes
//!
//! Wires the extension's authorization redirect and [`Authorized`] callback
//! extractor into a login flow backed by a signed session cookie.

use axum::{
    Router, async_trait,
    extract::{FromRequestParts, Query, State},
    http::request::Parts,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use rand::RngCore;
use serde::Deserialize;
use url::Url;

use super::middleware::{MaybeUser, SESSION_COOKIE};
use super::session::{Session, create_session_token};
use crate::AppState;
use crate::error::AppError;
use crate::github::{AuthorizeParams, Authorized};

/// Cookie carrying the CSRF state between `/login` and the callback
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Create authentication router
///
/// Routes:
/// - GET / - Greeting with login or account links
/// - GET /login - Redirect to GitHub
/// - GET {callback_path} - OAuth callback
/// - GET /logout - Logout
pub fn auth_router(callback_path: &str) -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login))
        .route(callback_path, get(github_callback))
        .route("/logout", get(logout))
}

// =============================================================================
// Index
// =============================================================================

/// GET /
async fn index(MaybeUser(user): MaybeUser) -> Html<String> {
    let body = match user {
        Some(session) => format!(
            "Hello! {} <a href=\"/user\">Get user</a> \
             <a href=\"/repo\">Get repo</a> \
             <a href=\"/logout\">Logout</a>",
            html_escape::encode_text(&session.github_login)
        ),
        None => "Hello! <a href=\"/login\">Login</a>".to_string(),
    };
    Html(body)
}

// =============================================================================
// GitHub OAuth
// =============================================================================

#[derive(Debug, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

/// GET /login
///
/// Redirects user to GitHub authorization page.
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in cookie
/// 3. Redirect to GitHub with client_id, redirect_uri, scope, state
async fn login(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok("Already logged in".into_response());
    }

    let mut redirect_uri =
        Url::parse(&state.config.callback_url()).map_err(|e| AppError::Config(e.to_string()))?;
    if let Some(next) = query.next.as_deref().filter(|next| is_local_path(next)) {
        redirect_uri.query_pairs_mut().append_pair("next", next);
    }

    let csrf_state = generate_csrf_state();
    let mut params = AuthorizeParams::new()
        .redirect_uri(redirect_uri.as_str())
        .state(&csrf_state);
    if let Some(scope) = &state.config.oauth.scope {
        params = params.scope(scope.as_str());
    }
    let redirect = state.github.authorize(&params)?;

    let cookie = build_cookie(
        OAUTH_STATE_COOKIE,
        csrf_state,
        state.config.should_use_secure_cookies(),
    );
    Ok((jar.add(cookie), redirect).into_response())
}

/// GitHub user info
#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
    id: u64,
}

/// GET {callback_path}
///
/// Handles OAuth callback from GitHub.
///
/// # Steps
/// 1. Verify CSRF state (before any token exchange)
/// 2. Exchange code for access token ([`Authorized`])
/// 3. Fetch user info from GitHub
/// 4. Create session and set cookie
/// 5. Redirect to `next`
async fn github_callback(
    State(state): State<AppState>,
    _verified: VerifiedState,
    Authorized(token): Authorized,
    Query(query): Query<NextQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let next_url = query
        .next
        .filter(|next| is_local_path(next))
        .unwrap_or_else(|| "/".to_string());
    let jar = jar.remove(removal_cookie(OAUTH_STATE_COOKIE));

    let Some(access_token) = token else {
        tracing::info!("GitHub authorization failed or was denied");
        return Ok((jar, Redirect::to(&next_url)).into_response());
    };

    let user: GitHubUser = state
        .github
        .with_access_token(access_token.as_str())
        .get("/user")
        .await?
        .json()
        .await?;

    let session = Session::new(
        access_token,
        user.id,
        user.login,
        state.config.session.max_age,
    );
    let session_token = create_session_token(&session, &state.config.session.secret)?;
    tracing::info!(
        github_login = %session.github_login,
        github_id = session.github_id,
        "User signed in with GitHub"
    );

    let cookie = build_cookie(
        SESSION_COOKIE,
        session_token,
        state.config.should_use_secure_cookies(),
    );
    Ok((jar.add(cookie), Redirect::to(&next_url)).into_response())
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Clears session cookie and redirects to the index.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .remove(removal_cookie(SESSION_COOKIE))
        .remove(removal_cookie(OAUTH_STATE_COOKIE));
    (jar, Redirect::to("/"))
}

// =============================================================================
// CSRF
// =============================================================================

/// Extractor that rejects callbacks whose `state` does not match the cookie
///
/// Must come before [`Authorized`] in the handler signature so forged
/// callbacks never reach the token exchange.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedState;

#[async_trait]
impl<S> FromRequestParts<S> for VerifiedState
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let returned = url::form_urlencoded::parse(parts.uri.query().unwrap_or_default().as_bytes())
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned());
        let jar = CookieJar::from_headers(&parts.headers);
        let expected = jar
            .get(OAUTH_STATE_COOKIE)
            .map(|cookie| cookie.value().to_owned());

        match (returned, expected) {
            (Some(returned), Some(expected))
                if !expected.is_empty() && constant_time_eq(&returned, &expected) =>
            {
                Ok(VerifiedState)
            }
            _ => {
                tracing::warn!("OAuth callback state does not match the login cookie");
                Err(AppError::Unauthorized)
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// Only same-site absolute paths are accepted as `next`
fn is_local_path(next: &str) -> bool {
    next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')
}

fn build_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, "")).path("/").build();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_must_be_a_local_path() {
        assert!(is_local_path("/repo"));
        assert!(!is_local_path("//evil.example.com"));
        assert!(!is_local_path("https://evil.example.com"));
        assert!(!is_local_path("/\\evil.example.com"));
    }

    #[test]
    fn csrf_states_are_random_and_url_safe() {
        let a = generate_csrf_state();
        let b = generate_csrf_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn constant_time_eq_compares_content() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
