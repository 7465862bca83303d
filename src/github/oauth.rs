//! GitHub OAuth web flow
//!
//! Implements the OAuth 2.0 authorization code flow with GitHub:
//! redirect the user to the consent screen, then trade the `code` GitHub
//! sends back for an access token.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::Redirect,
};
use url::Url;

use super::GitHub;
use super::api::is_json_response;
use crate::error::Result;
use crate::metrics::{OAUTH_REDIRECTS_TOTAL, OAUTH_TOKEN_EXCHANGES_TOTAL};

/// Optional parameters of the authorization redirect
///
/// Every field left unset is omitted from the URL, so GitHub falls back to
/// the app's registered defaults (public read-only scope, registered
/// callback URL).
#[derive(Debug, Clone, Default)]
pub struct AuthorizeParams {
    /// Comma separated scopes, e.g. `"user,repo"`
    pub scope: Option<String>,
    /// Must be the app's callback URL or a subdirectory of it
    pub redirect_uri: Option<String>,
    /// Unguessable value echoed back on the callback (CSRF protection)
    pub state: Option<String>,
}

impl AuthorizeParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the scope from a list, joined the way GitHub expects
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = scopes
            .into_iter()
            .map(|scope| scope.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.scope = Some(joined);
        self
    }

    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

impl GitHub {
    /// Build the consent screen URL
    ///
    /// `{auth_url}authorize?client_id=..[&scope=..][&redirect_uri=..][&state=..]`
    pub fn authorize_url(&self, params: &AuthorizeParams) -> Result<Url> {
        let mut url = self.config().authorize_endpoint()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config().client_id);
            if let Some(scope) = non_empty(&params.scope) {
                query.append_pair("scope", scope);
            }
            if let Some(redirect_uri) = non_empty(&params.redirect_uri) {
                query.append_pair("redirect_uri", redirect_uri);
            }
            if let Some(state) = non_empty(&params.state) {
                query.append_pair("state", state);
            }
        }
        Ok(url)
    }

    /// Redirect the browser to GitHub and request access to the user's data
    ///
    /// # Usage
    /// ```ignore
    /// async fn login(State(github): State<GitHub>) -> Result<Redirect, GitHubError> {
    ///     github.authorize(&AuthorizeParams::new().scope("user,repo"))
    /// }
    /// ```
    pub fn authorize(&self, params: &AuthorizeParams) -> Result<Redirect> {
        tracing::debug!("Creating GitHub authorization redirect");
        let url = self.authorize_url(params)?;
        tracing::debug!(url = %url, "Redirecting to GitHub");
        OAUTH_REDIRECTS_TOTAL.inc();
        Ok(Redirect::to(url.as_str()))
    }

    /// Exchange an authorization code for an access token
    ///
    /// Sends exactly one POST to `{auth_url}access_token`. Returns `Ok(None)`
    /// when GitHub refuses (non-2xx status or no `access_token` in the body).
    ///
    /// # Errors
    /// Returns an error only if the request itself could not be made
    pub async fn exchange_code(&self, code: &str) -> Result<Option<String>> {
        let url = self.config().access_token_endpoint()?;
        tracing::debug!(url = %url, "Exchanging authorization code for access token");

        let params = [
            ("code", code),
            ("client_id", self.config().client_id.as_str()),
            ("client_secret", self.config().client_secret.as_str()),
        ];
        let response = self.http_client().post(url).form(&params).send().await?;

        let status = response.status();
        let is_json = is_json_response(response.headers());
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = %status, "GitHub rejected the token exchange");
            OAUTH_TOKEN_EXCHANGES_TOTAL
                .with_label_values(&["rejected"])
                .inc();
            return Ok(None);
        }

        let fields = parse_token_response(&body, is_json);
        match fields.get("access_token").filter(|token| !token.is_empty()) {
            Some(token) => {
                tracing::debug!(
                    token_type = fields.get("token_type").map(String::as_str).unwrap_or(""),
                    scope = fields.get("scope").map(String::as_str).unwrap_or(""),
                    "Received GitHub access token"
                );
                OAUTH_TOKEN_EXCHANGES_TOTAL
                    .with_label_values(&["success"])
                    .inc();
                Ok(Some(token.clone()))
            }
            None => {
                tracing::warn!(
                    error = fields.get("error").map(String::as_str).unwrap_or("unknown"),
                    description = fields
                        .get("error_description")
                        .map(String::as_str)
                        .unwrap_or(""),
                    "GitHub token response did not contain an access token"
                );
                OAUTH_TOKEN_EXCHANGES_TOTAL
                    .with_label_values(&["rejected"])
                    .inc();
                Ok(None)
            }
        }
    }
}

/// Token responses are form encoded unless JSON was negotiated
fn parse_token_response(body: &str, is_json: bool) -> HashMap<String, String> {
    if is_json {
        return serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(body)
            .map(|object| {
                object
                    .into_iter()
                    .filter_map(|(key, value)| value.as_str().map(|value| (key, value.to_string())))
                    .collect()
            })
            .unwrap_or_default();
    }

    url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect()
}

/// Extractor for the OAuth callback route
///
/// Holds the access token obtained from the `code` query parameter, or
/// `None` when authorization was denied or failed. The exchange happens while
/// extracting, exactly once per request.
///
/// # Usage
/// ```ignore
/// async fn github_callback(Authorized(token): Authorized) -> impl IntoResponse {
///     match token {
///         Some(token) => format!("got {token}"),
///         None => "authorization failed".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized(pub Option<String>);

impl Authorized {
    pub fn into_token(self) -> Option<String> {
        self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Authorized
where
    GitHub: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let query: HashMap<String, String> =
            url::form_urlencoded::parse(parts.uri.query().unwrap_or_default().as_bytes())
                .into_owned()
                .collect();

        let Some(code) = query.get("code").filter(|code| !code.is_empty()) else {
            tracing::info!(
                error = query.get("error").map(String::as_str).unwrap_or("missing_code"),
                description = query
                    .get("error_description")
                    .map(String::as_str)
                    .unwrap_or(""),
                "GitHub authorization was not granted"
            );
            OAUTH_TOKEN_EXCHANGES_TOTAL
                .with_label_values(&["denied"])
                .inc();
            return Ok(Authorized(None));
        };

        let github = GitHub::from_ref(state);
        match github.exchange_code(code).await {
            Ok(token) => Ok(Authorized(token)),
            Err(error) => {
                tracing::warn!(%error, "GitHub token exchange failed");
                OAUTH_TOKEN_EXCHANGES_TOTAL
                    .with_label_values(&["error"])
                    .inc();
                Ok(Authorized(None))
            }
        }
    }
}
