//! GitHub OAuth and REST API integration
//!
//! Handles:
//! - Building the authorization redirect
//! - Exchanging the callback code for an access token
//! - Forwarding API calls with the access token attached

mod api;
mod oauth;
mod token;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use api::{ApiResponse, RequestOptions};
pub use oauth::{AuthorizeParams, Authorized};
pub use token::AccessTokenGetter;

use crate::config::GitHubConfig;
use crate::error::{GitHubError, Result};

/// User agent sent with every outgoing request (GitHub rejects requests without one)
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Handle to a configured GitHub OAuth application
///
/// Cloning is cheap: configuration and the connection pool are shared. Put it
/// in your axum state and expose it through `FromRef` to use [`Authorized`].
#[derive(Clone)]
pub struct GitHub {
    inner: Arc<Inner>,
    token_getter: Option<Arc<dyn AccessTokenGetter>>,
}

struct Inner {
    config: GitHubConfig,
    http_client: reqwest::Client,
}

impl GitHub {
    /// Create a handle from configuration
    ///
    /// # Errors
    /// Returns [`GitHubError::Config`] if the client id or secret is missing
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Self::with_http_client(config, http_client)
    }

    /// Create a handle that sends requests through an existing client
    pub fn with_http_client(config: GitHubConfig, http_client: reqwest::Client) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                http_client,
            }),
            token_getter: None,
        })
    }

    /// Register the function that yields the access token for API calls
    ///
    /// ```ignore
    /// let github = GitHub::new(config)?
    ///     .with_access_token_getter(|| async { std::env::var("GITHUB_TOKEN").ok() });
    /// ```
    pub fn with_access_token_getter<G>(mut self, getter: G) -> Self
    where
        G: AccessTokenGetter + 'static,
    {
        self.token_getter = Some(Arc::new(getter));
        self
    }

    /// Clone of this handle whose API calls use `token`
    ///
    /// Meant for request handlers that already hold the user's token.
    pub fn with_access_token(&self, token: impl Into<String>) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            token_getter: Some(token::fixed_token(token.into())),
        }
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.inner.config
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.inner.http_client
    }

    /// Resolve the token for a call: explicit token first, then the getter
    async fn resolve_access_token(&self, explicit: Option<String>) -> Result<Option<String>> {
        if explicit.is_some() {
            return Ok(explicit);
        }
        match &self.token_getter {
            Some(getter) => Ok(getter.access_token().await),
            None => Err(GitHubError::MissingAccessTokenGetter),
        }
    }
}

impl fmt::Debug for GitHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHub")
            .field("client_id", &self.inner.config.client_id)
            .field("base_url", &self.inner.config.base_url)
            .field("auth_url", &self.inner.config.auth_url)
            .field("has_token_getter", &self.token_getter.is_some())
            .finish()
    }
}
