//! Configuration management
//!
//! [`GitHubConfig`] is everything the extension itself needs. [`AppConfig`]
//! wraps it for the bundled demo server and loads from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;
use url::Url;

use crate::error::{AppError, GitHubError};

/// Default GitHub REST API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.github.com/";

/// Default GitHub OAuth base URL (`authorize` and `access_token` live below it)
pub const DEFAULT_AUTH_URL: &str = "https://github.com/login/oauth/";

/// GitHub OAuth application configuration
#[derive(Clone, Deserialize)]
pub struct GitHubConfig {
    pub client_id: String,
    pub client_secret: String,
    /// REST API base URL (GitHub Enterprise installs override this)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// OAuth base URL
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Per-request timeout for outgoing HTTP calls
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl GitHubConfig {
    /// Build a configuration pointing at github.com
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: default_base_url(),
            auth_url: default_auth_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Override the REST API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the OAuth base URL
    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self
    }

    /// Check that the required values are present
    ///
    /// Only presence is checked; GitHub is the authority on whether the
    /// credentials are actually valid.
    pub fn validate(&self) -> Result<(), GitHubError> {
        if self.client_id.trim().is_empty() {
            return Err(GitHubError::Config("github.client_id is required".to_string()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(GitHubError::Config(
                "github.client_secret is required".to_string(),
            ));
        }
        Url::parse(&self.base_url)
            .map_err(|e| GitHubError::Config(format!("github.base_url is invalid: {e}")))?;
        Url::parse(&self.auth_url)
            .map_err(|e| GitHubError::Config(format!("github.auth_url is invalid: {e}")))?;
        Ok(())
    }

    /// `{auth_url}authorize`
    pub fn authorize_endpoint(&self) -> Result<Url, GitHubError> {
        join_endpoint(&self.auth_url, "authorize")
    }

    /// `{auth_url}access_token`
    pub fn access_token_endpoint(&self) -> Result<Url, GitHubError> {
        join_endpoint(&self.auth_url, "access_token")
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("auth_url", &self.auth_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

fn join_endpoint(base: &str, path: &str) -> Result<Url, GitHubError> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path)?)
}

/// Demo server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub oauth: OAuthConfig,
    pub session: SessionConfig,
    pub demo: DemoConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "app.example.com" or "localhost:8080")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the public base URL of the server
    ///
    /// # Returns
    /// Full URL like "https://app.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// OAuth flow settings used by the demo routes
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Comma separated scopes; empty means public read-only access
    #[serde(default)]
    pub scope: Option<String>,
    /// Path of the callback route registered with the GitHub app
    pub callback_path: String,
}

/// Session cookie configuration
#[derive(Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret key (32+ bytes)
    pub secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub max_age: i64,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"[redacted]")
            .field("max_age", &self.max_age)
            .finish()
    }
}

/// Demo page settings
#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    /// `owner/name` of the repository shown on `/repo`
    pub repository: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (GITHUB_AXUM__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost:8080")?
            .set_default("server.protocol", "http")?
            .set_default("github.base_url", DEFAULT_BASE_URL)?
            .set_default("github.auth_url", DEFAULT_AUTH_URL)?
            .set_default("github.timeout_seconds", 30)?
            .set_default("oauth.callback_path", "/github-callback")?
            .set_default("session.max_age", 604800)?
            .set_default("demo.repository", "tokio-rs/axum")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("GITHUB_AXUM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Absolute URL GitHub redirects back to after consent
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.server.base_url(), self.oauth.callback_path)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        self.github
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if self.session.secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "session.secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.session.max_age <= 0 {
            return Err(AppError::Config(
                "session.max_age must be greater than 0".to_string(),
            ));
        }

        if !self.oauth.callback_path.starts_with('/') {
            return Err(AppError::Config(
                "oauth.callback_path must start with '/'".to_string(),
            ));
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
