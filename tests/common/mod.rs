//! Common test utilities for E2E tests

#![allow(dead_code)]

pub mod fake_github;

use github_axum::auth::{Session, create_session_token};
use github_axum::config::{
    AppConfig, DemoConfig, GitHubConfig, LoggingConfig, OAuthConfig, ServerConfig, SessionConfig,
};
use github_axum::{AppState, GitHub};
use reqwest::header::SET_COOKIE;
use tokio::net::TcpListener;

pub use fake_github::FakeGitHub;

pub const SESSION_SECRET: &str = "test-secret-key-32-bytes-long!!!";

/// Handle configured against the fake provider
pub fn github_for(fake: &FakeGitHub) -> GitHub {
    GitHub::new(github_config_for(fake)).expect("valid GitHub config")
}

pub fn github_config_for(fake: &FakeGitHub) -> GitHubConfig {
    GitHubConfig::new(fake_github::CLIENT_ID, fake_github::CLIENT_SECRET)
        .with_base_url(fake.base_url())
        .with_auth_url(fake.auth_url())
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub github: FakeGitHub,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Start the fake provider and the demo app pointed at it
    pub async fn new() -> Self {
        let github = FakeGitHub::start().await;

        // Bind first so the callback URL knows the port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local_addr = listener.local_addr().unwrap();

        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: local_addr.port(),
                domain: local_addr.to_string(),
                protocol: "http".to_string(),
            },
            github: github_config_for(&github),
            oauth: OAuthConfig {
                scope: Some("read:user".to_string()),
                callback_path: "/github-callback".to_string(),
            },
            session: SessionConfig {
                secret: SESSION_SECRET.to_string(),
                max_age: 604800,
            },
            demo: DemoConfig {
                repository: "tokio-rs/axum".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).unwrap();
        let app = github_axum::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr: format!("http://{}", local_addr),
            state,
            github,
            client,
        }
    }

    /// Get URL for a path on the demo app
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Signed session cookie value for an already signed-in user
    pub fn session_token(&self) -> String {
        let session = Session::new(
            fake_github::ACCESS_TOKEN.to_string(),
            1,
            "octocat".to_string(),
            3600,
        );
        create_session_token(&session, SESSION_SECRET).expect("Failed to create test token")
    }
}

/// Value of cookie `name` set by `response`, ignoring removal cookies
pub fn set_cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| raw.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(cookie_name, value)| *cookie_name == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Every raw `Set-Cookie` header of `response`
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok().map(ToString::to_string))
        .collect()
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .expect("location header")
        .to_string()
}
