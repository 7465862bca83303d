//! Prometheus metrics registry and instruments.
//!
//! Instruments are updated by the extension itself; registering them with
//! [`REGISTRY`] is left to the embedding application via [`init_metrics`].

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // GitHub API Metrics
    pub static ref GITHUB_API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("github_api_requests_total", "Total number of GitHub API requests"),
        &["method", "status"]
    ).expect("metric can be created");
    pub static ref GITHUB_API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "github_api_request_duration_seconds",
            "GitHub API request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["method"]
    ).expect("metric can be created");

    // OAuth Metrics
    pub static ref OAUTH_REDIRECTS_TOTAL: IntCounter = IntCounter::new(
        "github_oauth_redirects_total",
        "Total number of redirects to the GitHub consent screen"
    ).expect("metric can be created");
    pub static ref OAUTH_TOKEN_EXCHANGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("github_oauth_token_exchanges_total", "Total number of authorization code exchanges"),
        &["outcome"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("github_axum_errors_total", "Total number of errors returned to clients"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(GITHUB_API_REQUESTS_TOTAL.clone()))
            .expect("GITHUB_API_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(GITHUB_API_REQUEST_DURATION_SECONDS.clone()))
            .expect("GITHUB_API_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(OAUTH_REDIRECTS_TOTAL.clone()))
            .expect("OAUTH_REDIRECTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(OAUTH_TOKEN_EXCHANGES_TOTAL.clone()))
            .expect("OAUTH_TOKEN_EXCHANGES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Render every registered metric in Prometheus text format
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    encoder.encode_to_string(&REGISTRY.gather())
}
