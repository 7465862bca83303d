//! API layer
//!
//! HTTP handlers for:
//! - GitHub API forwarding for the signed-in user
//! - Metrics (Prometheus)

mod github;
pub mod metrics;

pub use github::github_router;
pub use metrics::metrics_router;
