//! Sign in with GitHub
//!
//! Handles:
//! - GitHub OAuth login flow
//! - Session management
//! - Session extractors

mod middleware;
mod oauth;
pub mod session;

pub use middleware::{CurrentUser, MaybeUser, SESSION_COOKIE};
pub use oauth::{OAUTH_STATE_COOKIE, VerifiedState, auth_router};
pub use session::{Session, create_session_token, verify_session_token};
