//! Session management
//!
//! Uses HMAC-signed tokens stored in cookies.
//! No server-side session storage needed; the GitHub access token lives in
//! the signed payload.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// User session data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// GitHub OAuth access token
    pub access_token: String,
    /// GitHub user ID
    pub github_id: u64,
    /// GitHub login
    pub github_login: String,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Start a session that lasts `max_age_seconds`
    pub fn new(
        access_token: String,
        github_id: u64,
        github_login: String,
        max_age_seconds: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_token,
            github_id,
            github_login,
            created_at: now,
            expires_at: now + Duration::seconds(max_age_seconds),
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Create a signed session token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// # Arguments
/// * `session` - Session data to encode
/// * `secret` - HMAC secret key
///
/// # Returns
/// Signed token string
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let payload = serde_json::to_string(session).map_err(|e| AppError::Internal(e.to_string()))?;
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a session token
///
/// # Errors
/// Returns `Unauthorized` if the signature is invalid, the token is
/// malformed or the session has expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let (payload_b64, signature_b64) = token.split_once('.').ok_or(AppError::Unauthorized)?;
    if signature_b64.contains('.') {
        return Err(AppError::Unauthorized);
    }

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;
    mac.verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized)?;

    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;
    let session: Session =
        serde_json::from_slice(&payload_bytes).map_err(|_| AppError::Unauthorized)?;

    if session.is_expired() {
        return Err(AppError::Unauthorized);
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-32-bytes-long!!!";

    fn session() -> Session {
        Session::new("gho_token".to_string(), 42, "octocat".to_string(), 3600)
    }

    #[test]
    fn token_roundtrip_preserves_access_token() {
        let token = create_session_token(&session(), SECRET).unwrap();
        let decoded = verify_session_token(&token, SECRET).unwrap();
        assert_eq!(decoded.access_token, "gho_token");
        assert_eq!(decoded.github_login, "octocat");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = create_session_token(&session(), SECRET).unwrap();
        let result = verify_session_token(&token, "another-secret-key-32-bytes-long");
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn expired_session_is_rejected() {
        let mut expired = session();
        expired.expires_at = Utc::now() - Duration::seconds(1);
        let token = create_session_token(&expired, SECRET).unwrap();
        assert!(matches!(
            verify_session_token(&token, SECRET),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        for token in ["", "abc", "a.b.c", "!!!.???"] {
            assert!(
                verify_session_token(token, SECRET).is_err(),
                "token {token:?} must be rejected"
            );
        }
    }
}
