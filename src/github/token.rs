//! Access token getters
//!
//! The embedding application owns token storage. It hands the extension a
//! getter that yields the token for the current call.

use std::future::Future;
use std::sync::Arc;

use axum::async_trait;

/// Supplies the access token used for API calls
///
/// Returning `None` sends the request without credentials, which GitHub
/// serves as an anonymous (rate limited) call.
#[async_trait]
pub trait AccessTokenGetter: Send + Sync {
    async fn access_token(&self) -> Option<String>;
}

#[async_trait]
impl<F, Fut> AccessTokenGetter for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<String>> + Send + 'static,
{
    async fn access_token(&self) -> Option<String> {
        (self)().await
    }
}

/// Getter that always yields the same token
pub(crate) fn fixed_token(token: String) -> Arc<dyn AccessTokenGetter> {
    Arc::new(move || {
        let token = token.clone();
        async move { Some(token) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closures_are_getters() {
        let getter: Arc<dyn AccessTokenGetter> =
            Arc::new(|| async { Some("gho_closure".to_string()) });
        assert_eq!(getter.access_token().await.as_deref(), Some("gho_closure"));
    }

    #[tokio::test]
    async fn fixed_token_repeats() {
        let getter = fixed_token("gho_fixed".to_string());
        assert_eq!(getter.access_token().await.as_deref(), Some("gho_fixed"));
        assert_eq!(getter.access_token().await.as_deref(), Some("gho_fixed"));
    }
}
