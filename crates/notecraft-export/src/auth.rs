//! Bearer token storage and the refresh call

use crate::constants::TOKEN_REFRESH_PATH;
use crate::upload::{CredentialSource, TokenRefresher};
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// In-memory access and refresh tokens
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: RwLock<Tokens>,
}

impl TokenStore {
    pub fn new(access: Option<String>, refresh: Option<String>) -> Self {
        Self {
            tokens: RwLock::new(Tokens { access, refresh }),
        }
    }

    pub fn access(&self) -> Option<String> {
        self.read().access
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh
    }

    pub fn set_access(&self, access: impl Into<String>) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .access = Some(access.into());
    }

    /// Forget both tokens (logout)
    pub fn clear(&self) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Tokens::default();
    }

    pub fn is_logged_in(&self) -> bool {
        let tokens = self.read();
        tokens.access.is_some() && tokens.refresh.is_some()
    }

    fn read(&self) -> Tokens {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CredentialSource for TokenStore {
    fn access_token(&self) -> Option<String> {
        self.access()
    }
}

/// `POST {server}/token/refresh/` with `{"refresh": ...}`, storing the
/// returned `access` token
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    endpoint: String,
    store: Arc<TokenStore>,
}

impl HttpTokenRefresher {
    pub fn new(client: reqwest::Client, server_url: &str, store: Arc<TokenStore>) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", server_url.trim_end_matches('/'), TOKEN_REFRESH_PATH),
            store,
        }
    }

    /// Refresher with its own HTTP client
    pub fn for_server(server_url: &str, store: Arc<TokenStore>) -> Self {
        Self::new(reqwest::Client::new(), server_url, store)
    }

    async fn request_access_token(&self, refresh: &str) -> reqwest::Result<Option<String>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "refresh": refresh }))
            .send()
            .await?;

        if !response.status().is_success() {
            log::warn!("Token refresh rejected with HTTP {}", response.status());
            return Ok(None);
        }

        let body: serde_json::Value = response.json().await?;
        Ok(body
            .get("access")
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self) -> bool {
        let Some(refresh) = self.store.refresh_token() else {
            log::warn!("No refresh token available");
            return false;
        };

        match self.request_access_token(&refresh).await {
            Ok(Some(access)) => {
                self.store.set_access(access);
                log::debug!("Access token refreshed");
                true
            }
            Ok(None) => {
                // Refresh token is no longer valid either
                self.store.clear();
                false
            }
            Err(e) => {
                log::error!("Error refreshing token: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_exposes_access_token_as_credential() {
        let store = TokenStore::new(Some("a1".to_string()), Some("r1".to_string()));
        assert_eq!(store.access_token().as_deref(), Some("a1"));
        store.set_access("a2");
        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert!(store.is_logged_in());
        store.clear();
        assert_eq!(store.access_token(), None);
        assert!(!store.is_logged_in());
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_fails_fast() {
        let store = Arc::new(TokenStore::new(Some("a".to_string()), None));
        let refresher = HttpTokenRefresher::for_server("http://127.0.0.1:9", store.clone());
        assert!(!refresher.refresh().await);
        assert_eq!(store.access().as_deref(), Some("a"));
    }
}
