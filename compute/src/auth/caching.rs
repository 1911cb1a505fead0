use super::provider::{AccessToken, CredentialProvider};
use super::token_cache::TokenCache;
use crate::common::CredentialError;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Wraps another provider and reuses its tokens until they near expiry.
///
/// Concurrent callers that find the cache stale are serialised so only one
/// of them asks the inner provider for a new token.
pub struct CachingCredential<P> {
    inner: P,
    cache: TokenCache,
    refresh_lock: Mutex<()>,
}

impl<P: CredentialProvider> CachingCredential<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: TokenCache::new(),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Drops the token cached for `scope`, e.g. after the API rejected it.
    pub async fn invalidate(&self, scope: &str) {
        if self.cache.invalidate(scope).await {
            log::debug!("Invalidated cached token for scope {scope}");
        }
    }

    /// Drops every cached token so the next request goes to the inner provider.
    pub async fn clear(&self) {
        self.cache.clear().await;
    }
}

#[async_trait]
impl<P: CredentialProvider> CredentialProvider for CachingCredential<P> {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        if let Some(token) = self.cache.fresh(scope).await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(token) = self.cache.fresh(scope).await {
            return Ok(token);
        }

        log::debug!(
            "Refreshing token for scope {scope} via {} credential",
            self.inner.kind()
        );
        let token = self.inner.get_token(scope).await?;
        self.cache.set(scope, token.clone()).await;
        Ok(token)
    }

    fn kind(&self) -> &'static str {
        self.inner.kind()
    }
}
