use super::provider::AccessToken;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Access tokens keyed by the OAuth scope they were issued for.
///
/// Expired entries are never handed out; they stay in the map until the
/// scope is refreshed, invalidated or the cache is cleared.
#[derive(Default)]
pub struct TokenCache {
    tokens: RwLock<HashMap<String, AccessToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for `scope` that has not yet expired.
    pub async fn get(&self, scope: &str) -> Option<AccessToken> {
        self.lookup(scope, |token| !token.is_expired()).await
    }

    /// Token for `scope` that is outside the refresh buffer, i.e. one a
    /// caller can use without asking the provider again.
    pub async fn fresh(&self, scope: &str) -> Option<AccessToken> {
        self.lookup(scope, |token| !token.needs_refresh()).await
    }

    pub async fn needs_refresh(&self, scope: &str) -> bool {
        self.fresh(scope).await.is_none()
    }

    /// Stores `token` for `scope`, replacing any previous entry.
    pub async fn set(&self, scope: impl Into<String>, token: AccessToken) {
        self.tokens.write().await.insert(scope.into(), token);
    }

    /// Forgets the token for `scope`. Returns `true` if one was cached.
    pub async fn invalidate(&self, scope: &str) -> bool {
        self.tokens.write().await.remove(scope).is_some()
    }

    pub async fn clear(&self) {
        self.tokens.write().await.clear();
    }

    async fn lookup(
        &self,
        scope: &str,
        usable: impl Fn(&AccessToken) -> bool,
    ) -> Option<AccessToken> {
        self.tokens
            .read()
            .await
            .get(scope)
            .filter(|token| usable(token))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn unknown_scope_needs_refresh() {
        let cache = TokenCache::new();
        assert!(cache.needs_refresh("scope").await);
        assert!(cache.get("scope").await.is_none());
    }

    #[tokio::test]
    async fn long_lived_token_is_fresh() {
        let cache = TokenCache::new();
        cache
            .set("scope", AccessToken::bearer("abc", Some(Duration::hours(1))))
            .await;
        assert!(!cache.needs_refresh("scope").await);
        assert_eq!(cache.fresh("scope").await.unwrap().token, "abc");
    }

    #[tokio::test]
    async fn token_inside_buffer_is_usable_but_not_fresh() {
        let cache = TokenCache::new();
        cache
            .set("scope", AccessToken::bearer("abc", Some(Duration::seconds(60))))
            .await;
        assert!(cache.get("scope").await.is_some());
        assert!(cache.fresh("scope").await.is_none());
    }

    #[tokio::test]
    async fn expired_token_is_hidden() {
        let cache = TokenCache::new();
        cache
            .set("scope", AccessToken::bearer("abc", Some(Duration::seconds(-1))))
            .await;
        assert!(cache.get("scope").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_is_per_scope() {
        let cache = TokenCache::new();
        cache.set("a", AccessToken::bearer("1", None)).await;
        cache.set("b", AccessToken::bearer("2", None)).await;

        assert!(cache.invalidate("a").await);
        assert!(!cache.invalidate("a").await);
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());

        cache.clear().await;
        assert!(cache.get("b").await.is_none());
    }
}
