use super::provider::{AccessToken, CredentialProvider};
use crate::common::CredentialError;
use async_trait::async_trait;

/// Credential that always hands out the same pre-acquired bearer token.
///
/// Useful when tokens are obtained out of band (for example by the CLI of the
/// cloud provider) and passed in through `AZURE_ACCESS_TOKEN`.
#[derive(Clone)]
pub struct StaticTokenCredential {
    token: AccessToken,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::bearer(token, None),
        }
    }

    /// Wraps a token that carries its own expiry.
    pub fn from_token(token: AccessToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenCredential {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
        if self.token.token.is_empty() {
            return Err(CredentialError::Unavailable(
                "static token is empty".to_string(),
            ));
        }
        if self.token.is_expired() {
            return Err(CredentialError::Expired);
        }
        Ok(self.token.clone())
    }

    fn kind(&self) -> &'static str {
        "static_token"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn returns_configured_token() {
        let credential = StaticTokenCredential::new("abc");
        let token = credential.get_token("scope/.default").await.unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(token.token_type, "Bearer");
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let credential = StaticTokenCredential::from_token(AccessToken::bearer(
            "abc",
            Some(Duration::seconds(-10)),
        ));
        assert_eq!(
            credential.get_token("scope").await,
            Err(CredentialError::Expired)
        );
    }

    #[tokio::test]
    async fn empty_token_is_unavailable() {
        let credential = StaticTokenCredential::new("");
        assert!(matches!(
            credential.get_token("scope").await,
            Err(CredentialError::Unavailable(_))
        ));
    }
}
