use crate::common::CredentialError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Tokens this close to expiry are treated as due for refresh.
const REFRESH_BUFFER_SECS: i64 = 300;

/// Access token returned by a [`CredentialProvider`].
#[derive(Clone, PartialEq)]
pub struct AccessToken {
    /// The raw token string
    pub token: String,
    /// The type of token (e.g., "Bearer")
    pub token_type: String,
    /// When the token stops being valid; `None` for tokens that never expire
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Creates a bearer token that expires `expires_in` from now.
    pub fn bearer(token: impl Into<String>, expires_in: Option<Duration>) -> Self {
        Self {
            token: token.into(),
            token_type: "Bearer".to_string(),
            expires_at: expires_in.map(|ttl| Utc::now() + ttl),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Returns `true` once the token is within five minutes of expiring.
    pub fn needs_refresh(&self) -> bool {
        self.expires_at
            .is_some_and(|at| Utc::now() + Duration::seconds(REFRESH_BUFFER_SECS) >= at)
    }

    /// Value for the HTTP `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.token)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of access tokens for the management API.
///
/// The factory only checks that a provider is present; tokens are requested
/// lazily by the client when it issues a request, so construction never
/// touches the network.
///
/// # Examples
///
/// ```no_run
/// use async_trait::async_trait;
/// use compute::auth::{AccessToken, CredentialProvider};
/// use compute::common::CredentialError;
///
/// struct FixedToken;
///
/// #[async_trait]
/// impl CredentialProvider for FixedToken {
///     async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
///         Ok(AccessToken::bearer("example", None))
///     }
///
///     fn kind(&self) -> &'static str {
///         "fixed"
///     }
/// }
/// ```
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Obtains a token valid for `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when no usable token can be produced.
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;

    /// Short, non-secret label identifying the provider in logs and `Debug` output.
    fn kind(&self) -> &'static str;
}
