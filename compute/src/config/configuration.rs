use crate::auth::CredentialProvider;
use crate::common::ConfigurationError;
use reqwest::Url;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Public management endpoint used when none is configured explicitly.
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
/// Compute resource provider API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "2024-07-01";
/// Per-request timeout applied by clients unless overridden.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Immutable connection settings for a compute management client.
///
/// A `Configuration` is built once through [`ConfigurationBuilder`] (or one
/// of the loaders in [`super::loader`]) and never changes afterwards, so it
/// can be shared across any number of clients behind an `Arc`.
///
/// Building never fails; [`Configuration::validate`] checks the minimal
/// contract and is run by the factory before any resource is allocated.
///
/// # Examples
///
/// ```no_run
/// use compute::auth::StaticTokenCredential;
/// use compute::config::Configuration;
/// use std::sync::Arc;
///
/// let config = Configuration::builder()
///     .endpoint("https://management.example.com")
///     .subscription_id("sub-123")
///     .credential(Arc::new(StaticTokenCredential::new("token")))
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct Configuration {
    endpoint: String,
    subscription_id: Option<String>,
    credential: Option<Arc<dyn CredentialProvider>>,
    api_version: String,
    request_timeout: Duration,
    user_agent: String,
    system_proxy: bool,
    properties: BTreeMap<String, String>,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription_id.as_deref()
    }

    pub fn credential(&self) -> Option<&Arc<dyn CredentialProvider>> {
        self.credential.as_ref()
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Whether clients honour the proxy settings of the environment.
    pub fn system_proxy(&self) -> bool {
        self.system_proxy
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Checks that the configuration can back a client.
    ///
    /// Only the endpoint and credential provider are mandatory. The
    /// subscription id is optional here and is demanded later, when a
    /// subscription-scoped URL is built.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::MissingEndpoint`] for a blank endpoint
    /// - [`ConfigurationError::InvalidEndpoint`] when the endpoint is not an
    ///   absolute `http`/`https` URL with a host
    /// - [`ConfigurationError::MissingCredentialProvider`] without a credential
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.endpoint_url()?;
        if self.credential.is_none() {
            return Err(ConfigurationError::MissingCredentialProvider);
        }
        Ok(())
    }

    /// Parses the endpoint into a URL.
    pub fn endpoint_url(&self) -> Result<Url, ConfigurationError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigurationError::MissingEndpoint);
        }

        let invalid = |reason: String| ConfigurationError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };

        let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host".to_string()));
        }
        Ok(url)
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        let same_credential = match (&self.credential, &other.credential) {
            (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (None, None) => true,
            _ => false,
        };

        same_credential
            && self.endpoint == other.endpoint
            && self.subscription_id == other.subscription_id
            && self.api_version == other.api_version
            && self.request_timeout == other.request_timeout
            && self.user_agent == other.user_agent
            && self.system_proxy == other.system_proxy
            && self.properties == other.properties
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("endpoint", &self.endpoint)
            .field("subscription_id", &self.subscription_id)
            .field("credential", &self.credential.as_ref().map(|c| c.kind()))
            .field("api_version", &self.api_version)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("system_proxy", &self.system_proxy)
            .field("properties", &self.properties)
            .finish()
    }
}

/// Builder for [`Configuration`].
///
/// Unset values fall back to [`DEFAULT_API_VERSION`],
/// [`DEFAULT_REQUEST_TIMEOUT`] and a crate-versioned user agent. The endpoint
/// has no fallback here; loaders supply [`DEFAULT_ENDPOINT`] themselves.
#[derive(Clone, Default)]
pub struct ConfigurationBuilder {
    endpoint: Option<String>,
    subscription_id: Option<String>,
    credential: Option<Arc<dyn CredentialProvider>>,
    api_version: Option<String>,
    request_timeout: Option<Duration>,
    user_agent: Option<String>,
    system_proxy: Option<bool>,
    properties: BTreeMap<String, String>,
}

impl ConfigurationBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self
    }

    pub fn credential(mut self, credential: Arc<dyn CredentialProvider>) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Disable to ignore `HTTP_PROXY`-style environment settings.
    pub fn system_proxy(mut self, enabled: bool) -> Self {
        self.system_proxy = Some(enabled);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Configuration {
        Configuration {
            endpoint: self.endpoint.unwrap_or_default(),
            subscription_id: self.subscription_id.filter(|s| !s.trim().is_empty()),
            credential: self.credential,
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            user_agent: self.user_agent.unwrap_or_else(|| {
                format!("compute-management/{}", env!("CARGO_PKG_VERSION"))
            }),
            system_proxy: self.system_proxy.unwrap_or(true),
            properties: self.properties,
        }
    }
}
