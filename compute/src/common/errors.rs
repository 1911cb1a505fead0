use crate::utils::env::EnvVarError;
use thiserror::Error;

/// Errors raised while building or validating a [`Configuration`].
///
/// Validation only checks the minimal contract a client needs to be usable:
/// an absolute `http`/`https` endpoint and a credential provider. Everything
/// else is optional at construction time.
///
/// [`Configuration`]: crate::config::Configuration
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("Configuration is missing a management endpoint")]
    MissingEndpoint,

    #[error("Management endpoint '{endpoint}' is invalid: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Configuration is missing a credential provider")]
    MissingCredentialProvider,

    #[error(transparent)]
    Environment(#[from] EnvVarError),

    #[error("Failed to read configuration file: {0}")]
    Io(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Errors raised by the process-wide configuration registry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("A default configuration has already been established")]
    AlreadyInitialized,

    #[error("Refusing to register an invalid configuration: {0}")]
    Invalid(#[from] ConfigurationError),
}

/// Errors surfaced synchronously by the client factory.
///
/// Construction either fully succeeds or fails before any worker pool is
/// allocated, so there is never partial state to roll back.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FactoryError {
    /// No process-wide default configuration has been established.
    #[error("No default configuration has been established")]
    ConfigurationMissing,

    /// The supplied configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigurationError),

    /// The operating system refused to start the worker pool.
    #[error("Failed to start execution context: {0}")]
    ExecutionContext(String),

    /// The local HTTP client could not be initialised.
    #[error("Failed to initialise HTTP client: {0}")]
    HttpClient(String),
}

/// Errors produced by credential providers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CredentialError {
    #[error("Credential unavailable: {0}")]
    Unavailable(String),

    #[error("Access token has expired")]
    Expired,
}

/// Errors produced by requests issued through a management client.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("Configuration has no subscription id; resource URLs cannot be built")]
    MissingSubscription,

    #[error("Invalid resource path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Management API returned {status}: {code} - {message}{}", request_id_suffix(.request_id))]
    Api {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    #[error("Refusing to continue paging: {0}")]
    Pagination(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Operation was cancelled because the execution context shut down")]
    Cancelled,
}

fn request_id_suffix(request_id: &Option<String>) -> String {
    request_id
        .as_deref()
        .map(|id| format!(" [Request ID: {id}]"))
        .unwrap_or_default()
}

impl ClientError {
    /// Returns `true` for failures a caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Request(_) => true,
            ClientError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
