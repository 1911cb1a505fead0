//! Construction of [`ComputeManagementClient`] handles.
//!
//! The factory is stateless: every call validates its configuration,
//! acquires an execution context and wires the client together. Nothing is
//! cached between calls and construction never touches the network.
//!
//! Validation and HTTP client setup happen before the worker pool is
//! created, so a failed call never leaves a pool behind.

use crate::client::{ComputeManagementClient, ContextOwnership};
use crate::common::FactoryError;
use crate::config::{Configuration, ConfigurationRegistry};
use crate::execution::{ExecutionContext, PoolSettings};
use std::sync::Arc;

/// Produces the execution context for each client the factory builds.
///
/// Implement this to control how dedicated pools are created, for example
/// to record allocations or to size pools per deployment.
pub trait ContextSource: Send + Sync {
    fn create_context(&self) -> Result<ExecutionContext, FactoryError>;
}

/// Default [`ContextSource`]: a fresh pool per client, sized by
/// [`PoolSettings`].
#[derive(Debug, Clone, Default)]
pub struct DedicatedPools {
    settings: PoolSettings,
}

impl DedicatedPools {
    pub fn new(settings: PoolSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }
}

impl ContextSource for DedicatedPools {
    fn create_context(&self) -> Result<ExecutionContext, FactoryError> {
        ExecutionContext::from_settings(&self.settings)
            .map_err(|e| FactoryError::ExecutionContext(e.to_string()))
    }
}

/// Builds compute management clients.
///
/// # Examples
///
/// ```no_run
/// use compute::auth::StaticTokenCredential;
/// use compute::config::{Configuration, ConfigurationRegistry};
/// use compute::ClientFactory;
/// use std::sync::Arc;
///
/// let registry = ConfigurationRegistry::new();
/// registry.set(
///     Configuration::builder()
///         .endpoint("https://management.example.com")
///         .subscription_id("sub-123")
///         .credential(Arc::new(StaticTokenCredential::new("token")))
///         .build(),
/// )?;
///
/// let client = ClientFactory::default().create_default(&registry)?;
/// assert_eq!(client.configuration().subscription_id(), Some("sub-123"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct ClientFactory {
    contexts: Arc<dyn ContextSource>,
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self::new(PoolSettings::default())
    }
}

impl ClientFactory {
    /// A factory that gives each client its own pool sized by `settings`.
    pub fn new(settings: PoolSettings) -> Self {
        Self::with_context_source(Arc::new(DedicatedPools::new(settings)))
    }

    pub fn with_context_source(contexts: Arc<dyn ContextSource>) -> Self {
        Self { contexts }
    }

    /// Builds a client bound to the default configuration held by `registry`.
    ///
    /// # Errors
    ///
    /// [`FactoryError::ConfigurationMissing`] when the registry is empty,
    /// otherwise as [`ClientFactory::create_with_config`].
    pub fn create_default(
        &self,
        registry: &ConfigurationRegistry,
    ) -> Result<ComputeManagementClient, FactoryError> {
        let config = registry.get().ok_or_else(|| {
            log::warn!("No default configuration has been established");
            FactoryError::ConfigurationMissing
        })?;
        self.create_dedicated(config)
    }

    /// Builds a client bound to `config` exactly as given.
    ///
    /// # Errors
    ///
    /// [`FactoryError::InvalidConfiguration`] when `config` lacks an endpoint
    /// or credential provider; no pool is allocated in that case.
    pub fn create_with_config(
        &self,
        config: Configuration,
    ) -> Result<ComputeManagementClient, FactoryError> {
        self.create_dedicated(Arc::new(config))
    }

    /// Like [`ClientFactory::create_with_config`] for a configuration that is
    /// already shared between clients.
    pub fn create_with_shared_config(
        &self,
        config: Arc<Configuration>,
    ) -> Result<ComputeManagementClient, FactoryError> {
        self.create_dedicated(config)
    }

    /// Builds a client that runs on a caller-supplied context.
    ///
    /// The caller keeps ownership of `context`; the client never shuts it
    /// down.
    pub fn create_with_context(
        &self,
        config: Configuration,
        context: ExecutionContext,
    ) -> Result<ComputeManagementClient, FactoryError> {
        let config = Arc::new(config);
        let http_client = Self::prepare(&config)?;
        Ok(ComputeManagementClient::new(
            config,
            context,
            ContextOwnership::Shared,
            http_client,
        ))
    }

    fn create_dedicated(
        &self,
        config: Arc<Configuration>,
    ) -> Result<ComputeManagementClient, FactoryError> {
        let http_client = Self::prepare(&config)?;
        let context = self.contexts.create_context()?;
        Ok(ComputeManagementClient::new(
            config,
            context,
            ContextOwnership::Dedicated,
            http_client,
        ))
    }

    fn prepare(config: &Configuration) -> Result<reqwest::Client, FactoryError> {
        if let Err(e) = config.validate() {
            log::warn!("Rejected client configuration: {e}");
            return Err(e.into());
        }
        ComputeManagementClient::http_client_for(config)
    }
}

/// Builds a client from the default configuration in `registry`, on a new
/// elastic pool.
///
/// Pass [`ConfigurationRegistry::global`] to use the process-wide default.
pub fn create_default(
    registry: &ConfigurationRegistry,
) -> Result<ComputeManagementClient, FactoryError> {
    ClientFactory::default().create_default(registry)
}

/// Builds a client bound to `config`, on a new elastic pool.
pub fn create_with_config(config: Configuration) -> Result<ComputeManagementClient, FactoryError> {
    ClientFactory::default().create_with_config(config)
}

/// Builds a client bound to `config` that runs on the caller's `context`.
pub fn create_with_context(
    config: Configuration,
    context: ExecutionContext,
) -> Result<ComputeManagementClient, FactoryError> {
    ClientFactory::default().create_with_context(config, context)
}
