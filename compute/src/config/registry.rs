//! Process-wide default configuration.
//!
//! The registry is written at most once and read lock-free afterwards, so
//! any number of threads can resolve the default while clients are being
//! built. Tests create their own [`ConfigurationRegistry`] instead of
//! touching the global one.

use super::configuration::Configuration;
use crate::common::{ConfigurationError, RegistryError};
use once_cell::sync::OnceCell;
use std::sync::Arc;

static GLOBAL_REGISTRY: ConfigurationRegistry = ConfigurationRegistry::new();

/// Initialize-once holder for a default [`Configuration`].
///
/// # Examples
///
/// ```no_run
/// use compute::auth::StaticTokenCredential;
/// use compute::config::{Configuration, ConfigurationRegistry};
/// use std::sync::Arc;
///
/// let registry = ConfigurationRegistry::new();
/// registry.set(
///     Configuration::builder()
///         .endpoint("https://management.example.com")
///         .credential(Arc::new(StaticTokenCredential::new("token")))
///         .build(),
/// )?;
/// assert!(registry.get().is_some());
/// # Ok::<(), compute::common::RegistryError>(())
/// ```
#[derive(Debug, Default)]
pub struct ConfigurationRegistry {
    slot: OnceCell<Arc<Configuration>>,
}

impl ConfigurationRegistry {
    pub const fn new() -> Self {
        Self {
            slot: OnceCell::new(),
        }
    }

    /// The process-wide registry consulted by [`crate::create_default`].
    pub fn global() -> &'static ConfigurationRegistry {
        &GLOBAL_REGISTRY
    }

    /// Establishes the default configuration.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Invalid`] when `config` fails validation and
    /// [`RegistryError::AlreadyInitialized`] when a default already exists;
    /// the existing value is kept in both cases.
    pub fn set(&self, config: Configuration) -> Result<Arc<Configuration>, RegistryError> {
        if let Err(e) = config.validate() {
            log::warn!("Rejected default configuration: {e}");
            return Err(e.into());
        }

        let config = Arc::new(config);
        match self.slot.set(config.clone()) {
            Ok(()) => {
                log::info!("Default configuration established for {}", config.endpoint());
                Ok(config)
            }
            Err(_) => {
                log::warn!("Ignoring second attempt to establish the default configuration");
                Err(RegistryError::AlreadyInitialized)
            }
        }
    }

    /// Returns the default configuration, if one has been established.
    pub fn get(&self) -> Option<Arc<Configuration>> {
        self.slot.get().cloned()
    }

    /// Returns the default, running `load` to establish it when absent.
    ///
    /// Under concurrent first use `load` runs exactly once; every caller
    /// observes the same value.
    pub fn get_or_try_init<F>(&self, load: F) -> Result<Arc<Configuration>, RegistryError>
    where
        F: FnOnce() -> Result<Configuration, ConfigurationError>,
    {
        self.slot
            .get_or_try_init(|| {
                let config = load()?;
                config.validate()?;
                log::info!("Default configuration loaded for {}", config.endpoint());
                Ok::<_, RegistryError>(Arc::new(config))
            })
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.get().is_some()
    }
}

/// Establishes the process-wide default configuration.
pub fn set_global_configuration(config: Configuration) -> Result<Arc<Configuration>, RegistryError> {
    ConfigurationRegistry::global().set(config)
}
