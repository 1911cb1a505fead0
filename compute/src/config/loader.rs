//! Configuration loaders.
//!
//! Three sources are supported: the process environment, a JSON file and a
//! flat map of dotted property keys. None of them is consulted implicitly;
//! callers pick a loader and register the result (see
//! [`ConfigurationRegistry`](super::ConfigurationRegistry)).

use super::configuration::{Configuration, ConfigurationBuilder, DEFAULT_ENDPOINT};
use crate::auth::StaticTokenCredential;
use crate::common::ConfigurationError;
use crate::utils::env::{
    ACCESS_TOKEN_VAR, API_VERSION_VAR, ENDPOINT_VAR, EnvUtils, SUBSCRIPTION_VAR,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Property key for the management endpoint.
pub const PROPERTY_URI: &str = "management.uri";
/// Property key for the subscription id.
pub const PROPERTY_SUBSCRIPTION_ID: &str = "management.subscription.id";
/// Property key for the API version.
pub const PROPERTY_API_VERSION: &str = "management.api.version";
/// Property key for a pre-acquired bearer token.
pub const PROPERTY_ACCESS_TOKEN: &str = "management.access.token";

/// On-disk representation of a configuration.
///
/// ```json
/// {
///   "endpoint": "https://management.azure.com",
///   "subscription_id": "sub-123",
///   "api_version": "2024-07-01",
///   "request_timeout_secs": 30,
///   "access_token": "eyJ0eXAi..."
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigurationFile {
    pub endpoint: Option<String>,
    pub subscription_id: Option<String>,
    pub api_version: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub system_proxy: Option<bool>,
    pub access_token: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl ConfigurationFile {
    pub fn into_builder(self) -> ConfigurationBuilder {
        let mut builder = Configuration::builder()
            .endpoint(self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()));

        if let Some(subscription_id) = self.subscription_id {
            builder = builder.subscription_id(subscription_id);
        }
        if let Some(api_version) = self.api_version {
            builder = builder.api_version(api_version);
        }
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        if let Some(enabled) = self.system_proxy {
            builder = builder.system_proxy(enabled);
        }
        if let Some(token) = self.access_token.filter(|t| !t.trim().is_empty()) {
            builder = builder.credential(Arc::new(StaticTokenCredential::new(token)));
        }
        for (key, value) in self.properties {
            builder = builder.property(key, value);
        }
        builder
    }
}

impl Configuration {
    /// Reads connection settings from the environment.
    ///
    /// | Variable | Meaning | Default |
    /// |----------|---------|---------|
    /// | `AZURE_MANAGEMENT_ENDPOINT` | management endpoint | `https://management.azure.com` |
    /// | `AZURE_SUBSCRIPTION_ID` | subscription id | none |
    /// | `AZURE_COMPUTE_API_VERSION` | API version | `2024-07-01` |
    /// | `AZURE_ACCESS_TOKEN` | bearer token | none (no credential) |
    ///
    /// The result is not validated; a missing token simply leaves the
    /// credential unset.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::Environment`] when one of the variables is set
    /// but blank or not valid UTF-8. Unset variables fall back to defaults.
    pub fn from_env() -> Result<Configuration, ConfigurationError> {
        Ok(Self::env_file()?.into_builder().build())
    }

    /// Like [`Configuration::from_env`], but fails unless the result validates.
    pub fn from_env_validated() -> Result<Configuration, ConfigurationError> {
        let config = Self::from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn env_file() -> Result<ConfigurationFile, ConfigurationError> {
        Ok(ConfigurationFile {
            endpoint: EnvUtils::get_optional_var(ENDPOINT_VAR)?,
            subscription_id: EnvUtils::get_optional_var(SUBSCRIPTION_VAR)?,
            api_version: EnvUtils::get_optional_var(API_VERSION_VAR)?,
            access_token: EnvUtils::get_optional_var(ACCESS_TOKEN_VAR)?,
            ..ConfigurationFile::default()
        })
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::Io`] when the file cannot be read and
    /// [`ConfigurationError::Parse`] when it is not valid JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Configuration, ConfigurationError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Configuration, ConfigurationError> {
        let file: ConfigurationFile = serde_json::from_str(contents)
            .map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        Ok(file.into_builder().build())
    }

    /// Builds a configuration from dotted property keys.
    ///
    /// Recognised keys are [`PROPERTY_URI`], [`PROPERTY_SUBSCRIPTION_ID`],
    /// [`PROPERTY_API_VERSION`] and [`PROPERTY_ACCESS_TOKEN`]. Anything else is
    /// preserved in [`Configuration::properties`].
    pub fn from_properties(properties: &HashMap<String, String>) -> Configuration {
        let mut file = ConfigurationFile::default();
        for (key, value) in properties {
            match key.as_str() {
                PROPERTY_URI => file.endpoint = Some(value.clone()),
                PROPERTY_SUBSCRIPTION_ID => file.subscription_id = Some(value.clone()),
                PROPERTY_API_VERSION => file.api_version = Some(value.clone()),
                PROPERTY_ACCESS_TOKEN => file.access_token = Some(value.clone()),
                _ => {
                    file.properties.insert(key.clone(), value.clone());
                }
            }
        }
        file.into_builder().build()
    }
}
