//! Validated access to environment variables.
//!
//! Configuration loaders read connection settings from the process
//! environment. Values are trimmed, and a variable that is set but blank is
//! treated as an error rather than silently accepted.

use thiserror::Error;

/// Environment variable holding the management endpoint.
pub const ENDPOINT_VAR: &str = "AZURE_MANAGEMENT_ENDPOINT";
/// Environment variable holding the subscription id.
pub const SUBSCRIPTION_VAR: &str = "AZURE_SUBSCRIPTION_ID";
/// Environment variable holding the compute API version.
pub const API_VERSION_VAR: &str = "AZURE_COMPUTE_API_VERSION";
/// Environment variable holding a pre-acquired bearer token.
pub const ACCESS_TOKEN_VAR: &str = "AZURE_ACCESS_TOKEN";

/// Errors that can occur when reading environment variables.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EnvVarError {
    /// Environment variable is not set
    #[error("Environment variable '{name}' not found. Please set it in your environment.")]
    NotFound { name: String },

    /// Environment variable contains invalid UTF-8 characters
    #[error("Environment variable '{name}' contains invalid UTF-8 characters.")]
    InvalidUtf8 { name: String },

    /// Environment variable is set but contains only whitespace
    #[error("Environment variable '{name}' is empty. Please provide a valid value.")]
    Empty { name: String },
}

/// Helpers for reading and validating environment variables.
///
/// # Examples
///
/// ```no_run
/// use compute::utils::EnvUtils;
///
/// if let Some(subscription) = EnvUtils::get_optional_var("AZURE_SUBSCRIPTION_ID")? {
///     println!("Using subscription {subscription}");
/// }
/// # Ok::<(), compute::utils::EnvVarError>(())
/// ```
pub struct EnvUtils;

impl EnvUtils {
    /// Reads a variable, trims it and rejects blank values.
    ///
    /// # Errors
    ///
    /// Returns [`EnvVarError::NotFound`], [`EnvVarError::Empty`] or
    /// [`EnvVarError::InvalidUtf8`] depending on why the value is unusable.
    pub fn get_validated_var(name: &str) -> Result<String, EnvVarError> {
        match std::env::var(name) {
            Ok(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Err(EnvVarError::Empty {
                        name: name.to_string(),
                    })
                } else {
                    Ok(trimmed.to_string())
                }
            }
            Err(std::env::VarError::NotPresent) => Err(EnvVarError::NotFound {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(EnvVarError::InvalidUtf8 {
                name: name.to_string(),
            }),
        }
    }

    /// Reads a variable that may be left unset.
    ///
    /// An unset variable is `Ok(None)`. A variable that is set but blank or
    /// not valid UTF-8 is still an error.
    pub fn get_optional_var(name: &str) -> Result<Option<String>, EnvVarError> {
        match Self::get_validated_var(name) {
            Ok(value) => Ok(Some(value)),
            Err(EnvVarError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
