pub mod errors;

pub use errors::{ClientError, ConfigurationError, CredentialError, FactoryError, RegistryError};
