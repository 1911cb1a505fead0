//! Client configuration: the immutable settings bag, its loaders and the
//! process-wide default registry.

pub mod configuration;
pub mod loader;
pub mod registry;

pub use configuration::{
    Configuration, ConfigurationBuilder, DEFAULT_API_VERSION, DEFAULT_ENDPOINT,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use loader::ConfigurationFile;
pub use registry::{ConfigurationRegistry, set_global_configuration};
