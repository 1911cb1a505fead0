//! Utility helpers shared by the configuration loaders.

pub mod env;

pub use env::{EnvUtils, EnvVarError};
