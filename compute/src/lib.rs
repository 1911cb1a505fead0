//! # Compute Management
//!
//! Factory and configuration layer for compute management API clients.
//! A client is built from an immutable [`config::Configuration`] (supplied
//! directly or taken from a [`config::ConfigurationRegistry`]) and an
//! [`execution::ExecutionContext`] that runs its operations.
//!
//! ## Modules
//!
//! - [`auth`] - Credential providers and token caching
//! - [`client`] - The management client handle
//! - [`common`] - Error types
//! - [`config`] - Configuration, loaders and the default registry
//! - [`execution`] - Worker pools backing clients
//! - [`factory`] - Client construction
//! - [`utils`] - Environment variable helpers

pub mod auth;
pub mod client;
pub mod common;
pub mod config;
pub mod execution;
pub mod factory;
pub mod utils;

pub use client::{ComputeManagementClient, ContextOwnership};
pub use factory::{
    ClientFactory, ContextSource, DedicatedPools, create_default, create_with_config,
    create_with_context,
};
