//! # hubnet_registry
//!
//! Environment registry and network data model for hubnet.
//!
//! This crate holds the static description of a hub-and-spoke deployment:
//! environments, their networks and subnets, per-environment capabilities,
//! and the configuration checks that must pass before anything is
//! provisioned.
//!
//! ## Example
//!
//! ```rust
//! use hubnet_registry::{DeploymentConfig, RegistryValidator};
//!
//! let config = DeploymentConfig::reference();
//! let registry = config.registry().unwrap();
//! RegistryValidator::check(&registry, &config.timezone_map()).unwrap();
//!
//! assert_eq!(registry.list_environments().len(), 5);
//! ```

pub mod cidr;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;
pub mod timezone;
pub mod validator;

pub use cidr::Ipv4Cidr;
pub use config::DeploymentConfig;
pub use error::{RegistryError, RegistryResult};
pub use models::{
    Capabilities, Environment, EnvironmentName, EnvironmentRole, MachineSpec, NetworkSpec,
    OsFamily, SubnetRole, SubnetSpec,
};
pub use registry::EnvironmentRegistry;
pub use timezone::{TimezoneEntry, TimezoneMap};
pub use validator::{validate_environment_network, RegistryValidator, ValidationResult};
