//! Error types for the environment registry.

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while loading or validating the environment configuration.
///
/// Every variant is a configuration error: it is detected before any
/// provider call and names the environment or subnet it concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("Duplicate environment: {0}")]
    DuplicateEnvironment(String),

    #[error("No hub environment declared")]
    MissingHub,

    #[error("Multiple hub environments declared: {}", .0.join(", "))]
    MultipleHubs(Vec<String>),

    #[error("Invalid CIDR '{cidr}': {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error("Network CIDR {first_cidr} of '{first}' overlaps {second_cidr} of '{second}'")]
    OverlappingNetworks {
        first: String,
        first_cidr: String,
        second: String,
        second_cidr: String,
    },

    #[error("Subnet '{subnet}' ({cidr}) in '{environment}' is outside network {network_cidr}")]
    SubnetOutsideNetwork {
        environment: String,
        subnet: String,
        cidr: String,
        network_cidr: String,
    },

    #[error("Subnets '{first}' and '{second}' in '{environment}' overlap")]
    OverlappingSubnets {
        environment: String,
        first: String,
        second: String,
    },

    #[error("Subnet {kind} '{value}' declared twice in '{environment}'")]
    DuplicateSubnet {
        environment: String,
        kind: String,
        value: String,
    },

    #[error("Environment '{environment}' requires a '{role}' subnet: {reason}")]
    MissingSubnetRole {
        environment: String,
        role: String,
        reason: String,
    },

    #[error("Hub environment '{0}' must hold the VPN gateway")]
    HubWithoutVpnGateway(String),

    #[error("Invalid resource name '{name}' for {kind} in '{environment}'")]
    InvalidName {
        environment: String,
        kind: String,
        name: String,
    },

    #[error("No timezone mapping for location '{location}' of '{environment}'")]
    MissingTimezone { environment: String, location: String },

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfiguration(Vec<String>),

    #[error("IO error: {0}")]
    Io(String),

    #[error("YAML error: {0}")]
    Yaml(String),
}

impl From<std::io::Error> for RegistryError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for RegistryError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml(e.to_string())
    }
}
