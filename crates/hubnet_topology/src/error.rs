//! Error types for topology resolution.

use thiserror::Error;

use hubnet_registry::RegistryError;

/// Result type alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Errors that can occur while resolving the topology.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// A network output the resolver needs was never produced.
    #[error("Dependency error: no network output for environment '{environment}'")]
    MissingNetwork { environment: String },

    #[error("Dependency error: environment '{environment}' has no VPN gateway to provide transit")]
    MissingVpnGateway { environment: String },

    #[error("Dependency error: subnet role '{role}' of '{environment}' was not provisioned")]
    SubnetNotProvisioned { environment: String, role: String },

    #[error("Peering between '{first}' and '{second}' is forbidden by policy")]
    ForbiddenPeering { first: String, second: String },

    #[error("Invalid topology policy: {0}")]
    InvalidPolicy(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl TopologyError {
    /// True for errors caused by a missing upstream output rather than bad
    /// configuration.
    pub fn is_dependency_error(&self) -> bool {
        matches!(
            self,
            TopologyError::MissingNetwork { .. }
                | TopologyError::MissingVpnGateway { .. }
                | TopologyError::SubnetNotProvisioned { .. }
        )
    }
}
