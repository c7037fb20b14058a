//! Data models for environments, networks and subnets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cidr::Ipv4Cidr;

/// Name of a deployment environment (e.g. `hub`, `clinical`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentName(String);

impl EnvironmentName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EnvironmentName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EnvironmentName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of an environment in the hub-and-spoke topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentRole {
    /// Transit root holding the VPN gateway.
    Hub,
    /// Firewall environment peered laterally with every spoke.
    Gateway,
    Spoke,
}

impl EnvironmentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentRole::Hub => "hub",
            EnvironmentRole::Gateway => "gateway",
            EnvironmentRole::Spoke => "spoke",
        }
    }
}

impl fmt::Display for EnvironmentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role tag of a subnet.
///
/// The role decides whether a subnet receives forced routing and where
/// machines may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetRole {
    Management,
    Shared,
    Gateway,
    Trust,
    Untrust,
    Custom,
    Dev,
}

impl SubnetRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetRole::Management => "management",
            SubnetRole::Shared => "shared",
            SubnetRole::Gateway => "gateway",
            SubnetRole::Trust => "trust",
            SubnetRole::Untrust => "untrust",
            SubnetRole::Custom => "custom",
            SubnetRole::Dev => "dev",
        }
    }
}

impl fmt::Display for SubnetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declared subnet of an environment's network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSpec {
    pub name: String,
    pub cidr: Ipv4Cidr,
    pub role: SubnetRole,
}

impl SubnetSpec {
    pub fn new(name: impl Into<String>, cidr: Ipv4Cidr, role: SubnetRole) -> Self {
        Self {
            name: name.into(),
            cidr,
            role,
        }
    }
}

/// Declared virtual network of an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    pub cidr: Ipv4Cidr,
}

/// Per-environment network capabilities.
///
/// These are declared explicitly rather than inferred from the environment
/// name or role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Outbound NAT gateway attached to the `shared` subnet.
    #[serde(default)]
    pub nat_gateway: bool,
    /// VPN gateway deployed into the `gateway` subnet.
    #[serde(default)]
    pub vpn_gateway: bool,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn nat() -> Self {
        Self {
            nat_gateway: true,
            vpn_gateway: false,
        }
    }

    pub fn transit_root() -> Self {
        Self {
            nat_gateway: true,
            vpn_gateway: true,
        }
    }
}

/// Operating system family of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Linux,
}

impl OsFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Windows => "windows",
            OsFamily::Linux => "linux",
        }
    }
}

/// Machine to be placed on one of the environment's subnets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub name: String,
    pub os: OsFamily,
    pub subnet: SubnetRole,
}

impl MachineSpec {
    pub fn new(name: impl Into<String>, os: OsFamily, subnet: SubnetRole) -> Self {
        Self {
            name: name.into(),
            os,
            subnet,
        }
    }
}

/// A deployment environment with its own network and resource scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: EnvironmentName,
    pub role: EnvironmentRole,
    pub resource_group: String,
    pub location: String,
    pub network: NetworkSpec,
    pub subnets: Vec<SubnetSpec>,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub machines: Vec<MachineSpec>,
}

impl Environment {
    pub fn new(
        name: impl Into<EnvironmentName>,
        role: EnvironmentRole,
        resource_group: impl Into<String>,
        location: impl Into<String>,
        network: NetworkSpec,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            resource_group: resource_group.into(),
            location: location.into(),
            network,
            subnets: Vec::new(),
            capabilities: Capabilities::default(),
            machines: Vec::new(),
        }
    }

    pub fn with_subnet(mut self, subnet: SubnetSpec) -> Self {
        self.subnets.push(subnet);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_machine(mut self, machine: MachineSpec) -> Self {
        self.machines.push(machine);
        self
    }

    /// Look up the subnet declared with the given role.
    pub fn subnet(&self, role: SubnetRole) -> Option<&SubnetSpec> {
        self.subnets.iter().find(|s| s.role == role)
    }

    pub fn is_spoke(&self) -> bool {
        self.role == EnvironmentRole::Spoke
    }

    pub fn requires_nat(&self) -> bool {
        self.capabilities.nat_gateway
    }
}
