//! Network outputs consumed by the resolver.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hubnet_registry::{EnvironmentName, Ipv4Cidr, SubnetRole};

/// A provisioned subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetHandle {
    pub id: String,
    pub name: String,
    pub cidr: Ipv4Cidr,
}

/// Identifiers produced by the network provisioner for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHandle {
    pub environment_name: EnvironmentName,
    pub vnet_id: String,
    pub vnet_name: String,
    pub address_space: Ipv4Cidr,
    pub subnets: BTreeMap<SubnetRole, SubnetHandle>,
    pub location: String,
    pub resource_group_name: String,
    pub nat_gateway_id: Option<String>,
    pub vpn_gateway_id: Option<String>,
}

impl NetworkHandle {
    pub fn subnet(&self, role: SubnetRole) -> Option<&SubnetHandle> {
        self.subnets.get(&role)
    }
}

/// Network outputs for every environment, keyed by name.
pub type NetworkHandles = BTreeMap<EnvironmentName, NetworkHandle>;
