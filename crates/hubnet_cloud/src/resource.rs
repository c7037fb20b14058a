//! Resource records and provider-style identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kinds of resources the provisioners manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ResourceGroup,
    VirtualNetwork,
    Subnet,
    PublicIp,
    NatGateway,
    NatGatewayAssociation,
    VpnGateway,
    VirtualMachine,
    VmExtension,
    VnetPeering,
    RouteTable,
    RouteTableAssociation,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ResourceGroup => "resource_group",
            ResourceKind::VirtualNetwork => "virtual_network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::PublicIp => "public_ip",
            ResourceKind::NatGateway => "nat_gateway",
            ResourceKind::NatGatewayAssociation => "nat_gateway_association",
            ResourceKind::VpnGateway => "vpn_gateway",
            ResourceKind::VirtualMachine => "virtual_machine",
            ResourceKind::VmExtension => "vm_extension",
            ResourceKind::VnetPeering => "vnet_peering",
            ResourceKind::RouteTable => "route_table",
            ResourceKind::RouteTableAssociation => "route_table_association",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Desired or observed state of a single resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    pub kind: ResourceKind,
    pub name: String,
    pub properties: Value,
}

impl ResourceRecord {
    pub fn new(
        id: impl Into<String>,
        kind: ResourceKind,
        name: impl Into<String>,
        properties: Value,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            properties,
        }
    }

    /// True if both records describe the same desired state.
    pub fn matches(&self, other: &ResourceRecord) -> bool {
        self.kind == other.kind && self.name == other.name && self.properties == other.properties
    }
}

/// Result of ensuring one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    Created,
    /// Already present with matching parameters.
    Unchanged,
}

impl ApplyOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, ApplyOutcome::Created)
    }
}

/// Builds deterministic resource identifiers for one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIds {
    subscription_id: String,
}

impl ResourceIds {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group(&self, resource_group: &str) -> String {
        format!("/subscriptions/{}/resourceGroups/{}", self.subscription_id, resource_group)
    }

    fn provider(&self, resource_group: &str, resource_type: &str, name: &str) -> String {
        format!(
            "{}/providers/{}/{}",
            self.resource_group(resource_group),
            resource_type,
            name
        )
    }

    pub fn virtual_network(&self, resource_group: &str, name: &str) -> String {
        self.provider(resource_group, "Microsoft.Network/virtualNetworks", name)
    }

    pub fn subnet(&self, resource_group: &str, vnet: &str, name: &str) -> String {
        format!("{}/subnets/{}", self.virtual_network(resource_group, vnet), name)
    }

    pub fn public_ip(&self, resource_group: &str, name: &str) -> String {
        self.provider(resource_group, "Microsoft.Network/publicIPAddresses", name)
    }

    pub fn nat_gateway(&self, resource_group: &str, name: &str) -> String {
        self.provider(resource_group, "Microsoft.Network/natGateways", name)
    }

    pub fn vpn_gateway(&self, resource_group: &str, name: &str) -> String {
        self.provider(resource_group, "Microsoft.Network/virtualNetworkGateways", name)
    }

    pub fn virtual_machine(&self, resource_group: &str, name: &str) -> String {
        self.provider(resource_group, "Microsoft.Compute/virtualMachines", name)
    }

    pub fn vm_extension(&self, vm_id: &str, name: &str) -> String {
        format!("{}/extensions/{}", vm_id, name)
    }

    pub fn peering(&self, resource_group: &str, vnet: &str, name: &str) -> String {
        format!(
            "{}/virtualNetworkPeerings/{}",
            self.virtual_network(resource_group, vnet),
            name
        )
    }

    pub fn route_table(&self, resource_group: &str, name: &str) -> String {
        self.provider(resource_group, "Microsoft.Network/routeTables", name)
    }

    /// Keyed by subnet: a subnet holds at most one route table association.
    pub fn route_table_association(&self, subnet_id: &str) -> String {
        format!("{}/routeTableAssociation", subnet_id)
    }

    pub fn nat_gateway_association(&self, subnet_id: &str) -> String {
        format!("{}/natGatewayAssociation", subnet_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_ids() {
        let ids = ResourceIds::new("sub-1");
        assert_eq!(ids.resource_group("rg-hub"), "/subscriptions/sub-1/resourceGroups/rg-hub");
        assert_eq!(
            ids.subnet("rg-hub", "vnet-hub", "GatewaySubnet"),
            "/subscriptions/sub-1/resourceGroups/rg-hub/providers/Microsoft.Network/virtualNetworks/vnet-hub/subnets/GatewaySubnet"
        );
        assert!(ids
            .peering("rg-hub", "vnet-hub", "hub-to-velocity")
            .ends_with("virtualNetworks/vnet-hub/virtualNetworkPeerings/hub-to-velocity"));
    }

    #[test]
    fn test_record_matching_ignores_key_order() {
        let a = ResourceRecord::new("/x", ResourceKind::Subnet, "x", json!({"a": 1, "b": 2}));
        let b = ResourceRecord::new("/x", ResourceKind::Subnet, "x", json!({"b": 2, "a": 1}));
        let c = ResourceRecord::new("/x", ResourceKind::Subnet, "x", json!({"a": 1, "b": 3}));
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }
}
