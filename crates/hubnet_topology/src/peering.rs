//! Peering edges.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use hubnet_registry::EnvironmentName;

use crate::handle::NetworkHandle;
use crate::policy::TransitFlags;

/// One side of a peering edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringEndpoint {
    pub environment: EnvironmentName,
    pub resource_group: String,
    pub vnet_name: String,
    pub vnet_id: String,
    pub allow_gateway_transit: bool,
    pub use_remote_gateway: bool,
}

impl PeeringEndpoint {
    fn from_handle(
        handle: &NetworkHandle,
        allow_gateway_transit: bool,
        use_remote_gateway: bool,
    ) -> Self {
        Self {
            environment: handle.environment_name.clone(),
            resource_group: handle.resource_group_name.clone(),
            vnet_name: handle.vnet_name.clone(),
            vnet_id: handle.vnet_id.clone(),
            allow_gateway_transit,
            use_remote_gateway,
        }
    }
}

/// Unordered pair of environment names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey(pub EnvironmentName, pub EnvironmentName);

impl EdgeKey {
    pub fn new(a: &EnvironmentName, b: &EnvironmentName) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }

    pub fn is_self_edge(&self) -> bool {
        self.0 == self.1
    }
}

/// A required connection between two environments' networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringEdge {
    /// Side named by the policy rule's source role.
    pub source: PeeringEndpoint,
    pub target: PeeringEndpoint,
    /// Name of the policy rule that produced this edge.
    pub rule: String,
}

impl PeeringEdge {
    pub fn new(
        source: &NetworkHandle,
        target: &NetworkHandle,
        transit: TransitFlags,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            source: PeeringEndpoint::from_handle(
                source,
                transit.source_allows_gateway_transit,
                false,
            ),
            target: PeeringEndpoint::from_handle(target, false, transit.target_uses_remote_gateway),
            rule: rule.into(),
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(&self.source.environment, &self.target.environment)
    }

    pub fn connects(&self, environment: &EnvironmentName) -> bool {
        &self.source.environment == environment || &self.target.environment == environment
    }

    pub fn is_transit(&self) -> bool {
        self.source.allow_gateway_transit || self.target.use_remote_gateway
    }

    /// The two directional peerings the provider needs for this edge.
    pub fn links(&self) -> [PeeringLink; 2] {
        [
            PeeringLink::between(&self.source, &self.target),
            PeeringLink::between(&self.target, &self.source),
        ]
    }
}

/// A provider-native, directional peering owned by the local network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringLink {
    pub name: String,
    pub resource_group: String,
    pub local_vnet_name: String,
    pub local_vnet_id: String,
    pub remote_vnet_id: String,
    pub allow_virtual_network_access: bool,
    pub allow_forwarded_traffic: bool,
    pub allow_gateway_transit: bool,
    pub use_remote_gateways: bool,
}

impl PeeringLink {
    fn between(local: &PeeringEndpoint, remote: &PeeringEndpoint) -> Self {
        Self {
            name: format!("{}-to-{}", local.environment, remote.environment),
            resource_group: local.resource_group.clone(),
            local_vnet_name: local.vnet_name.clone(),
            local_vnet_id: local.vnet_id.clone(),
            remote_vnet_id: remote.vnet_id.clone(),
            allow_virtual_network_access: true,
            allow_forwarded_traffic: true,
            allow_gateway_transit: local.allow_gateway_transit,
            use_remote_gateways: local.use_remote_gateway,
        }
    }
}

/// Edge set that keeps the first edge for each unordered pair and never
/// holds a self-edge. Iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct PeeringSet {
    edges: Vec<PeeringEdge>,
    keys: BTreeSet<EdgeKey>,
}

impl PeeringSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an edge; returns false if it was a self-edge or a duplicate.
    pub fn insert(&mut self, edge: PeeringEdge) -> bool {
        let key = edge.key();
        if key.is_self_edge() {
            debug!("Ignoring self-edge for {}", key.0);
            return false;
        }
        if !self.keys.insert(key.clone()) {
            debug!("Edge {}<->{} already present, keeping first", key.0, key.1);
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn contains(&self, key: &EdgeKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn into_edges(self) -> Vec<PeeringEdge> {
        self.edges
    }
}
