//! Declarative topology policy.
//!
//! Peering requirements are a table of `(source role, target roles, transit
//! flags)` rules. Adding an environment means declaring it with a role; the
//! table decides which edges it receives.

use serde::{Deserialize, Serialize};

use hubnet_registry::{EnvironmentRole, SubnetRole};

use crate::error::{TopologyError, TopologyResult};

/// Gateway-transit flags applied to every edge a rule produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitFlags {
    /// Set on the source side, which owns the VPN gateway.
    pub source_allows_gateway_transit: bool,
    /// Set on the target side, which reaches other networks through the
    /// source's gateway.
    pub target_uses_remote_gateway: bool,
}

impl TransitFlags {
    pub fn transit() -> Self {
        Self {
            source_allows_gateway_transit: true,
            target_uses_remote_gateway: true,
        }
    }

    pub fn lateral() -> Self {
        Self::default()
    }

    pub fn is_transit(&self) -> bool {
        self.source_allows_gateway_transit || self.target_uses_remote_gateway
    }
}

/// One peering rule: every environment with the source role peers with
/// every other environment whose role is in `targets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringRule {
    pub name: String,
    pub source: EnvironmentRole,
    pub targets: Vec<EnvironmentRole>,
    pub transit: TransitFlags,
}

impl PeeringRule {
    pub fn new(
        name: impl Into<String>,
        source: EnvironmentRole,
        targets: Vec<EnvironmentRole>,
        transit: TransitFlags,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            targets,
            transit,
        }
    }

    pub fn targets_role(&self, role: EnvironmentRole) -> bool {
        self.targets.contains(&role)
    }
}

/// Complete topology policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyPolicy {
    pub peering_rules: Vec<PeeringRule>,
    /// Role pairs that must never be peered directly.
    pub forbidden_pairs: Vec<(EnvironmentRole, EnvironmentRole)>,
    /// Roles whose environments receive a route table.
    pub routed_roles: Vec<EnvironmentRole>,
    /// Subnet roles never associated with a route table.
    pub excluded_subnet_roles: Vec<SubnetRole>,
}

impl Default for TopologyPolicy {
    fn default() -> Self {
        Self::reference()
    }
}

impl TopologyPolicy {
    /// Hub-rooted transit plus gateway-lateral peering.
    pub fn reference() -> Self {
        Self {
            peering_rules: vec![
                PeeringRule::new(
                    "hub-transit",
                    EnvironmentRole::Hub,
                    vec![EnvironmentRole::Gateway, EnvironmentRole::Spoke],
                    TransitFlags::transit(),
                ),
                PeeringRule::new(
                    "gateway-lateral",
                    EnvironmentRole::Gateway,
                    vec![EnvironmentRole::Spoke],
                    TransitFlags::lateral(),
                ),
            ],
            forbidden_pairs: vec![(EnvironmentRole::Spoke, EnvironmentRole::Spoke)],
            routed_roles: vec![EnvironmentRole::Spoke, EnvironmentRole::Gateway],
            excluded_subnet_roles: vec![SubnetRole::Management],
        }
    }

    /// True if a direct peering between the two roles is forbidden.
    pub fn forbids(&self, a: EnvironmentRole, b: EnvironmentRole) -> bool {
        self.forbidden_pairs
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    pub fn routes(&self, role: EnvironmentRole) -> bool {
        self.routed_roles.contains(&role)
    }

    pub fn associates(&self, role: SubnetRole) -> bool {
        !self.excluded_subnet_roles.contains(&role)
    }

    /// Reject rules that can never produce a valid edge set.
    pub fn validate(&self) -> TopologyResult<()> {
        for rule in &self.peering_rules {
            if rule.targets.is_empty() {
                return Err(TopologyError::InvalidPolicy(format!(
                    "rule '{}' has no target roles",
                    rule.name
                )));
            }
            if let Some(target) = rule.targets.iter().find(|t| self.forbids(rule.source, **t)) {
                return Err(TopologyError::ForbiddenPeering {
                    first: format!("{} (rule '{}')", rule.source, rule.name),
                    second: target.to_string(),
                });
            }
        }
        Ok(())
    }
}
