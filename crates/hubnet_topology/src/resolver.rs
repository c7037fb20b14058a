//! Topology resolver.
//!
//! A pure function from the environment registry, the topology policy and
//! every environment's network outputs to the peering edge set, the route
//! table set and the subnet association set. It performs no provider calls,
//! and identical inputs always give identical outputs.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use hubnet_registry::{Environment, EnvironmentName, EnvironmentRegistry, EnvironmentRole};

use crate::error::{TopologyError, TopologyResult};
use crate::handle::{NetworkHandle, NetworkHandles};
use crate::peering::{EdgeKey, PeeringEdge, PeeringSet};
use crate::policy::TopologyPolicy;
use crate::routes::{build_route_table, RouteContext, RouteTable, RouteTableAssociation};

/// Output of topology resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTopology {
    pub peerings: Vec<PeeringEdge>,
    pub route_tables: Vec<RouteTable>,
    pub associations: Vec<RouteTableAssociation>,
}

impl ResolvedTopology {
    pub fn route_table(&self, environment: &EnvironmentName) -> Option<&RouteTable> {
        self.route_tables.iter().find(|t| &t.environment == environment)
    }

    pub fn associations_for<'a>(
        &'a self,
        environment: &'a EnvironmentName,
    ) -> impl Iterator<Item = &'a RouteTableAssociation> + 'a {
        self.associations
            .iter()
            .filter(move |a| &a.environment == environment)
    }

    pub fn peerings_for<'a>(
        &'a self,
        environment: &'a EnvironmentName,
    ) -> impl Iterator<Item = &'a PeeringEdge> + 'a {
        self.peerings.iter().filter(move |e| e.connects(environment))
    }
}

/// Everything that could be resolved, plus what could not.
#[derive(Debug, Clone, Default)]
pub struct PartialTopology {
    pub topology: ResolvedTopology,
    pub failures: Vec<TopologyError>,
}

impl PartialTopology {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, error: TopologyError) {
        if !self.failures.contains(&error) {
            warn!("{}", error);
            self.failures.push(error);
        }
    }
}

/// Resolves peerings, route tables and associations from a policy.
#[derive(Debug, Clone, Default)]
pub struct TopologyResolver {
    policy: TopologyPolicy,
}

impl TopologyResolver {
    pub fn new(policy: TopologyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TopologyPolicy {
        &self.policy
    }

    /// Resolve the full topology, failing with the first problem found.
    /// Peering rules are checked first, in policy order, then route tables
    /// in declaration order.
    pub fn resolve(
        &self,
        registry: &EnvironmentRegistry,
        handles: &NetworkHandles,
    ) -> TopologyResult<ResolvedTopology> {
        let partial = self.resolve_partial(registry, handles)?;
        match partial.failures.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(partial.topology),
        }
    }

    /// Resolve everything that does not depend on a missing output.
    ///
    /// Configuration problems (invalid policy, no single hub) are still
    /// returned as errors; missing outputs are collected as failures.
    pub fn resolve_partial(
        &self,
        registry: &EnvironmentRegistry,
        handles: &NetworkHandles,
    ) -> TopologyResult<PartialTopology> {
        self.policy.validate()?;
        let hub = registry.hub()?;

        let mut partial = PartialTopology::default();
        let peerings = self.derive_peerings(registry, handles, &mut partial);
        self.derive_routes(registry, hub, handles, &peerings, &mut partial);
        partial.topology.peerings = peerings.into_edges();

        info!(
            "Resolved topology: {} peerings, {} route tables, {} associations ({} unresolved)",
            partial.topology.peerings.len(),
            partial.topology.route_tables.len(),
            partial.topology.associations.len(),
            partial.failures.len()
        );
        Ok(partial)
    }

    fn derive_peerings(
        &self,
        registry: &EnvironmentRegistry,
        handles: &NetworkHandles,
        partial: &mut PartialTopology,
    ) -> PeeringSet {
        let mut set = PeeringSet::new();

        for rule in &self.policy.peering_rules {
            for source in registry.by_role(rule.source) {
                let targets = registry
                    .list_environments()
                    .iter()
                    .filter(|t| rule.targets_role(t.role) && t.name != source.name);

                for target in targets {
                    let (Some(source_handle), Some(target_handle)) = (
                        require(handles, source, partial),
                        require(handles, target, partial),
                    ) else {
                        continue;
                    };

                    let needs_gateway = rule.transit.source_allows_gateway_transit;
                    if needs_gateway && source_handle.vpn_gateway_id.is_none() {
                        partial.fail(TopologyError::MissingVpnGateway {
                            environment: source.name.to_string(),
                        });
                        continue;
                    }

                    let edge =
                        PeeringEdge::new(source_handle, target_handle, rule.transit, &rule.name);
                    if set.insert(edge) {
                        debug!("Peering {} <-> {} ({})", source.name, target.name, rule.name);
                    }
                }
            }
        }

        set
    }

    fn derive_routes(
        &self,
        registry: &EnvironmentRegistry,
        hub: &Environment,
        handles: &NetworkHandles,
        peerings: &PeeringSet,
        partial: &mut PartialTopology,
    ) {
        let Some(hub_handle) = require(handles, hub, partial) else {
            return;
        };
        let Some(hub_gateway_id) = hub_handle.vpn_gateway_id.clone() else {
            partial.fail(TopologyError::MissingVpnGateway {
                environment: hub.name.to_string(),
            });
            return;
        };

        for env in registry.list_environments() {
            if !self.policy.routes(env.role) {
                continue;
            }
            let Some(handle) = require(handles, env, partial) else {
                continue;
            };

            // Spokes already peered with this environment stay off the hub.
            let ctx = RouteContext {
                environment: env,
                hub_gateway_id: &hub_gateway_id,
                transit_prefixes: registry
                    .by_role(EnvironmentRole::Spoke)
                    .filter(|other| other.name != env.name)
                    .filter(|other| !peerings.contains(&EdgeKey::new(&env.name, &other.name)))
                    .map(|other| (other.name.clone(), other.network.cidr))
                    .collect(),
            };
            let table = build_route_table(&ctx);

            let mut associations = Vec::new();
            let mut complete = true;
            for subnet in env.subnets.iter().filter(|s| self.policy.associates(s.role)) {
                match handle.subnet(subnet.role) {
                    Some(provisioned) => associations.push(RouteTableAssociation {
                        environment: env.name.clone(),
                        subnet_role: subnet.role,
                        subnet_name: provisioned.name.clone(),
                        subnet_id: provisioned.id.clone(),
                        route_table_name: table.name.clone(),
                    }),
                    None => {
                        complete = false;
                        partial.fail(TopologyError::SubnetNotProvisioned {
                            environment: env.name.to_string(),
                            role: subnet.role.to_string(),
                        });
                    }
                }
            }

            if complete {
                debug!(
                    "Route table {} with {} routes for {} subnets",
                    table.name,
                    table.routes.len(),
                    associations.len()
                );
                partial.topology.route_tables.push(table);
                partial.topology.associations.extend(associations);
            }
        }
    }
}

fn require<'a>(
    handles: &'a NetworkHandles,
    env: &Environment,
    partial: &mut PartialTopology,
) -> Option<&'a NetworkHandle> {
    let handle = handles.get(&env.name);
    if handle.is_none() {
        partial.fail(TopologyError::MissingNetwork {
            environment: env.name.to_string(),
        });
    }
    handle
}
