//! Route tables, associations and route generation strategies.

use serde::{Deserialize, Serialize};

use hubnet_registry::{Environment, EnvironmentName, Ipv4Cidr, SubnetRole};

/// Where traffic matching a route is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NextHop {
    /// The hub's VPN gateway.
    VirtualNetworkGateway { gateway_id: String },
    /// Local egress through the subnet's NAT gateway.
    Internet,
    VnetLocal,
}

impl NextHop {
    /// Provider next-hop type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NextHop::VirtualNetworkGateway { .. } => "VirtualNetworkGateway",
            NextHop::Internet => "Internet",
            NextHop::VnetLocal => "VnetLocal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub address_prefix: Ipv4Cidr,
    pub next_hop: NextHop,
}

impl Route {
    pub fn new(name: impl Into<String>, address_prefix: Ipv4Cidr, next_hop: NextHop) -> Self {
        Self {
            name: name.into(),
            address_prefix,
            next_hop,
        }
    }
}

/// Route table owned by one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    pub name: String,
    pub environment: EnvironmentName,
    pub resource_group: String,
    pub location: String,
    pub routes: Vec<Route>,
}

/// Binds one subnet to one route table in the same environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableAssociation {
    pub environment: EnvironmentName,
    pub subnet_role: SubnetRole,
    pub subnet_name: String,
    pub subnet_id: String,
    pub route_table_name: String,
}

/// Inputs shared by route strategies for one environment.
#[derive(Debug, Clone)]
pub struct RouteContext<'a> {
    pub environment: &'a Environment,
    /// The hub VPN gateway every transit route points at.
    pub hub_gateway_id: &'a str,
    /// Prefixes of the other environments reached through the hub.
    pub transit_prefixes: Vec<(EnvironmentName, Ipv4Cidr)>,
}

/// A composable source of routes.
pub trait RouteStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn routes(&self, ctx: &RouteContext<'_>) -> Vec<Route>;
}

/// Keeps internet-bound traffic on the local NAT gateway.
#[derive(Debug, Clone, Copy, Default)]
pub struct NatEgress;

impl RouteStrategy for NatEgress {
    fn name(&self) -> &'static str {
        "nat-egress"
    }

    fn routes(&self, _ctx: &RouteContext<'_>) -> Vec<Route> {
        vec![Route::new("local-egress", Ipv4Cidr::any(), NextHop::Internet)]
    }
}

/// What `HubTransit` sends to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitScope {
    /// Everything: 0.0.0.0/0.
    DefaultRoute,
    /// Only the prefixes of the other environments.
    PeerPrefixes,
}

/// Sends traffic to the hub VPN gateway.
#[derive(Debug, Clone, Copy)]
pub struct HubTransit {
    pub scope: TransitScope,
}

impl HubTransit {
    pub fn default_route() -> Self {
        Self {
            scope: TransitScope::DefaultRoute,
        }
    }

    pub fn peer_prefixes() -> Self {
        Self {
            scope: TransitScope::PeerPrefixes,
        }
    }
}

impl RouteStrategy for HubTransit {
    fn name(&self) -> &'static str {
        match self.scope {
            TransitScope::DefaultRoute => "hub-default",
            TransitScope::PeerPrefixes => "hub-peer-prefixes",
        }
    }

    fn routes(&self, ctx: &RouteContext<'_>) -> Vec<Route> {
        let hop = NextHop::VirtualNetworkGateway {
            gateway_id: ctx.hub_gateway_id.to_string(),
        };
        match self.scope {
            TransitScope::DefaultRoute => vec![Route::new("default-via-hub", Ipv4Cidr::any(), hop)],
            TransitScope::PeerPrefixes => ctx
                .transit_prefixes
                .iter()
                .map(|(name, prefix)| Route::new(format!("to-{}", name), *prefix, hop.clone()))
                .collect(),
        }
    }
}

/// Strategies for an environment, selected by its NAT capability.
pub fn strategies_for(environment: &Environment) -> Vec<Box<dyn RouteStrategy>> {
    if environment.requires_nat() {
        vec![Box::new(NatEgress), Box::new(HubTransit::peer_prefixes())]
    } else {
        vec![Box::new(HubTransit::default_route())]
    }
}

/// Build the route table for one environment from its strategies.
pub fn build_route_table(ctx: &RouteContext<'_>) -> RouteTable {
    let env = ctx.environment;
    let routes = strategies_for(env)
        .iter()
        .flat_map(|strategy| strategy.routes(ctx))
        .collect();

    RouteTable {
        name: route_table_name(&env.name),
        environment: env.name.clone(),
        resource_group: env.resource_group.clone(),
        location: env.location.clone(),
        routes,
    }
}

pub fn route_table_name(environment: &EnvironmentName) -> String {
    format!("rt-{}", environment)
}
