//! # hubnet_topology
//!
//! Topology resolution for a hub-and-spoke deployment.
//!
//! Given the environment registry and the network outputs of every
//! environment, the resolver derives the peering edge set (with gateway
//! transit flags), one route table per routed environment and the subnet
//! associations for those tables. Which environments peer, and how, is a
//! declarative [`TopologyPolicy`] keyed by environment role.
//!
//! The resolver is a pure, synchronous function: it never talks to a
//! provider, so the same inputs always produce the same output.

pub mod error;
pub mod handle;
pub mod peering;
pub mod policy;
pub mod resolver;
pub mod routes;

pub use error::{TopologyError, TopologyResult};
pub use handle::{NetworkHandle, NetworkHandles, SubnetHandle};
pub use peering::{EdgeKey, PeeringEdge, PeeringEndpoint, PeeringLink, PeeringSet};
pub use policy::{PeeringRule, TopologyPolicy, TransitFlags};
pub use resolver::{PartialTopology, ResolvedTopology, TopologyResolver};
pub use routes::{
    build_route_table, route_table_name, strategies_for, HubTransit, NatEgress, NextHop, Route,
    RouteContext, RouteStrategy, RouteTable, RouteTableAssociation, TransitScope,
};
