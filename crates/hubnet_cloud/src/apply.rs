//! Applies a resolved topology: peerings, route tables and associations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use hubnet_topology::{NextHop, PeeringEdge, ResolvedTopology, RouteTable, RouteTableAssociation};

use crate::backend::CloudBackend;
use crate::error::{CloudError, CloudResult};
use crate::resource::{ApplyOutcome, ResourceIds, ResourceKind, ResourceRecord};

/// Counts of resources touched by an apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub created: usize,
    pub unchanged: usize,
}

impl ApplySummary {
    pub fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Created => self.created += 1,
            ApplyOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn merge(&mut self, other: ApplySummary) {
        self.created += other.created;
        self.unchanged += other.unchanged;
    }

    pub fn total(&self) -> usize {
        self.created + self.unchanged
    }
}

/// Creates the provider objects for a [`ResolvedTopology`].
///
/// Every object carries enough identity in the resolved output that no
/// further lookups are needed.
#[derive(Clone)]
pub struct TopologyApplier {
    backend: Arc<dyn CloudBackend>,
    ids: ResourceIds,
}

impl TopologyApplier {
    pub fn new(backend: Arc<dyn CloudBackend>, ids: ResourceIds) -> Self {
        Self { backend, ids }
    }

    /// Apply all three sets; route tables before their associations.
    pub async fn apply(&self, topology: &ResolvedTopology) -> CloudResult<ApplySummary> {
        let mut summary = self.apply_peerings(&topology.peerings).await?;
        summary.merge(self.apply_route_tables(&topology.route_tables).await?);
        summary.merge(
            self.apply_associations(&topology.route_tables, &topology.associations)
                .await?,
        );
        Ok(summary)
    }

    /// Both directional links of every edge.
    pub async fn apply_peerings(&self, edges: &[PeeringEdge]) -> CloudResult<ApplySummary> {
        let mut summary = ApplySummary::default();
        for link in edges.iter().flat_map(|e| e.links()) {
            let record = ResourceRecord::new(
                self.ids.peering(&link.resource_group, &link.local_vnet_name, &link.name),
                ResourceKind::VnetPeering,
                &link.name,
                json!({
                    "remote_vnet_id": link.remote_vnet_id,
                    "allow_virtual_network_access": link.allow_virtual_network_access,
                    "allow_forwarded_traffic": link.allow_forwarded_traffic,
                    "allow_gateway_transit": link.allow_gateway_transit,
                    "use_remote_gateways": link.use_remote_gateways,
                }),
            );
            summary.record(self.backend.ensure(record).await?);
        }
        info!(
            "Peerings: {} created, {} unchanged",
            summary.created, summary.unchanged
        );
        Ok(summary)
    }

    pub async fn apply_route_tables(&self, tables: &[RouteTable]) -> CloudResult<ApplySummary> {
        let mut summary = ApplySummary::default();
        for table in tables {
            let routes: Vec<Value> = table
                .routes
                .iter()
                .map(|route| {
                    let mut value = json!({
                        "name": route.name,
                        "address_prefix": route.address_prefix.to_string(),
                        "next_hop_type": route.next_hop.as_str(),
                    });
                    if let NextHop::VirtualNetworkGateway { gateway_id } = &route.next_hop {
                        value["next_hop_id"] = json!(gateway_id);
                    }
                    value
                })
                .collect();

            let record = ResourceRecord::new(
                self.ids.route_table(&table.resource_group, &table.name),
                ResourceKind::RouteTable,
                &table.name,
                json!({ "location": table.location, "routes": routes }),
            );
            summary.record(self.backend.ensure(record).await?);
        }
        info!(
            "Route tables: {} created, {} unchanged",
            summary.created, summary.unchanged
        );
        Ok(summary)
    }

    /// One record per subnet, so a second table for the same subnet is
    /// reported as drift.
    pub async fn apply_associations(
        &self,
        tables: &[RouteTable],
        associations: &[RouteTableAssociation],
    ) -> CloudResult<ApplySummary> {
        let mut summary = ApplySummary::default();
        for association in associations {
            let table = tables
                .iter()
                .find(|t| {
                    t.environment == association.environment
                        && t.name == association.route_table_name
                })
                .ok_or_else(|| CloudError::NotFound(association.route_table_name.clone()))?;

            let record = ResourceRecord::new(
                self.ids.route_table_association(&association.subnet_id),
                ResourceKind::RouteTableAssociation,
                &association.subnet_name,
                json!({
                    "subnet_id": association.subnet_id,
                    "route_table_id": self.ids.route_table(&table.resource_group, &table.name),
                }),
            );
            summary.record(self.backend.ensure(record).await?);
        }
        info!(
            "Associations: {} created, {} unchanged",
            summary.created, summary.unchanged
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryCloud;
    use hubnet_registry::{EnvironmentName, Ipv4Cidr, SubnetRole};
    use hubnet_topology::Route;

    fn table(name: &str) -> RouteTable {
        RouteTable {
            name: name.to_string(),
            environment: EnvironmentName::from("velocity"),
            resource_group: "rg-velocity".to_string(),
            location: "eastus".to_string(),
            routes: vec![Route::new(
                "default-via-hub",
                Ipv4Cidr::any(),
                NextHop::VirtualNetworkGateway {
                    gateway_id: "/vpn/hub".to_string(),
                },
            )],
        }
    }

    fn association(table: &str) -> RouteTableAssociation {
        RouteTableAssociation {
            environment: EnvironmentName::from("velocity"),
            subnet_role: SubnetRole::Dev,
            subnet_name: "snet-velocity-dev".to_string(),
            subnet_id: "/vnets/vnet-velocity/subnets/snet-velocity-dev".to_string(),
            route_table_name: table.to_string(),
        }
    }

    #[tokio::test]
    async fn test_route_table_record() {
        let cloud = InMemoryCloud::new();
        let applier = TopologyApplier::new(Arc::new(cloud.clone()), ResourceIds::new("sub"));

        let summary = applier.apply_route_tables(&[table("rt-velocity")]).await.unwrap();
        assert_eq!(summary, ApplySummary { created: 1, unchanged: 0 });

        let record = cloud.list(ResourceKind::RouteTable).await.unwrap().remove(0);
        assert_eq!(record.properties["routes"][0]["next_hop_type"], "VirtualNetworkGateway");
        assert_eq!(record.properties["routes"][0]["next_hop_id"], "/vpn/hub");
    }

    #[tokio::test]
    async fn test_second_table_on_same_subnet_is_drift() {
        let cloud = InMemoryCloud::new();
        let applier = TopologyApplier::new(Arc::new(cloud.clone()), ResourceIds::new("sub"));
        let tables = [table("rt-velocity"), table("rt-velocity-alt")];

        applier
            .apply_associations(&tables, &[association("rt-velocity")])
            .await
            .unwrap();
        let again = applier
            .apply_associations(&tables, &[association("rt-velocity")])
            .await
            .unwrap();
        assert_eq!(again.unchanged, 1);

        let err = applier
            .apply_associations(&tables, &[association("rt-velocity-alt")])
            .await
            .unwrap_err();
        assert!(err.is_drift());
        assert_eq!(cloud.count_of(ResourceKind::RouteTableAssociation), 1);
    }

    #[tokio::test]
    async fn test_association_without_table() {
        let cloud = InMemoryCloud::new();
        let applier = TopologyApplier::new(Arc::new(cloud), ResourceIds::new("sub"));

        let err = applier
            .apply_associations(&[], &[association("rt-velocity")])
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::NotFound(_)));
    }
}
