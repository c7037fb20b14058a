//! Network provisioner.
//!
//! Creates one environment's virtual network, its subnets and the optional
//! NAT and VPN gateways, and reports the identifiers the topology resolver
//! needs. It never reads another environment's state.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use hubnet_registry::{validate_environment_network, Environment, SubnetRole};
use hubnet_topology::{NetworkHandle, SubnetHandle};

use crate::backend::CloudBackend;
use crate::error::{CloudError, CloudResult};
use crate::resource::{ResourceIds, ResourceKind, ResourceRecord};

/// Provisions the network layer of a single environment.
#[async_trait]
pub trait NetworkProvisioner: Send + Sync {
    /// Ensure the environment's resource group; returns its id.
    async fn ensure_resource_group(&self, env: &Environment) -> CloudResult<String>;

    /// Ensure the network and report its identifiers.
    async fn provision(&self, env: &Environment) -> CloudResult<NetworkHandle>;
}

/// Virtual network provisioner backed by a [`CloudBackend`].
#[derive(Clone)]
pub struct VnetProvisioner {
    backend: Arc<dyn CloudBackend>,
    ids: ResourceIds,
}

impl VnetProvisioner {
    pub fn new(backend: Arc<dyn CloudBackend>, ids: ResourceIds) -> Self {
        Self { backend, ids }
    }

    async fn ensure(&self, record: ResourceRecord) -> CloudResult<String> {
        let id = record.id.clone();
        let outcome = self.backend.ensure(record).await?;
        debug!("{:?} {}", outcome, id);
        Ok(id)
    }

    fn required_subnet<'a>(
        env: &Environment,
        subnets: &'a BTreeMap<SubnetRole, SubnetHandle>,
        role: SubnetRole,
    ) -> CloudResult<&'a SubnetHandle> {
        subnets.get(&role).ok_or_else(|| CloudError::MissingSubnet {
            environment: env.name.to_string(),
            role: role.to_string(),
        })
    }

    async fn ensure_nat_gateway(
        &self,
        env: &Environment,
        subnet: &SubnetHandle,
    ) -> CloudResult<String> {
        let rg = &env.resource_group;
        let pip_name = format!("pip-nat-{}", env.name);
        let pip_id = self
            .ensure(ResourceRecord::new(
                self.ids.public_ip(rg, &pip_name),
                ResourceKind::PublicIp,
                &pip_name,
                json!({ "location": env.location, "sku": "Standard", "allocation": "Static" }),
            ))
            .await?;

        let nat_name = format!("nat-{}", env.name);
        let nat_id = self
            .ensure(ResourceRecord::new(
                self.ids.nat_gateway(rg, &nat_name),
                ResourceKind::NatGateway,
                &nat_name,
                json!({ "location": env.location, "public_ip_id": pip_id }),
            ))
            .await?;

        self.ensure(ResourceRecord::new(
            self.ids.nat_gateway_association(&subnet.id),
            ResourceKind::NatGatewayAssociation,
            &subnet.name,
            json!({ "subnet_id": subnet.id, "nat_gateway_id": nat_id }),
        ))
        .await?;

        Ok(nat_id)
    }

    async fn ensure_vpn_gateway(
        &self,
        env: &Environment,
        subnet: &SubnetHandle,
    ) -> CloudResult<String> {
        let rg = &env.resource_group;
        let pip_name = format!("pip-vpngw-{}", env.name);
        let pip_id = self
            .ensure(ResourceRecord::new(
                self.ids.public_ip(rg, &pip_name),
                ResourceKind::PublicIp,
                &pip_name,
                json!({ "location": env.location, "sku": "Standard", "allocation": "Static" }),
            ))
            .await?;

        let gateway_name = format!("vpngw-{}", env.name);
        self.ensure(ResourceRecord::new(
            self.ids.vpn_gateway(rg, &gateway_name),
            ResourceKind::VpnGateway,
            &gateway_name,
            json!({
                "location": env.location,
                "gateway_type": "Vpn",
                "vpn_type": "RouteBased",
                "sku": "VpnGw1",
                "subnet_id": subnet.id,
                "public_ip_id": pip_id,
            }),
        ))
        .await
    }
}

#[async_trait]
impl NetworkProvisioner for VnetProvisioner {
    async fn ensure_resource_group(&self, env: &Environment) -> CloudResult<String> {
        self.ensure(ResourceRecord::new(
            self.ids.resource_group(&env.resource_group),
            ResourceKind::ResourceGroup,
            &env.resource_group,
            json!({ "location": env.location }),
        ))
        .await
    }

    async fn provision(&self, env: &Environment) -> CloudResult<NetworkHandle> {
        // Bad subnet layouts are rejected before the first resource call.
        validate_environment_network(env)?;

        let rg = &env.resource_group;
        let vnet_name = &env.network.name;
        let vnet_id = self
            .ensure(ResourceRecord::new(
                self.ids.virtual_network(rg, vnet_name),
                ResourceKind::VirtualNetwork,
                vnet_name,
                json!({
                    "location": env.location,
                    "address_space": env.network.cidr.to_string(),
                }),
            ))
            .await?;

        let mut subnets = BTreeMap::new();
        for spec in &env.subnets {
            let id = self
                .ensure(ResourceRecord::new(
                    self.ids.subnet(rg, vnet_name, &spec.name),
                    ResourceKind::Subnet,
                    &spec.name,
                    json!({
                        "vnet_id": vnet_id,
                        "address_prefix": spec.cidr.to_string(),
                        "role": spec.role.as_str(),
                    }),
                ))
                .await?;
            subnets.insert(
                spec.role,
                SubnetHandle {
                    id,
                    name: spec.name.clone(),
                    cidr: spec.cidr,
                },
            );
        }

        let nat_gateway_id = if env.capabilities.nat_gateway {
            let shared = Self::required_subnet(env, &subnets, SubnetRole::Shared)?;
            Some(self.ensure_nat_gateway(env, shared).await?)
        } else {
            None
        };

        let vpn_gateway_id = if env.capabilities.vpn_gateway {
            let gateway = Self::required_subnet(env, &subnets, SubnetRole::Gateway)?;
            Some(self.ensure_vpn_gateway(env, gateway).await?)
        } else {
            None
        };

        info!(
            "Network for {} ready: {} subnets{}{}",
            env.name,
            subnets.len(),
            if nat_gateway_id.is_some() { ", NAT" } else { "" },
            if vpn_gateway_id.is_some() { ", VPN gateway" } else { "" }
        );

        Ok(NetworkHandle {
            environment_name: env.name.clone(),
            vnet_id,
            vnet_name: vnet_name.clone(),
            address_space: env.network.cidr,
            subnets,
            location: env.location.clone(),
            resource_group_name: rg.clone(),
            nat_gateway_id,
            vpn_gateway_id,
        })
    }
}
