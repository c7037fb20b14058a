//! Topology command - Resolve peerings and routes against a dry-run backend.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::info;

use hubnet_cloud::{InMemoryCloud, NetworkProvisioner, ResourceIds, VnetProvisioner};
use hubnet_registry::{DeploymentConfig, RegistryValidator};
use hubnet_topology::{NetworkHandles, ResolvedTopology, TopologyPolicy, TopologyResolver};

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct TopologyArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

pub async fn execute(args: TopologyArgs) -> Result<()> {
    let config = args.config.load()?;
    let topology = dry_run(&config).await?;
    println!("{}", serde_json::to_string_pretty(&topology)?);
    Ok(())
}

/// Provision every network on a throwaway backend and resolve the topology
/// from the resulting handles.
pub async fn dry_run(config: &DeploymentConfig) -> Result<ResolvedTopology> {
    let registry = config.registry()?;
    RegistryValidator::check(&registry, &config.timezone_map())?;

    let cloud = InMemoryCloud::new();
    let provisioner = VnetProvisioner::new(
        Arc::new(cloud.clone()),
        ResourceIds::new(&config.subscription_id),
    );

    let mut handles = NetworkHandles::new();
    for env in registry.list_environments() {
        provisioner.ensure_resource_group(env).await?;
        handles.insert(env.name.clone(), provisioner.provision(env).await?);
    }
    info!("Dry run provisioned {} resources", cloud.resource_count());

    Ok(TopologyResolver::new(TopologyPolicy::reference()).resolve(&registry, &handles)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_reference() {
        let topology = dry_run(&DeploymentConfig::reference()).await.unwrap();
        assert_eq!(topology.peerings.len(), 7);
        assert_eq!(topology.route_tables.len(), 4);
        assert_eq!(topology.associations.len(), 8);
    }
}
