//! Integration tests: provision the reference networks, resolve and apply.

use std::sync::Arc;

use hubnet_cloud::{
    CloudBackend, InMemoryCloud, NetworkProvisioner, ResourceIds, ResourceKind, TopologyApplier,
    VnetProvisioner,
};
use hubnet_registry::DeploymentConfig;
use hubnet_topology::{NetworkHandles, TopologyResolver};
use tempfile::tempdir;

async fn provision_all(cloud: &InMemoryCloud, config: &DeploymentConfig) -> NetworkHandles {
    let provisioner = VnetProvisioner::new(
        Arc::new(cloud.clone()),
        ResourceIds::new(&config.subscription_id),
    );
    let mut handles = NetworkHandles::new();
    for env in &config.environments {
        provisioner.ensure_resource_group(env).await.unwrap();
        handles.insert(env.name.clone(), provisioner.provision(env).await.unwrap());
    }
    handles
}

#[tokio::test]
async fn test_reference_topology_applies() {
    let config = DeploymentConfig::reference();
    let cloud = InMemoryCloud::new();
    let handles = provision_all(&cloud, &config).await;

    let registry = config.registry().unwrap();
    let topology = TopologyResolver::default().resolve(&registry, &handles).unwrap();
    let applier = TopologyApplier::new(
        Arc::new(cloud.clone()),
        ResourceIds::new(&config.subscription_id),
    );

    let summary = applier.apply(&topology).await.unwrap();
    assert_eq!(summary.created, 14 + 4 + 8);
    assert_eq!(cloud.count_of(ResourceKind::VnetPeering), 14);
    assert_eq!(cloud.count_of(ResourceKind::RouteTable), 4);
    assert_eq!(cloud.count_of(ResourceKind::RouteTableAssociation), 8);

    let hub_side = cloud
        .list(ResourceKind::VnetPeering)
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.name == "hub-to-clinical")
        .unwrap();
    assert_eq!(hub_side.properties["allow_gateway_transit"], true);
    assert_eq!(hub_side.properties["use_remote_gateways"], false);
}

#[tokio::test]
async fn test_second_apply_changes_nothing() {
    let config = DeploymentConfig::reference();
    let cloud = InMemoryCloud::new();
    let registry = config.registry().unwrap();
    let applier = TopologyApplier::new(
        Arc::new(cloud.clone()),
        ResourceIds::new(&config.subscription_id),
    );

    let handles = provision_all(&cloud, &config).await;
    let topology = TopologyResolver::default().resolve(&registry, &handles).unwrap();
    applier.apply(&topology).await.unwrap();
    let before = cloud.snapshot();

    let handles = provision_all(&cloud, &config).await;
    let topology = TopologyResolver::default().resolve(&registry, &handles).unwrap();
    let summary = applier.apply(&topology).await.unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.unchanged, 26);
    assert_eq!(cloud.snapshot(), before);
}

#[tokio::test]
async fn test_converges_against_persisted_state() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("state.json");
    let config = DeploymentConfig::reference();

    let cloud = InMemoryCloud::load_state(&state).unwrap();
    provision_all(&cloud, &config).await;
    cloud.save_state(&state).unwrap();
    let count = cloud.resource_count();

    let reloaded = InMemoryCloud::load_state(&state).unwrap();
    provision_all(&reloaded, &config).await;
    assert_eq!(reloaded.resource_count(), count);
    assert_eq!(reloaded.created_count(), 0);
}

#[tokio::test]
async fn test_tampered_peering_is_reported() {
    let config = DeploymentConfig::reference();
    let cloud = InMemoryCloud::new();
    let handles = provision_all(&cloud, &config).await;
    let topology = TopologyResolver::default()
        .resolve(&config.registry().unwrap(), &handles)
        .unwrap();
    let applier = TopologyApplier::new(
        Arc::new(cloud.clone()),
        ResourceIds::new(&config.subscription_id),
    );
    applier.apply(&topology).await.unwrap();

    let mut record = cloud
        .list(ResourceKind::VnetPeering)
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.name == "velocity-to-hub")
        .unwrap();
    record.properties["use_remote_gateways"] = serde_json::json!(false);
    cloud.overwrite(record);

    let err = applier.apply(&topology).await.unwrap_err();
    assert!(err.is_drift());
    assert!(err.to_string().contains("velocity-to-hub"));
}
