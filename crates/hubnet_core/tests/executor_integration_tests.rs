//! End-to-end executor tests over the reference deployment.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use tempfile::TempDir;

use hubnet_cloud::{
    CloudError, CloudResult, InMemoryCloud, NetworkProvisioner, ResourceIds, ResourceKind,
    TimezoneConfigurator, TopologyApplier, VmProvisioner,
};
use hubnet_core::{
    ExecutionState, HandlerRegistry, PlanBuilder, PlanExecutor, ProvisioningContext,
    ProvisioningPlan, StepStatus,
};
use hubnet_registry::{
    DeploymentConfig, Environment, EnvironmentRole, SubnetRole, SubnetSpec, TimezoneMap,
};
use hubnet_topology::{NetworkHandle, PeeringRule, SubnetHandle, TopologyPolicy, TransitFlags};

mock! {
    pub Network {}

    #[async_trait]
    impl NetworkProvisioner for Network {
        async fn ensure_resource_group(&self, env: &Environment) -> CloudResult<String>;
        async fn provision(&self, env: &Environment) -> CloudResult<NetworkHandle>;
    }
}

fn plan_for(config: &DeploymentConfig) -> ProvisioningPlan {
    let registry = config.registry().unwrap();
    PlanBuilder::new(&registry, &TopologyPolicy::reference())
        .with_id(&config.name)
        .build()
        .unwrap()
}

fn standard(cloud: &InMemoryCloud, config: &DeploymentConfig) -> PlanExecutor {
    let handlers = HandlerRegistry::standard(
        Arc::new(cloud.clone()),
        ResourceIds::new(&config.subscription_id),
        config.timezone_map(),
        TopologyPolicy::reference(),
    );
    PlanExecutor::new(Arc::new(handlers))
}

fn fake_handle(env: &Environment) -> NetworkHandle {
    let vnet_id = format!("/vnets/{}", env.network.name);
    NetworkHandle {
        environment_name: env.name.clone(),
        vnet_id: vnet_id.clone(),
        vnet_name: env.network.name.clone(),
        address_space: env.network.cidr,
        subnets: env
            .subnets
            .iter()
            .map(|s| {
                (
                    s.role,
                    SubnetHandle {
                        id: format!("{}/subnets/{}", vnet_id, s.name),
                        name: s.name.clone(),
                        cidr: s.cidr,
                    },
                )
            })
            .collect(),
        location: env.location.clone(),
        resource_group_name: env.resource_group.clone(),
        nat_gateway_id: None,
        vpn_gateway_id: env.capabilities.vpn_gateway.then(|| format!("/vpn/{}", env.name)),
    }
}

#[tokio::test]
async fn test_reference_plan_converges() {
    let dir = TempDir::new().unwrap();
    let config = DeploymentConfig::reference();
    let cloud = InMemoryCloud::new();

    let context = ProvisioningContext::from_config(dir.path().to_path_buf(), &config).unwrap();
    let log = standard(&cloud, &config)
        .execute(&plan_for(&config), context)
        .await
        .unwrap();

    assert_eq!(log.state, ExecutionState::Completed, "{:?}", log.error);
    assert_eq!(cloud.count_of(ResourceKind::ResourceGroup), 5);
    assert_eq!(cloud.count_of(ResourceKind::VnetPeering), 14);
    assert_eq!(cloud.count_of(ResourceKind::RouteTable), 4);
    assert_eq!(cloud.count_of(ResourceKind::RouteTableAssociation), 8);
    assert_eq!(cloud.count_of(ResourceKind::VirtualMachine), 5);
    assert_eq!(cloud.count_of(ResourceKind::VmExtension), 5);

    let topology = log.outputs.topology.as_ref().unwrap();
    assert_eq!(topology.peerings.len(), 7);
    assert!(log.log_path().exists());
}

#[tokio::test]
async fn test_second_run_creates_nothing() {
    let dir = TempDir::new().unwrap();
    let config = DeploymentConfig::reference();
    let cloud = InMemoryCloud::new();
    let executor = standard(&cloud, &config);
    let plan = plan_for(&config);

    let context = || ProvisioningContext::from_config(dir.path().to_path_buf(), &config).unwrap();

    let first = executor.execute(&plan, context()).await.unwrap();
    let snapshot = cloud.snapshot();
    let created = cloud.created_count();

    let second = executor.execute(&plan, context()).await.unwrap();

    assert_eq!(second.state, ExecutionState::Completed);
    assert_eq!(second.outputs.applied.created, 0);
    assert_eq!(second.outputs.applied.unchanged, first.outputs.applied.total());
    assert_eq!(second.outputs.topology, first.outputs.topology);
    assert_eq!(cloud.created_count(), created);
    assert_eq!(cloud.snapshot(), snapshot);
}

#[tokio::test]
async fn test_failed_network_blocks_only_dependent_branches() {
    let dir = TempDir::new().unwrap();
    let config = DeploymentConfig::reference();
    let cloud = InMemoryCloud::new();
    let ids = ResourceIds::new(&config.subscription_id);

    let mut network = MockNetwork::new();
    network
        .expect_ensure_resource_group()
        .times(5)
        .returning(|env| Ok(format!("/rg/{}", env.resource_group)));
    network.expect_provision().times(5).returning(|env| {
        if env.name.as_str() == "velocity" {
            Err(CloudError::Provider {
                resource: env.network.name.clone(),
                message: "quota exceeded".to_string(),
            })
        } else {
            Ok(fake_handle(env))
        }
    });

    let handlers = HandlerRegistry::with_collaborators(
        Arc::new(network),
        Arc::new(VmProvisioner::new(Arc::new(cloud.clone()), ids.clone())),
        Arc::new(TimezoneConfigurator::new(
            Arc::new(cloud.clone()),
            ids.clone(),
            TimezoneMap::default(),
        )),
        TopologyApplier::new(Arc::new(cloud.clone()), ids),
        TopologyPolicy::reference(),
    );
    let context = ProvisioningContext::from_config(dir.path().to_path_buf(), &config).unwrap();
    let log = PlanExecutor::new(Arc::new(handlers))
        .execute(&plan_for(&config), context)
        .await
        .unwrap();

    assert_eq!(log.state, ExecutionState::Failed);
    assert_eq!(log.failed_steps(), vec!["network:velocity"]);
    assert!(log.error.as_deref().unwrap().contains("network:velocity"));

    // Unaffected compute branches proceed.
    for step in ["compute:hub", "compute:clinical", "compute:non_clinical", "extensions:clinical"] {
        assert_eq!(log.status(step), Some(&StepStatus::Succeeded), "{}", step);
    }
    let blocked = [
        "compute:velocity",
        "extensions:velocity",
        "topology",
        "peerings",
        "routing:gateway",
    ];
    for step in blocked {
        assert!(matches!(log.status(step), Some(StepStatus::Skipped { .. })), "{}", step);
    }
    assert_eq!(cloud.count_of(ResourceKind::VnetPeering), 0);
    assert_eq!(cloud.count_of(ResourceKind::VirtualMachine), 4);
}

#[tokio::test]
async fn test_configuration_error_aborts_before_provider_calls() {
    let dir = TempDir::new().unwrap();
    let mut config = DeploymentConfig::reference();
    if let Some(velocity) = config.environments.iter_mut().find(|e| e.name.as_str() == "velocity") {
        velocity.network.cidr = "10.20.0.0/16".parse().unwrap();
        velocity.subnets = vec![SubnetSpec::new(
            "snet-velocity-dev",
            "10.20.9.0/24".parse().unwrap(),
            SubnetRole::Dev,
        )];
        velocity.machines.clear();
    }
    let cloud = InMemoryCloud::new();

    let context = ProvisioningContext::from_config(dir.path().to_path_buf(), &config).unwrap();
    let err = standard(&cloud, &config)
        .execute(&plan_for(&config), context)
        .await
        .unwrap_err();

    assert!(err.is_configuration_error());
    assert!(err.to_string().contains("velocity"));
    assert_eq!(cloud.ensure_calls(), 0);
}

#[tokio::test]
async fn test_unknown_location_aborts_before_provider_calls() {
    let dir = TempDir::new().unwrap();
    let mut config = DeploymentConfig::reference();
    for env in config.environments.iter_mut() {
        if env.name.as_str() == "clinical" {
            env.location = "marsnorth".to_string();
        }
    }
    let cloud = InMemoryCloud::new();

    let context = ProvisioningContext::from_config(dir.path().to_path_buf(), &config).unwrap();
    let err = standard(&cloud, &config)
        .execute(&plan_for(&config), context)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("marsnorth"));
    assert_eq!(cloud.ensure_calls(), 0);
}

#[tokio::test]
async fn test_forbidden_policy_aborts_before_provider_calls() {
    let dir = TempDir::new().unwrap();
    let config = DeploymentConfig::reference();
    let cloud = InMemoryCloud::new();

    let mut policy = TopologyPolicy::reference();
    policy.peering_rules.push(PeeringRule::new(
        "spoke-mesh",
        EnvironmentRole::Spoke,
        vec![EnvironmentRole::Spoke],
        TransitFlags::lateral(),
    ));
    let handlers = HandlerRegistry::standard(
        Arc::new(cloud.clone()),
        ResourceIds::new(&config.subscription_id),
        config.timezone_map(),
        policy,
    );

    let context = ProvisioningContext::from_config(dir.path().to_path_buf(), &config).unwrap();
    let err = PlanExecutor::new(Arc::new(handlers))
        .execute(&plan_for(&config), context)
        .await
        .unwrap_err();

    assert!(err.is_configuration_error());
    assert!(err.to_string().contains("spoke-mesh"));
    assert_eq!(cloud.ensure_calls(), 0);
}
