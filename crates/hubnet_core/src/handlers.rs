//! Step handlers and their registry.
//!
//! Each [`StepKind`] is executed by one handler. Handlers read the context
//! as it stood when their layer started and return a [`StepOutput`]; the
//! executor merges outputs once the whole layer has joined.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use hubnet_cloud::{
    CloudBackend, ComputeProvisioner, ExtensionConfigurator, NetworkProvisioner, ResourceIds,
    TimezoneConfigurator, TopologyApplier, VmProvisioner, VnetProvisioner,
};
use hubnet_registry::{Environment, EnvironmentName, TimezoneMap};
use hubnet_topology::{ResolvedTopology, TopologyPolicy, TopologyResolver};

use crate::context::{ProvisioningContext, StepOutput};
use crate::error::{CoreError, CoreResult};
use crate::plan::{PlanStep, StepKind};

/// Executes steps of one kind.
#[async_trait]
pub trait StepHandler: Send + Sync {
    fn kind(&self) -> StepKind;

    /// Configuration checks run by the executor before any step starts.
    fn preflight(&self) -> CoreResult<()> {
        Ok(())
    }

    async fn run(&self, step: &PlanStep, ctx: &ProvisioningContext) -> CoreResult<StepOutput>;
}

fn environment<'a>(step: &PlanStep, ctx: &'a ProvisioningContext) -> CoreResult<&'a Environment> {
    let name = step.environment.as_ref().ok_or_else(|| CoreError::InvalidStep {
        step: step.id.clone(),
        reason: "no environment".to_string(),
    })?;
    Ok(ctx.registry.get_required(name)?)
}

fn missing(step: &PlanStep, kind: StepKind, environment: Option<&EnvironmentName>) -> CoreError {
    CoreError::DependencyNotSatisfied {
        step: step.id.clone(),
        missing: match environment {
            Some(env) => format!("{}:{}", kind, env),
            None => kind.to_string(),
        },
    }
}

fn resolved<'a>(step: &PlanStep, ctx: &'a ProvisioningContext) -> CoreResult<&'a ResolvedTopology> {
    ctx.outputs
        .topology
        .as_ref()
        .ok_or_else(|| missing(step, StepKind::ResolveTopology, None))
}

pub struct ResourceGroupHandler {
    network: Arc<dyn NetworkProvisioner>,
}

#[async_trait]
impl StepHandler for ResourceGroupHandler {
    fn kind(&self) -> StepKind {
        StepKind::ResourceGroup
    }

    async fn run(&self, step: &PlanStep, ctx: &ProvisioningContext) -> CoreResult<StepOutput> {
        let env = environment(step, ctx)?;
        let id = self.network.ensure_resource_group(env).await?;
        Ok(StepOutput::ResourceGroup {
            environment: env.name.clone(),
            id,
        })
    }
}

pub struct NetworkHandler {
    network: Arc<dyn NetworkProvisioner>,
}

#[async_trait]
impl StepHandler for NetworkHandler {
    fn kind(&self) -> StepKind {
        StepKind::Network
    }

    async fn run(&self, step: &PlanStep, ctx: &ProvisioningContext) -> CoreResult<StepOutput> {
        let env = environment(step, ctx)?;
        Ok(StepOutput::Network(self.network.provision(env).await?))
    }
}

pub struct ComputeHandler {
    compute: Arc<dyn ComputeProvisioner>,
}

#[async_trait]
impl StepHandler for ComputeHandler {
    fn kind(&self) -> StepKind {
        StepKind::Compute
    }

    async fn run(&self, step: &PlanStep, ctx: &ProvisioningContext) -> CoreResult<StepOutput> {
        let env = environment(step, ctx)?;
        let network = ctx
            .outputs
            .networks
            .get(&env.name)
            .ok_or_else(|| missing(step, StepKind::Network, Some(&env.name)))?;
        let handle = self.compute.provision(env, network).await?;
        Ok(StepOutput::Compute {
            environment: env.name.clone(),
            handle,
        })
    }
}

pub struct TopologyHandler {
    resolver: TopologyResolver,
}

#[async_trait]
impl StepHandler for TopologyHandler {
    fn kind(&self) -> StepKind {
        StepKind::ResolveTopology
    }

    fn preflight(&self) -> CoreResult<()> {
        Ok(self.resolver.policy().validate()?)
    }

    async fn run(&self, _step: &PlanStep, ctx: &ProvisioningContext) -> CoreResult<StepOutput> {
        let topology = self.resolver.resolve(&ctx.registry, &ctx.outputs.networks)?;
        Ok(StepOutput::Topology(topology))
    }
}

pub struct PeeringHandler {
    applier: TopologyApplier,
}

#[async_trait]
impl StepHandler for PeeringHandler {
    fn kind(&self) -> StepKind {
        StepKind::Peerings
    }

    async fn run(&self, step: &PlanStep, ctx: &ProvisioningContext) -> CoreResult<StepOutput> {
        let topology = resolved(step, ctx)?;
        Ok(StepOutput::Applied(self.applier.apply_peerings(&topology.peerings).await?))
    }
}

/// Route table and subnet associations of one environment.
pub struct RoutingHandler {
    applier: TopologyApplier,
}

#[async_trait]
impl StepHandler for RoutingHandler {
    fn kind(&self) -> StepKind {
        StepKind::Routing
    }

    async fn run(&self, step: &PlanStep, ctx: &ProvisioningContext) -> CoreResult<StepOutput> {
        let env = environment(step, ctx)?;
        let topology = resolved(step, ctx)?;
        let tables: Vec<_> = topology.route_table(&env.name).cloned().into_iter().collect();
        let associations: Vec<_> = topology.associations_for(&env.name).cloned().collect();

        let mut summary = self.applier.apply_route_tables(&tables).await?;
        summary.merge(self.applier.apply_associations(&tables, &associations).await?);
        debug!("Routing for {}: {:?}", env.name, summary);
        Ok(StepOutput::Applied(summary))
    }
}

pub struct ExtensionHandler {
    configurator: Arc<dyn ExtensionConfigurator>,
}

#[async_trait]
impl StepHandler for ExtensionHandler {
    fn kind(&self) -> StepKind {
        StepKind::Extensions
    }

    async fn run(&self, step: &PlanStep, ctx: &ProvisioningContext) -> CoreResult<StepOutput> {
        let env = environment(step, ctx)?;
        let compute = ctx
            .outputs
            .compute
            .get(&env.name)
            .ok_or_else(|| missing(step, StepKind::Compute, Some(&env.name)))?;
        let extensions = self.configurator.configure(env, compute).await?;
        Ok(StepOutput::Configured {
            environment: env.name.clone(),
            extensions,
        })
    }
}

/// Maps step kinds to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<StepKind, Arc<dyn StepHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its kind, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn StepHandler>) {
        debug!("Registering handler: {}", handler.kind());
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn with(mut self, handler: Arc<dyn StepHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, kind: StepKind) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn get_required(&self, kind: StepKind) -> CoreResult<Arc<dyn StepHandler>> {
        self.get(kind)
            .ok_or_else(|| CoreError::HandlerNotFound(kind.to_string()))
    }

    pub fn contains(&self, kind: StepKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handlers wired to explicit collaborators.
    pub fn with_collaborators(
        network: Arc<dyn NetworkProvisioner>,
        compute: Arc<dyn ComputeProvisioner>,
        configurator: Arc<dyn ExtensionConfigurator>,
        applier: TopologyApplier,
        policy: TopologyPolicy,
    ) -> Self {
        Self::new()
            .with(Arc::new(ResourceGroupHandler {
                network: network.clone(),
            }))
            .with(Arc::new(NetworkHandler { network }))
            .with(Arc::new(ComputeHandler { compute }))
            .with(Arc::new(TopologyHandler {
                resolver: TopologyResolver::new(policy),
            }))
            .with(Arc::new(PeeringHandler {
                applier: applier.clone(),
            }))
            .with(Arc::new(RoutingHandler { applier }))
            .with(Arc::new(ExtensionHandler { configurator }))
    }

    /// Standard handlers backed by one cloud backend.
    pub fn standard(
        backend: Arc<dyn CloudBackend>,
        ids: ResourceIds,
        timezones: TimezoneMap,
        policy: TopologyPolicy,
    ) -> Self {
        Self::with_collaborators(
            Arc::new(VnetProvisioner::new(backend.clone(), ids.clone())),
            Arc::new(VmProvisioner::new(backend.clone(), ids.clone())),
            Arc::new(TimezoneConfigurator::new(backend.clone(), ids.clone(), timezones)),
            TopologyApplier::new(backend, ids),
            policy,
        )
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.handlers.keys().map(|k| k.as_str()).collect();
        kinds.sort();
        f.debug_struct("HandlerRegistry").field("handlers", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubnet_cloud::InMemoryCloud;
    use hubnet_registry::DeploymentConfig;
    use std::path::PathBuf;

    fn standard() -> HandlerRegistry {
        HandlerRegistry::standard(
            Arc::new(InMemoryCloud::new()),
            ResourceIds::new("sub"),
            TimezoneMap::default(),
            TopologyPolicy::reference(),
        )
    }

    #[test]
    fn test_standard_covers_every_kind() {
        let registry = standard();
        assert_eq!(registry.len(), 7);
        for kind in [
            StepKind::ResourceGroup,
            StepKind::Network,
            StepKind::Compute,
            StepKind::ResolveTopology,
            StepKind::Peerings,
            StepKind::Routing,
            StepKind::Extensions,
        ] {
            assert_eq!(registry.get_required(kind).unwrap().kind(), kind);
        }
    }

    #[tokio::test]
    async fn test_compute_without_network_output() {
        let ctx =
            ProvisioningContext::from_config(PathBuf::from("/tmp"), &DeploymentConfig::reference())
                .unwrap();
        let step = PlanStep::scoped(StepKind::Compute, &"clinical".into());

        let err = standard()
            .get_required(StepKind::Compute)
            .unwrap()
            .run(&step, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::DependencyNotSatisfied { ref missing, .. } if missing == "network:clinical"
        ));
    }

    #[tokio::test]
    async fn test_peerings_without_topology() {
        let ctx =
            ProvisioningContext::from_config(PathBuf::from("/tmp"), &DeploymentConfig::reference())
                .unwrap();
        let err = standard()
            .get_required(StepKind::Peerings)
            .unwrap()
            .run(&PlanStep::global(StepKind::Peerings), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("topology"));
    }
}
