//! Provisioning plan: dependency-layered creation steps.
//!
//! Steps are grouped into six layers:
//!
//! 1. resource groups
//! 2. networks, one per environment, independent of each other
//! 3. compute, each depending only on its own environment's network
//! 4. topology resolution, depending on every network
//! 5. peerings, route tables and associations
//! 6. machine extensions, depending on compute
//!
//! The builder orders steps with Kahn's algorithm so that every step's
//! inputs come from steps earlier in the list.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use hubnet_registry::{EnvironmentName, EnvironmentRegistry};
use hubnet_topology::TopologyPolicy;

use crate::error::{CoreError, CoreResult};

/// Dependency layer of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    ResourceGroups,
    Networks,
    Compute,
    Topology,
    Routing,
    Extensions,
}

impl Layer {
    /// 1-based layer number.
    pub fn number(&self) -> usize {
        match self {
            Layer::ResourceGroups => 1,
            Layer::Networks => 2,
            Layer::Compute => 3,
            Layer::Topology => 4,
            Layer::Routing => 5,
            Layer::Extensions => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::ResourceGroups => "resource_groups",
            Layer::Networks => "networks",
            Layer::Compute => "compute",
            Layer::Topology => "topology",
            Layer::Routing => "routing",
            Layer::Extensions => "extensions",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Layer::ResourceGroups,
            Layer::Networks,
            Layer::Compute,
            Layer::Topology,
            Layer::Routing,
            Layer::Extensions,
        ]
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a step does; selects its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    ResourceGroup,
    Network,
    Compute,
    ResolveTopology,
    Peerings,
    Routing,
    Extensions,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::ResourceGroup => "resource-group",
            StepKind::Network => "network",
            StepKind::Compute => "compute",
            StepKind::ResolveTopology => "topology",
            StepKind::Peerings => "peerings",
            StepKind::Routing => "routing",
            StepKind::Extensions => "extensions",
        }
    }

    pub fn layer(&self) -> Layer {
        match self {
            StepKind::ResourceGroup => Layer::ResourceGroups,
            StepKind::Network => Layer::Networks,
            StepKind::Compute => Layer::Compute,
            StepKind::ResolveTopology => Layer::Topology,
            StepKind::Peerings | StepKind::Routing => Layer::Routing,
            StepKind::Extensions => Layer::Extensions,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single creation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub layer: Layer,
    pub kind: StepKind,
    /// Owning environment; `None` for cross-environment steps.
    pub environment: Option<EnvironmentName>,
    pub depends_on: Vec<String>,
}

impl PlanStep {
    /// Step scoped to one environment, with id `<kind>:<environment>`.
    pub fn scoped(kind: StepKind, environment: &EnvironmentName) -> Self {
        Self {
            id: format!("{}:{}", kind.as_str(), environment),
            layer: kind.layer(),
            kind,
            environment: Some(environment.clone()),
            depends_on: Vec::new(),
        }
    }

    /// Cross-environment step, with id `<kind>`.
    pub fn global(kind: StepKind) -> Self {
        Self {
            id: kind.as_str().to_string(),
            layer: kind.layer(),
            kind,
            environment: None,
            depends_on: Vec::new(),
        }
    }

    pub fn after(mut self, step_id: impl Into<String>) -> Self {
        self.depends_on.push(step_id.into());
        self
    }

    pub fn after_all(mut self, step_ids: impl IntoIterator<Item = String>) -> Self {
        self.depends_on.extend(step_ids);
        self
    }
}

/// Ordered list of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPlan {
    pub id: String,
    pub steps: Vec<PlanStep>,
}

impl ProvisioningPlan {
    /// Check that every dependency exists, precedes its dependent and
    /// belongs to a strictly earlier layer.
    pub fn validate(&self) -> CoreResult<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        let layers: HashMap<&str, Layer> =
            self.steps.iter().map(|s| (s.id.as_str(), s.layer)).collect();

        for step in &self.steps {
            for dep in &step.depends_on {
                let Some(&dep_layer) = layers.get(dep.as_str()) else {
                    return Err(CoreError::UnknownDependency {
                        step: step.id.clone(),
                        dependency: dep.clone(),
                    });
                };
                if !seen.contains(dep.as_str()) || dep_layer >= step.layer {
                    return Err(CoreError::OrderViolation {
                        step: step.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            if !seen.insert(step.id.as_str()) {
                return Err(CoreError::DuplicateStep(step.id.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Steps grouped by layer, in plan order.
    pub fn layers(&self) -> Vec<(Layer, Vec<&PlanStep>)> {
        Layer::all()
            .into_iter()
            .map(|layer| {
                let steps: Vec<&PlanStep> =
                    self.steps.iter().filter(|s| s.layer == layer).collect();
                (layer, steps)
            })
            .filter(|(_, steps)| !steps.is_empty())
            .collect()
    }

    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Builds the provisioning plan for a registry.
pub struct PlanBuilder<'a> {
    registry: &'a EnvironmentRegistry,
    policy: &'a TopologyPolicy,
    id: String,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(registry: &'a EnvironmentRegistry, policy: &'a TopologyPolicy) -> Self {
        Self {
            registry,
            policy,
            id: "hubnet".to_string(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn build(&self) -> CoreResult<ProvisioningPlan> {
        self.policy.validate()?;
        let steps = order_steps(self.steps())?;
        let plan = ProvisioningPlan {
            id: self.id.clone(),
            steps,
        };
        plan.validate()?;
        debug!("Built plan '{}' with {} steps", plan.id, plan.len());
        Ok(plan)
    }

    fn steps(&self) -> Vec<PlanStep> {
        let envs = self.registry.list_environments();
        let mut steps = Vec::new();
        let mut networks = Vec::new();

        for env in envs {
            steps.push(PlanStep::scoped(StepKind::ResourceGroup, &env.name));
        }
        for env in envs {
            let rg = PlanStep::scoped(StepKind::ResourceGroup, &env.name).id;
            let network = PlanStep::scoped(StepKind::Network, &env.name).after(rg);
            networks.push(network.id.clone());
            steps.push(network);
        }
        for env in envs.iter().filter(|e| !e.machines.is_empty()) {
            let network = PlanStep::scoped(StepKind::Network, &env.name).id;
            steps.push(PlanStep::scoped(StepKind::Compute, &env.name).after(network));
        }

        let topology = PlanStep::global(StepKind::ResolveTopology).after_all(networks);
        let topology_id = topology.id.clone();
        steps.push(topology);
        steps.push(PlanStep::global(StepKind::Peerings).after(topology_id.clone()));
        for env in envs.iter().filter(|e| self.policy.routes(e.role)) {
            steps.push(PlanStep::scoped(StepKind::Routing, &env.name).after(topology_id.clone()));
        }

        for env in envs.iter().filter(|e| !e.machines.is_empty()) {
            let compute = PlanStep::scoped(StepKind::Compute, &env.name).id;
            steps.push(PlanStep::scoped(StepKind::Extensions, &env.name).after(compute));
        }
        steps
    }
}

/// Kahn's algorithm; ready steps are taken by layer, then by the order
/// they were emitted in.
pub fn order_steps(steps: Vec<PlanStep>) -> CoreResult<Vec<PlanStep>> {
    let index: HashMap<String, usize> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.clone(), i))
        .collect();
    if index.len() != steps.len() {
        let mut seen = HashSet::new();
        if let Some(dup) = steps.iter().find(|s| !seen.insert(s.id.as_str())) {
            return Err(CoreError::DuplicateStep(dup.id.clone()));
        }
    }

    let mut in_degree = vec![0usize; steps.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
    for (i, step) in steps.iter().enumerate() {
        for dep in &step.depends_on {
            let &d = index.get(dep).ok_or_else(|| CoreError::UnknownDependency {
                step: step.id.clone(),
                dependency: dep.clone(),
            })?;
            in_degree[i] += 1;
            dependents[d].push(i);
        }
    }

    let mut ready: BTreeSet<(Layer, usize)> = steps
        .iter()
        .enumerate()
        .filter(|(i, _)| in_degree[*i] == 0)
        .map(|(i, s)| (s.layer, i))
        .collect();

    let mut order = Vec::with_capacity(steps.len());
    while let Some(next) = ready.pop_first() {
        let (_, i) = next;
        order.push(i);
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert((steps[dependent].layer, dependent));
            }
        }
    }

    if order.len() < steps.len() {
        let stuck = steps
            .iter()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] > 0)
            .map(|(_, s)| s.id.clone())
            .collect();
        return Err(CoreError::CycleDetected(stuck));
    }

    let mut slots: Vec<Option<PlanStep>> = steps.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
