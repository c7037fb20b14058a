//! Provisioning context shared by the steps of one execution.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hubnet_cloud::{ApplySummary, ComputeHandle};
use hubnet_registry::{
    DeploymentConfig, EnvironmentName, EnvironmentRegistry, RegistryResult, TimezoneMap,
};
use hubnet_topology::{NetworkHandles, ResolvedTopology};

/// Output of a single step, merged into the context after its layer joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepOutput {
    ResourceGroup { environment: EnvironmentName, id: String },
    Network(hubnet_topology::NetworkHandle),
    Compute { environment: EnvironmentName, handle: ComputeHandle },
    Topology(ResolvedTopology),
    Applied(ApplySummary),
    Configured { environment: EnvironmentName, extensions: usize },
}

/// Outputs accumulated across layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOutputs {
    pub resource_groups: BTreeMap<EnvironmentName, String>,
    pub networks: NetworkHandles,
    pub compute: BTreeMap<EnvironmentName, ComputeHandle>,
    pub topology: Option<ResolvedTopology>,
    pub applied: ApplySummary,
    pub extensions: BTreeMap<EnvironmentName, usize>,
}

impl StepOutputs {
    pub fn merge(&mut self, output: StepOutput) {
        match output {
            StepOutput::ResourceGroup { environment, id } => {
                self.resource_groups.insert(environment, id);
            }
            StepOutput::Network(handle) => {
                self.networks.insert(handle.environment_name.clone(), handle);
            }
            StepOutput::Compute { environment, handle } => {
                self.compute.insert(environment, handle);
            }
            StepOutput::Topology(topology) => self.topology = Some(topology),
            StepOutput::Applied(summary) => self.applied.merge(summary),
            StepOutput::Configured { environment, extensions } => {
                self.extensions.insert(environment, extensions);
            }
        }
    }
}

/// Execution parameters plus everything produced so far.
#[derive(Debug, Clone)]
pub struct ProvisioningContext {
    pub execution_id: Uuid,
    /// Root under which `.hubnet/logs` is written.
    pub workspace_path: PathBuf,
    pub registry: EnvironmentRegistry,
    pub timezones: TimezoneMap,
    pub outputs: StepOutputs,
}

impl ProvisioningContext {
    pub fn new(
        workspace_path: PathBuf,
        registry: EnvironmentRegistry,
        timezones: TimezoneMap,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            workspace_path,
            registry,
            timezones,
            outputs: StepOutputs::default(),
        }
    }

    pub fn from_config(workspace_path: PathBuf, config: &DeploymentConfig) -> RegistryResult<Self> {
        Ok(Self::new(workspace_path, config.registry()?, config.timezone_map()))
    }
}
