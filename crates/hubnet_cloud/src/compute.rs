//! Compute provisioner.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use hubnet_registry::{Environment, OsFamily};
use hubnet_topology::NetworkHandle;

use crate::backend::CloudBackend;
use crate::error::{CloudError, CloudResult};
use crate::resource::{ResourceIds, ResourceKind, ResourceRecord};

/// Machines created for one or more environments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeHandle {
    pub windows_vm_ids: BTreeSet<String>,
    pub linux_vm_ids: BTreeSet<String>,
    pub location_by_vm: BTreeMap<String, String>,
}

impl ComputeHandle {
    pub fn insert(&mut self, vm_id: String, os: OsFamily, location: String) {
        match os {
            OsFamily::Windows => self.windows_vm_ids.insert(vm_id.clone()),
            OsFamily::Linux => self.linux_vm_ids.insert(vm_id.clone()),
        };
        self.location_by_vm.insert(vm_id, location);
    }

    pub fn merge(&mut self, other: ComputeHandle) {
        self.windows_vm_ids.extend(other.windows_vm_ids);
        self.linux_vm_ids.extend(other.linux_vm_ids);
        self.location_by_vm.extend(other.location_by_vm);
    }

    pub fn vm_count(&self) -> usize {
        self.location_by_vm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.location_by_vm.is_empty()
    }
}

/// Provisions the machines of a single environment on its own subnets.
#[async_trait]
pub trait ComputeProvisioner: Send + Sync {
    async fn provision(
        &self,
        env: &Environment,
        network: &NetworkHandle,
    ) -> CloudResult<ComputeHandle>;
}

#[derive(Clone)]
pub struct VmProvisioner {
    backend: Arc<dyn CloudBackend>,
    ids: ResourceIds,
}

impl VmProvisioner {
    pub fn new(backend: Arc<dyn CloudBackend>, ids: ResourceIds) -> Self {
        Self { backend, ids }
    }
}

#[async_trait]
impl ComputeProvisioner for VmProvisioner {
    async fn provision(
        &self,
        env: &Environment,
        network: &NetworkHandle,
    ) -> CloudResult<ComputeHandle> {
        let mut handle = ComputeHandle::default();

        for machine in &env.machines {
            let subnet = network
                .subnet(machine.subnet)
                .ok_or_else(|| CloudError::MissingSubnet {
                    environment: env.name.to_string(),
                    role: machine.subnet.to_string(),
                })?;

            let id = self.ids.virtual_machine(&env.resource_group, &machine.name);
            let outcome = self
                .backend
                .ensure(ResourceRecord::new(
                    id.clone(),
                    ResourceKind::VirtualMachine,
                    &machine.name,
                    json!({
                        "location": env.location,
                        "os": machine.os.as_str(),
                        "subnet_id": subnet.id,
                    }),
                ))
                .await?;
            debug!("{:?} {}", outcome, id);

            handle.insert(id, machine.os, env.location.clone());
        }

        info!("Compute for {} ready: {} machines", env.name, handle.vm_count());
        Ok(handle)
    }
}
