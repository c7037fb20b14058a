//! OS-level configuration applied through VM extensions.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use hubnet_registry::{Environment, RegistryError, TimezoneMap};

use crate::backend::CloudBackend;
use crate::compute::ComputeHandle;
use crate::error::CloudResult;
use crate::resource::{ResourceIds, ResourceKind, ResourceRecord};

const EXTENSION_NAME: &str = "set-timezone";

/// Configures machines after they are created.
#[async_trait]
pub trait ExtensionConfigurator: Send + Sync {
    /// Configure every machine of an environment; returns the number of
    /// extensions applied.
    async fn configure(&self, env: &Environment, compute: &ComputeHandle) -> CloudResult<usize>;
}

/// Sets each machine's timezone from its location.
#[derive(Clone)]
pub struct TimezoneConfigurator {
    backend: Arc<dyn CloudBackend>,
    ids: ResourceIds,
    timezones: TimezoneMap,
}

impl TimezoneConfigurator {
    pub fn new(backend: Arc<dyn CloudBackend>, ids: ResourceIds, timezones: TimezoneMap) -> Self {
        Self {
            backend,
            ids,
            timezones,
        }
    }

    fn location<'a>(env: &'a Environment, compute: &'a ComputeHandle, vm_id: &str) -> &'a str {
        compute
            .location_by_vm
            .get(vm_id)
            .map(String::as_str)
            .unwrap_or(&env.location)
    }

    async fn apply(&self, vm_id: &str, properties: serde_json::Value) -> CloudResult<()> {
        let id = self.ids.vm_extension(vm_id, EXTENSION_NAME);
        let outcome = self
            .backend
            .ensure(ResourceRecord::new(
                id.clone(),
                ResourceKind::VmExtension,
                EXTENSION_NAME,
                properties,
            ))
            .await?;
        debug!("{:?} {}", outcome, id);
        Ok(())
    }
}

#[async_trait]
impl ExtensionConfigurator for TimezoneConfigurator {
    async fn configure(&self, env: &Environment, compute: &ComputeHandle) -> CloudResult<usize> {
        // Unknown locations fail the environment instead of skipping it.
        self.timezones.resolve(env)?;

        let lookup = |vm_id: &str| {
            let location = Self::location(env, compute, vm_id);
            self.timezones
                .get(location)
                .ok_or_else(|| RegistryError::MissingTimezone {
                    environment: env.name.to_string(),
                    location: location.to_string(),
                })
        };

        let mut applied = 0;
        for vm_id in &compute.windows_vm_ids {
            let timezone = lookup(vm_id)?;
            self.apply(
                vm_id,
                json!({
                    "publisher": "Microsoft.Compute",
                    "type": "CustomScriptExtension",
                    "command": format!("tzutil /s \"{}\"", timezone.windows),
                }),
            )
            .await?;
            applied += 1;
        }
        for vm_id in &compute.linux_vm_ids {
            let timezone = lookup(vm_id)?;
            self.apply(
                vm_id,
                json!({
                    "publisher": "Microsoft.Azure.Extensions",
                    "type": "CustomScript",
                    "command": format!("timedatectl set-timezone {}", timezone.iana),
                }),
            )
            .await?;
            applied += 1;
        }

        info!("Configured {} machines in {}", applied, env.name);
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryCloud;
    use crate::error::CloudError;
    use hubnet_registry::{DeploymentConfig, OsFamily};

    fn clinical() -> Environment {
        DeploymentConfig::reference()
            .environments
            .into_iter()
            .find(|e| e.name.as_str() == "clinical")
            .unwrap()
    }

    fn compute() -> ComputeHandle {
        let mut handle = ComputeHandle::default();
        handle.insert("/vms/clin-app01".to_string(), OsFamily::Windows, "eastus".to_string());
        handle.insert("/vms/clin-web01".to_string(), OsFamily::Linux, "eastus".to_string());
        handle
    }

    #[tokio::test]
    async fn test_commands_per_os() {
        let cloud = InMemoryCloud::new();
        let configurator = TimezoneConfigurator::new(
            Arc::new(cloud.clone()),
            ResourceIds::new("sub"),
            TimezoneMap::default(),
        );

        assert_eq!(configurator.configure(&clinical(), &compute()).await.unwrap(), 2);

        let windows = cloud.record("/vms/clin-app01/extensions/set-timezone").unwrap();
        assert_eq!(windows.properties["command"], "tzutil /s \"Eastern Standard Time\"");
        let linux = cloud.record("/vms/clin-web01/extensions/set-timezone").unwrap();
        assert_eq!(linux.properties["command"], "timedatectl set-timezone America/New_York");
    }

    #[tokio::test]
    async fn test_unknown_location_fails_fast() {
        let cloud = InMemoryCloud::new();
        let configurator = TimezoneConfigurator::new(
            Arc::new(cloud.clone()),
            ResourceIds::new("sub"),
            TimezoneMap::empty(),
        );

        let err = configurator.configure(&clinical(), &compute()).await.unwrap_err();
        assert!(matches!(
            err,
            CloudError::Precondition(RegistryError::MissingTimezone { .. })
        ));
        assert_eq!(cloud.ensure_calls(), 0);
    }
}
