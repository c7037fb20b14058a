//! Deployment configuration file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cidr::Ipv4Cidr;
use crate::error::RegistryResult;
use crate::models::{
    Capabilities, Environment, EnvironmentRole, MachineSpec, NetworkSpec, OsFamily, SubnetRole,
    SubnetSpec,
};
use crate::registry::EnvironmentRegistry;
use crate::timezone::{TimezoneEntry, TimezoneMap};

/// Static configuration for one hub-and-spoke deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub name: String,
    pub subscription_id: String,
    pub environments: Vec<Environment>,
    /// Extra or overriding location to timezone entries.
    #[serde(default)]
    pub timezones: BTreeMap<String, TimezoneEntry>,
}

impl DeploymentConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> RegistryResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        info!(
            "Loaded deployment '{}' with {} environments from {:?}",
            config.name,
            config.environments.len(),
            path
        );
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> RegistryResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Save configuration to a YAML file.
    pub fn to_file(&self, path: &Path) -> RegistryResult<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Build the environment registry.
    pub fn registry(&self) -> RegistryResult<EnvironmentRegistry> {
        EnvironmentRegistry::new(self.environments.clone())
    }

    /// Default timezone table overlaid with the configured entries.
    pub fn timezone_map(&self) -> TimezoneMap {
        let mut overrides = TimezoneMap::empty();
        for (location, entry) in &self.timezones {
            overrides.insert(location.clone(), entry.clone());
        }
        TimezoneMap::default().merge(overrides)
    }

    /// The five-environment reference deployment.
    pub fn reference() -> Self {
        let location = "eastus";

        let hub = Environment::new(
            "hub",
            EnvironmentRole::Hub,
            "rg-hub",
            location,
            network("vnet-hub", "10.0.0.0/16"),
        )
        .with_subnet(subnet("snet-hub-management", "10.0.1.0/24", SubnetRole::Management))
        .with_subnet(subnet("snet-hub-shared", "10.0.2.0/24", SubnetRole::Shared))
        .with_subnet(subnet("GatewaySubnet", "10.0.255.0/27", SubnetRole::Gateway))
        .with_capabilities(Capabilities::transit_root())
        .with_machine(MachineSpec::new("hub-jump01", OsFamily::Windows, SubnetRole::Management));

        let gateway = Environment::new(
            "gateway",
            EnvironmentRole::Gateway,
            "rg-gateway",
            location,
            network("vnet-gateway", "10.10.0.0/16"),
        )
        .with_subnet(subnet("snet-gateway-management", "10.10.0.0/24", SubnetRole::Management))
        .with_subnet(subnet("snet-gateway-trust", "10.10.1.0/24", SubnetRole::Trust))
        .with_subnet(subnet("snet-gateway-untrust", "10.10.2.0/24", SubnetRole::Untrust));

        let clinical = Environment::new(
            "clinical",
            EnvironmentRole::Spoke,
            "rg-clinical",
            location,
            network("vnet-clinical", "10.20.0.0/16"),
        )
        .with_subnet(subnet("snet-clinical-management", "10.20.1.0/24", SubnetRole::Management))
        .with_subnet(subnet("snet-clinical-shared", "10.20.2.0/24", SubnetRole::Shared))
        .with_subnet(subnet("snet-clinical-custom", "10.20.3.0/24", SubnetRole::Custom))
        .with_capabilities(Capabilities::nat())
        .with_machine(MachineSpec::new("clin-app01", OsFamily::Windows, SubnetRole::Shared))
        .with_machine(MachineSpec::new("clin-web01", OsFamily::Linux, SubnetRole::Custom));

        let non_clinical = Environment::new(
            "non_clinical",
            EnvironmentRole::Spoke,
            "rg-non-clinical",
            location,
            network("vnet-non-clinical", "10.30.0.0/16"),
        )
        .with_subnet(subnet("snet-non-clinical-management", "10.30.1.0/24", SubnetRole::Management))
        .with_subnet(subnet("snet-non-clinical-shared", "10.30.2.0/24", SubnetRole::Shared))
        .with_subnet(subnet("snet-non-clinical-dev", "10.30.3.0/24", SubnetRole::Dev))
        .with_capabilities(Capabilities::nat())
        .with_machine(MachineSpec::new("ncl-app01", OsFamily::Linux, SubnetRole::Shared));

        let velocity = Environment::new(
            "velocity",
            EnvironmentRole::Spoke,
            "rg-velocity",
            location,
            network("vnet-velocity", "10.40.0.0/16"),
        )
        .with_subnet(subnet("snet-velocity-management", "10.40.1.0/24", SubnetRole::Management))
        .with_subnet(subnet("snet-velocity-shared", "10.40.2.0/24", SubnetRole::Shared))
        .with_subnet(subnet("snet-velocity-dev", "10.40.3.0/24", SubnetRole::Dev))
        .with_machine(MachineSpec::new("vel-dev01", OsFamily::Linux, SubnetRole::Dev));

        Self {
            name: "reference".to_string(),
            subscription_id: "00000000-0000-0000-0000-000000000000".to_string(),
            environments: vec![hub, gateway, clinical, non_clinical, velocity],
            timezones: BTreeMap::new(),
        }
    }
}

fn network(name: &str, cidr: &str) -> NetworkSpec {
    NetworkSpec {
        name: name.to_string(),
        cidr: parse_static(cidr),
    }
}

fn subnet(name: &str, cidr: &str, role: SubnetRole) -> SubnetSpec {
    SubnetSpec::new(name, parse_static(cidr), role)
}

// Only used for the literals above.
fn parse_static(cidr: &str) -> Ipv4Cidr {
    match cidr.parse() {
        Ok(c) => c,
        Err(e) => panic!("invalid built-in CIDR {}: {}", cidr, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reference_shape() {
        let config = DeploymentConfig::reference();
        assert_eq!(config.environments.len(), 5);
        let registry = config.registry().unwrap();
        assert_eq!(registry.hub().unwrap().name.as_str(), "hub");
        assert!(registry.hub().unwrap().capabilities.vpn_gateway);
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deployment.yaml");

        let mut config = DeploymentConfig::reference();
        config
            .timezones
            .insert("moonbase1".to_string(), TimezoneEntry::new("UTC", "Etc/UTC"));
        config.to_file(&path).unwrap();

        let loaded = DeploymentConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.timezone_map().get("moonbase1").is_some());
        assert!(loaded.timezone_map().get("eastus").is_some());
    }
}
