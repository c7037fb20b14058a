//! Environment registry.
//!
//! The registry is an explicit configuration value: it is built once from
//! static configuration and handed to every consumer, never read from
//! ambient global state.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::models::{Environment, EnvironmentName, EnvironmentRole};

/// Immutable, ordered set of environments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentRegistry {
    environments: Vec<Environment>,
}

impl EnvironmentRegistry {
    /// Create a registry, rejecting duplicate environment names.
    pub fn new(environments: Vec<Environment>) -> RegistryResult<Self> {
        let mut seen = HashSet::new();
        for env in &environments {
            if !seen.insert(env.name.clone()) {
                return Err(RegistryError::DuplicateEnvironment(env.name.to_string()));
            }
        }
        debug!("Loaded registry with {} environments", environments.len());
        Ok(Self { environments })
    }

    /// Load a registry from a YAML list of environments.
    pub fn from_yaml_str(content: &str) -> RegistryResult<Self> {
        let environments: Vec<Environment> = serde_yaml::from_str(content)?;
        Self::new(environments)
    }

    /// Load a registry from a YAML file.
    pub fn from_file(path: &Path) -> RegistryResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// All environments in declaration order.
    pub fn list_environments(&self) -> &[Environment] {
        &self.environments
    }

    pub fn get(&self, name: &EnvironmentName) -> Option<&Environment> {
        self.environments.iter().find(|e| &e.name == name)
    }

    /// Get an environment, failing if it is not declared.
    pub fn get_required(&self, name: &EnvironmentName) -> RegistryResult<&Environment> {
        self.get(name)
            .ok_or_else(|| RegistryError::EnvironmentNotFound(name.to_string()))
    }

    /// Environments with the given role, in declaration order.
    pub fn by_role(&self, role: EnvironmentRole) -> impl Iterator<Item = &Environment> {
        self.environments.iter().filter(move |e| e.role == role)
    }

    /// The single hub environment.
    pub fn hub(&self) -> RegistryResult<&Environment> {
        let hubs: Vec<&Environment> = self.by_role(EnvironmentRole::Hub).collect();
        match hubs.as_slice() {
            [hub] => Ok(hub),
            [] => Err(RegistryError::MissingHub),
            many => Err(RegistryError::MultipleHubs(
                many.iter().map(|e| e.name.to_string()).collect(),
            )),
        }
    }

    pub fn names(&self) -> Vec<&EnvironmentName> {
        self.environments.iter().map(|e| &e.name).collect()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentConfig;
    use crate::models::NetworkSpec;

    fn env(name: &str, role: EnvironmentRole, cidr: &str) -> Environment {
        Environment::new(
            name,
            role,
            format!("rg-{}", name),
            "eastus",
            NetworkSpec {
                name: format!("vnet-{}", name),
                cidr: cidr.parse().unwrap(),
            },
        )
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let result = EnvironmentRegistry::new(vec![
            env("hub", EnvironmentRole::Hub, "10.0.0.0/16"),
            env("hub", EnvironmentRole::Spoke, "10.1.0.0/16"),
        ]);
        assert_eq!(
            result.unwrap_err(),
            RegistryError::DuplicateEnvironment("hub".to_string())
        );
    }

    #[test]
    fn test_list_preserves_declaration_order() {
        let registry = DeploymentConfig::reference().registry().unwrap();
        let names: Vec<&str> = registry.names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["hub", "gateway", "clinical", "non_clinical", "velocity"]);
    }

    #[test]
    fn test_get_required_missing() {
        let registry = DeploymentConfig::reference().registry().unwrap();
        let err = registry.get_required(&"dmz".into()).unwrap_err();
        assert_eq!(err, RegistryError::EnvironmentNotFound("dmz".to_string()));
    }

    #[test]
    fn test_hub_lookup() {
        let registry = EnvironmentRegistry::new(vec![
            env("a", EnvironmentRole::Spoke, "10.1.0.0/16"),
        ])
        .unwrap();
        assert_eq!(registry.hub().unwrap_err(), RegistryError::MissingHub);

        let registry = EnvironmentRegistry::new(vec![
            env("a", EnvironmentRole::Hub, "10.1.0.0/16"),
            env("b", EnvironmentRole::Hub, "10.2.0.0/16"),
        ])
        .unwrap();
        assert!(matches!(registry.hub(), Err(RegistryError::MultipleHubs(_))));
    }

    #[test]
    fn test_by_role() {
        let registry = DeploymentConfig::reference().registry().unwrap();
        let spokes: Vec<&str> = registry
            .by_role(EnvironmentRole::Spoke)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(spokes, vec!["clinical", "non_clinical", "velocity"]);
    }
}
