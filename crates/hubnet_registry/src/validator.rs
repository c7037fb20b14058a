//! Configuration validation.
//!
//! All checks run before any provider call. Problems are accumulated so an
//! operator sees every issue in one pass.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{RegistryError, RegistryResult};
use crate::models::{Environment, EnvironmentRole, SubnetRole};
use crate::registry::EnvironmentRegistry;
use crate::timezone::TimezoneMap;

/// Validation result with details.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Convert into a fatal error if any check failed.
    pub fn into_result(self) -> RegistryResult<()> {
        if self.valid {
            Ok(())
        } else {
            Err(RegistryError::InvalidConfiguration(self.errors))
        }
    }
}

fn resource_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,78}[A-Za-z0-9_]$").expect("valid name pattern")
    })
}

/// Validator for the environment configuration.
pub struct RegistryValidator;

impl RegistryValidator {
    /// Validate the whole registry.
    pub fn validate(registry: &EnvironmentRegistry, timezones: &TimezoneMap) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = registry.hub() {
            result.add_error(e.to_string());
        }

        result.merge(Self::validate_network_overlaps(registry));

        for env in registry.list_environments() {
            result.merge(Self::validate_environment(env));
            if let Err(e) = timezones.resolve(env) {
                result.add_error(e.to_string());
            }
        }

        result
    }

    /// Validate and fail with every problem found.
    pub fn check(registry: &EnvironmentRegistry, timezones: &TimezoneMap) -> RegistryResult<()> {
        Self::validate(registry, timezones).into_result()
    }

    /// Network CIDRs must not overlap across environments.
    pub fn validate_network_overlaps(registry: &EnvironmentRegistry) -> ValidationResult {
        let mut result = ValidationResult::new();
        let envs = registry.list_environments();

        for (i, first) in envs.iter().enumerate() {
            for second in &envs[i + 1..] {
                if first.network.cidr.overlaps(&second.network.cidr) {
                    result.add_error(
                        RegistryError::OverlappingNetworks {
                            first: first.name.to_string(),
                            first_cidr: first.network.cidr.to_string(),
                            second: second.name.to_string(),
                            second_cidr: second.network.cidr.to_string(),
                        }
                        .to_string(),
                    );
                }
            }
        }

        result
    }

    /// Validate one environment's names, subnets, capabilities and machines.
    pub fn validate_environment(env: &Environment) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = validate_environment_network(env) {
            result.add_error(e.to_string());
        }

        for (kind, name) in std::iter::once(("resource group", env.resource_group.as_str()))
            .chain(std::iter::once(("virtual network", env.network.name.as_str())))
            .chain(env.subnets.iter().map(|s| ("subnet", s.name.as_str())))
            .chain(env.machines.iter().map(|m| ("machine", m.name.as_str())))
        {
            if !resource_name_pattern().is_match(name) {
                result.add_error(
                    RegistryError::InvalidName {
                        environment: env.name.to_string(),
                        kind: kind.to_string(),
                        name: name.to_string(),
                    }
                    .to_string(),
                );
            }
        }

        if env.role == EnvironmentRole::Hub && !env.capabilities.vpn_gateway {
            result.add_error(RegistryError::HubWithoutVpnGateway(env.name.to_string()).to_string());
        }

        if env.capabilities.vpn_gateway && env.subnet(SubnetRole::Gateway).is_none() {
            result.add_error(missing_role(
                env,
                SubnetRole::Gateway,
                "the VPN gateway is deployed into it",
            ));
        }

        if env.capabilities.nat_gateway && env.subnet(SubnetRole::Shared).is_none() {
            result.add_error(missing_role(
                env,
                SubnetRole::Shared,
                "the NAT gateway is attached to it",
            ));
        }

        for machine in &env.machines {
            if env.subnet(machine.subnet).is_none() {
                result.add_error(missing_role(
                    env,
                    machine.subnet,
                    &format!("machine '{}' is placed on it", machine.name),
                ));
            }
        }

        if env.subnets.iter().all(|s| s.role == SubnetRole::Management) {
            result.add_warning(format!(
                "Environment '{}' has no non-management subnets; no route table associations will be created",
                env.name
            ));
        }

        result
    }
}

fn missing_role(env: &Environment, role: SubnetRole, reason: &str) -> String {
    RegistryError::MissingSubnetRole {
        environment: env.name.to_string(),
        role: role.to_string(),
        reason: reason.to_string(),
    }
    .to_string()
}

/// Check an environment's subnet layout.
///
/// Subnets must be disjoint sub-ranges of the network CIDR, and names and
/// roles must be unique. The network provisioner calls this before creating
/// any resource.
pub fn validate_environment_network(env: &Environment) -> RegistryResult<()> {
    let mut names = HashSet::new();
    let mut roles = HashSet::new();

    for (i, subnet) in env.subnets.iter().enumerate() {
        if !env.network.cidr.contains(&subnet.cidr) {
            return Err(RegistryError::SubnetOutsideNetwork {
                environment: env.name.to_string(),
                subnet: subnet.name.clone(),
                cidr: subnet.cidr.to_string(),
                network_cidr: env.network.cidr.to_string(),
            });
        }

        if !names.insert(subnet.name.as_str()) {
            return Err(RegistryError::DuplicateSubnet {
                environment: env.name.to_string(),
                kind: "name".to_string(),
                value: subnet.name.clone(),
            });
        }

        if !roles.insert(subnet.role) {
            return Err(RegistryError::DuplicateSubnet {
                environment: env.name.to_string(),
                kind: "role".to_string(),
                value: subnet.role.to_string(),
            });
        }

        if let Some(other) = env.subnets[..i].iter().find(|o| o.cidr.overlaps(&subnet.cidr)) {
            return Err(RegistryError::OverlappingSubnets {
                environment: env.name.to_string(),
                first: other.name.clone(),
                second: subnet.name.clone(),
            });
        }
    }

    Ok(())
}
