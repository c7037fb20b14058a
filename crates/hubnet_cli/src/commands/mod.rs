//! CLI command definitions.
//!
//! Each subcommand loads a deployment configuration, either from
//! `--config` / `HUBNET_CONFIG` or the built-in reference deployment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use hubnet_registry::DeploymentConfig;

pub mod apply;
pub mod plan;
pub mod topology;
pub mod validate;

/// hubnet - hub-and-spoke network provisioning
#[derive(Parser, Debug)]
#[command(name = "hubnet")]
#[command(version, about = "hubnet - hub-and-spoke network provisioning")]
#[command(long_about = r#"
hubnet provisions a hub-and-spoke network deployment: per-environment
networks and machines, the peering edges between hub, gateway and spoke
environments, and the route tables that send spoke traffic through the hub.

COMMANDS:
  validate  → Check the deployment configuration
  plan      → Print the ordered, layered provisioning plan
  topology  → Dry-run networks and print the resolved topology
  apply     → Execute the plan against a state-backed in-memory cloud

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  5 - Provisioning failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the deployment configuration
    Validate(validate::ValidateArgs),

    /// Print the provisioning plan
    Plan(plan::PlanArgs),

    /// Resolve the peering and routing topology without provisioning
    Topology(topology::TopologyArgs),

    /// Provision the deployment
    Apply(apply::ApplyArgs),
}

/// Deployment configuration source shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Deployment YAML file; the reference deployment is used when omitted
    #[arg(short, long, env = "HUBNET_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<DeploymentConfig> {
        load_config(self.config.as_deref())
    }
}

/// Outcomes that map to dedicated exit codes.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Configuration validation failed with {0} error(s)")]
    ValidationFailed(usize),

    #[error("Provisioning of '{plan}' failed: {message}")]
    ProvisioningFailed { plan: String, message: String },
}

pub fn load_config(path: Option<&Path>) -> Result<DeploymentConfig> {
    match path {
        Some(path) => DeploymentConfig::from_file(path)
            .with_context(|| format!("Failed to load deployment from {}", path.display())),
        None => {
            info!("No configuration given, using the reference deployment");
            Ok(DeploymentConfig::reference())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply_with_paths() {
        let cli = Cli::try_parse_from([
            "hubnet",
            "--verbose",
            "apply",
            "--config",
            "deploy.yaml",
            "--state",
            "state.json",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Apply(args) => {
                assert_eq!(args.config.config, Some(PathBuf::from("deploy.yaml")));
                assert_eq!(args.state, Some(PathBuf::from("state.json")));
                assert_eq!(args.workspace, PathBuf::from("."));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_plan_json() {
        let cli = Cli::try_parse_from(["hubnet", "plan", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Plan(ref args) if args.json));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let err = Cli::try_parse_from(["hubnet", "destroy"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_load_reference_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config.environments.len(), 5);
    }

    #[test]
    fn test_load_shipped_reference_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/reference.yaml");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config, DeploymentConfig::reference());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/deploy.yaml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/deploy.yaml"));
    }
}
