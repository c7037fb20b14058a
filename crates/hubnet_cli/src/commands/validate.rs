//! Validate command - Check a deployment configuration.

use anyhow::Result;
use clap::Args;
use tracing::info;

use hubnet_registry::RegistryValidator;
use hubnet_topology::TopologyPolicy;

use super::{CommandError, ConfigArgs};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let config = args.config.load()?;
    info!("Validating deployment: {}", config.name);

    let registry = config.registry()?;
    let mut result = RegistryValidator::validate(&registry, &config.timezone_map());
    if let Err(e) = TopologyPolicy::reference().validate() {
        result.add_error(e.to_string());
    }

    println!("Deployment '{}' ({} environments)", config.name, registry.len());
    for env in registry.list_environments() {
        println!(
            "   {:<14} {:<8} {:<18} {}",
            env.name.as_str(),
            env.role.as_str(),
            env.network.cidr.to_string(),
            env.location
        );
    }

    for warning in &result.warnings {
        println!("   warning: {}", warning);
    }

    if result.valid {
        println!("Configuration is valid");
        Ok(())
    } else {
        println!("Configuration is invalid:");
        for error in &result.errors {
            println!("   - {}", error);
        }
        Err(CommandError::ValidationFailed(result.errors.len()).into())
    }
}
