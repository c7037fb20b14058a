//! hubnet CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 5: Provisioning failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, CommandError, Commands};
use hubnet_cloud::CloudError;
use hubnet_core::CoreError;
use hubnet_registry::RegistryError;
use hubnet_topology::TopologyError;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const PROVISIONING_FAILURE: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(ExitCodes::INVALID_ARGS)
            } else {
                ExitCode::from(ExitCodes::SUCCESS)
            };
        }
    };

    let default_directives = if cli.verbose { "hubnet=debug,info" } else { "hubnet=info,warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    // Ignore a subscriber installed by an embedding process.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();

    let result = match cli.command {
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Plan(args) => commands::plan::execute(args).await,
        Commands::Topology(args) => commands::topology::execute(args).await,
        Commands::Apply(args) => commands::apply::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

/// Map an error to its exit code by walking the typed error chain.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<CommandError>() {
            return match err {
                CommandError::ValidationFailed(_) => ExitCodes::VALIDATION_FAILURE,
                CommandError::ProvisioningFailed { .. } => ExitCodes::PROVISIONING_FAILURE,
            };
        }
        if let Some(err) = cause.downcast_ref::<RegistryError>() {
            return match err {
                RegistryError::Io(_) => ExitCodes::GENERAL_ERROR,
                _ => ExitCodes::VALIDATION_FAILURE,
            };
        }
        if let Some(err) = cause.downcast_ref::<CoreError>() {
            return if err.is_configuration_error() {
                ExitCodes::VALIDATION_FAILURE
            } else {
                ExitCodes::PROVISIONING_FAILURE
            };
        }
        if let Some(err) = cause.downcast_ref::<TopologyError>() {
            return if err.is_dependency_error() {
                ExitCodes::PROVISIONING_FAILURE
            } else {
                ExitCodes::VALIDATION_FAILURE
            };
        }
        if let Some(err) = cause.downcast_ref::<CloudError>() {
            return if err.is_precondition() {
                ExitCodes::VALIDATION_FAILURE
            } else {
                ExitCodes::PROVISIONING_FAILURE
            };
        }
    }
    ExitCodes::GENERAL_ERROR
}
