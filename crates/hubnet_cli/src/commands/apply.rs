//! Apply command - Execute the provisioning plan.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use hubnet_cloud::{InMemoryCloud, ResourceIds};
use hubnet_core::{
    ExecutionLog, ExecutionState, HandlerRegistry, PlanBuilder, PlanExecutor, ProvisioningContext,
};
use hubnet_registry::DeploymentConfig;
use hubnet_topology::TopologyPolicy;

use super::{CommandError, ConfigArgs};

#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Cloud state file, loaded before and saved after execution
    #[arg(short, long, env = "HUBNET_STATE")]
    pub state: Option<PathBuf>,

    /// Workspace directory for execution logs
    #[arg(short, long, default_value = ".")]
    pub workspace: PathBuf,
}

pub async fn execute(args: ApplyArgs) -> Result<()> {
    let config = args.config.load()?;
    let state = args
        .state
        .clone()
        .unwrap_or_else(|| args.workspace.join(".hubnet").join("state.json"));

    let log = run(&config, &state, &args.workspace).await?;

    println!(
        "Plan '{}': {} created, {} unchanged",
        log.plan_id, log.outputs.applied.created, log.outputs.applied.unchanged
    );
    for step in &log.steps {
        println!("   {:<28} {:?}", step.step_id, step.status);
    }
    println!("Execution log: {}", log.log_path().display());

    match log.state {
        ExecutionState::Completed => Ok(()),
        _ => Err(CommandError::ProvisioningFailed {
            plan: log.plan_id.clone(),
            message: log
                .error
                .clone()
                .unwrap_or_else(|| format!("execution ended as {:?}", log.state)),
        }
        .into()),
    }
}

/// Execute the plan against the state file's backend and persist the
/// backend afterwards, whatever the outcome.
pub async fn run(
    config: &DeploymentConfig,
    state: &Path,
    workspace: &Path,
) -> Result<ExecutionLog> {
    let policy = TopologyPolicy::reference();
    let registry = config.registry()?;
    let plan = PlanBuilder::new(&registry, &policy).with_id(&config.name).build()?;

    let cloud = InMemoryCloud::load_state(state)
        .with_context(|| format!("Failed to load cloud state from {}", state.display()))?;

    let handlers = HandlerRegistry::standard(
        Arc::new(cloud.clone()),
        ResourceIds::new(&config.subscription_id),
        config.timezone_map(),
        policy,
    );
    let context = ProvisioningContext::from_config(workspace.to_path_buf(), config)?;
    let executor = PlanExecutor::new(Arc::new(handlers));

    let cancel = executor.cancellation_flag();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling after the current layer");
            cancel.store(true, Ordering::SeqCst);
        }
    });
    let result = executor.execute(&plan, context).await;
    interrupt.abort();
    let log = result?;

    info!("Saving {} resources to {}", cloud.resource_count(), state.display());
    cloud
        .save_state(state)
        .with_context(|| format!("Failed to save cloud state to {}", state.display()))?;
    Ok(log)
}
