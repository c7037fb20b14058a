//! Plan command - Print the layered provisioning plan.

use anyhow::Result;
use clap::Args;

use hubnet_core::{PlanBuilder, ProvisioningPlan};
use hubnet_topology::TopologyPolicy;

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: PlanArgs) -> Result<()> {
    let config = args.config.load()?;
    let registry = config.registry()?;
    let plan = PlanBuilder::new(&registry, &TopologyPolicy::reference())
        .with_id(&config.name)
        .build()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", render(&plan));
    }
    Ok(())
}

fn render(plan: &ProvisioningPlan) -> String {
    let mut out = format!("Plan '{}' ({} steps)\n", plan.id, plan.len());
    for (layer, steps) in plan.layers() {
        out.push_str(&format!("\nLayer {} - {}\n", layer.number(), layer));
        for step in steps {
            if step.depends_on.is_empty() {
                out.push_str(&format!("   {}\n", step.id));
            } else {
                out.push_str(&format!("   {}  <- {}\n", step.id, step.depends_on.join(", ")));
            }
        }
    }
    out
}
