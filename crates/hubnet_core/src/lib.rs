//! # hubnet_core
//!
//! Provisioning plan builder and executor for hubnet.
//!
//! # Architecture
//!
//! - **Plan**: steps in six dependency layers, ordered so every step's
//!   inputs are produced by an earlier step
//! - **Handlers**: map each step kind to the cloud collaborator that runs it
//! - **Executor**: runs one layer at a time with the steps of a layer in
//!   parallel, skipping only the dependents of a failed step, and persists
//!   an execution log after every layer
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hubnet_cloud::{InMemoryCloud, ResourceIds};
//! use hubnet_core::{HandlerRegistry, PlanBuilder, PlanExecutor, ProvisioningContext};
//! use hubnet_registry::DeploymentConfig;
//! use hubnet_topology::TopologyPolicy;
//!
//! let config = DeploymentConfig::reference();
//! let policy = TopologyPolicy::reference();
//! let registry = config.registry()?;
//! let plan = PlanBuilder::new(&registry, &policy).build()?;
//!
//! let handlers = HandlerRegistry::standard(
//!     Arc::new(InMemoryCloud::new()),
//!     ResourceIds::new(&config.subscription_id),
//!     config.timezone_map(),
//!     policy,
//! );
//! let context = ProvisioningContext::from_config(workspace_path, &config)?;
//! let log = PlanExecutor::new(Arc::new(handlers)).execute(&plan, context).await?;
//! ```

pub mod context;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod plan;

pub use context::{ProvisioningContext, StepOutput, StepOutputs};
pub use error::{CoreError, CoreResult};
pub use executor::{ExecutionLog, ExecutionState, PlanExecutor, StepRecord, StepStatus};
pub use handlers::{
    ComputeHandler, ExtensionHandler, HandlerRegistry, NetworkHandler, PeeringHandler,
    ResourceGroupHandler, RoutingHandler, StepHandler, TopologyHandler,
};
pub use plan::{order_steps, Layer, PlanBuilder, PlanStep, ProvisioningPlan, StepKind};
