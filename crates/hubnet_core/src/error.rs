//! Error types for planning and execution.

use thiserror::Error;

use hubnet_cloud::CloudError;
use hubnet_registry::RegistryError;
use hubnet_topology::TopologyError;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building or executing a plan.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Step '{step}' depends on '{dependency}', which is not ordered before it")]
    OrderViolation { step: String, dependency: String },

    #[error("Dependency cycle between steps: {}", .0.join(", "))]
    CycleDetected(Vec<String>),

    #[error("Duplicate step: {0}")]
    DuplicateStep(String),

    #[error("No handler registered for step kind: {0}")]
    HandlerNotFound(String),

    #[error("Step '{step}' requires output of '{missing}', which was never produced")]
    DependencyNotSatisfied { step: String, missing: String },

    #[error("Step '{step}' is not valid for this handler: {reason}")]
    InvalidStep { step: String, reason: String },

    #[error("Configuration error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// True for errors detected before any provider call.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            CoreError::Registry(_)
            | CoreError::UnknownDependency { .. }
            | CoreError::OrderViolation { .. }
            | CoreError::CycleDetected(_)
            | CoreError::DuplicateStep(_)
            | CoreError::HandlerNotFound(_) => true,
            CoreError::Topology(e) => !e.is_dependency_error(),
            CoreError::Cloud(e) => e.is_precondition(),
            _ => false,
        }
    }
}
