//! Error types for cloud operations.

use thiserror::Error;

use hubnet_registry::RegistryError;

/// Result type alias for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur while applying resources.
#[derive(Error, Debug)]
pub enum CloudError {
    /// Configuration precondition violated before any resource call.
    #[error("Precondition failed: {0}")]
    Precondition(#[from] RegistryError),

    /// An existing resource does not match the desired state.
    #[error("Drift detected on '{id}': expected {expected}, found {actual}")]
    Drift {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Subnet role '{role}' is not provisioned in '{environment}'")]
    MissingSubnet { environment: String, role: String },

    #[error("Provider error on '{resource}': {message}")]
    Provider { resource: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn is_drift(&self) -> bool {
        matches!(self, CloudError::Drift { .. })
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, CloudError::Precondition(_))
    }
}
