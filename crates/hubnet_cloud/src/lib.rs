//! # hubnet_cloud
//!
//! Provider-facing side of hubnet.
//!
//! All resource creation goes through the [`CloudBackend`] trait, which
//! converges instead of appending: re-applying an existing resource with the
//! same parameters is a no-op and a mismatch is reported as drift. The
//! provisioners here are the per-environment collaborators of the plan
//! executor, plus the [`TopologyApplier`] that turns a resolved topology
//! into peerings, route tables and associations.

pub mod apply;
pub mod backend;
pub mod compute;
pub mod error;
pub mod extension;
pub mod network;
pub mod resource;

pub use apply::{ApplySummary, TopologyApplier};
pub use backend::{CloudBackend, InMemoryCloud};
pub use compute::{ComputeHandle, ComputeProvisioner, VmProvisioner};
pub use error::{CloudError, CloudResult};
pub use extension::{ExtensionConfigurator, TimezoneConfigurator};
pub use network::{NetworkProvisioner, VnetProvisioner};
pub use resource::{ApplyOutcome, ResourceIds, ResourceKind, ResourceRecord};
