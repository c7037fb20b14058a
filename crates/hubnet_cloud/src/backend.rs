//! Cloud backend trait and an in-memory converging implementation.
//!
//! The in-memory backend stands in for the provider's state store. It
//! converges rather than appends: ensuring a resource that already exists
//! with the same parameters is a no-op, and ensuring one with different
//! parameters is reported as drift instead of being overwritten.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CloudError, CloudResult};
use crate::resource::{ApplyOutcome, ResourceKind, ResourceRecord};

/// Provider abstraction used by every provisioner.
#[async_trait]
pub trait CloudBackend: Send + Sync {
    /// Create the resource if absent; no-op if present and identical.
    async fn ensure(&self, desired: ResourceRecord) -> CloudResult<ApplyOutcome>;

    async fn get(&self, id: &str) -> CloudResult<Option<ResourceRecord>>;

    /// All resources of a kind, ordered by id.
    async fn list(&self, kind: ResourceKind) -> CloudResult<Vec<ResourceRecord>>;
}

/// Serialized form of the backend state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CloudState {
    resources: Vec<ResourceRecord>,
}

/// Thread-safe in-memory backend.
#[derive(Clone, Default)]
pub struct InMemoryCloud {
    resources: Arc<RwLock<BTreeMap<String, ResourceRecord>>>,
    /// Resource names whose `ensure` fails with a provider error.
    failures: Arc<RwLock<BTreeSet<String>>>,
    ensure_calls: Arc<AtomicUsize>,
    created: Arc<AtomicUsize>,
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `ensure` of a resource with this name fail.
    pub fn fail_on(self, name: impl Into<String>) -> Self {
        self.failures.write().insert(name.into());
        self
    }

    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    /// Load state from a JSON file; a missing file yields an empty backend.
    pub fn load_state(path: &Path) -> CloudResult<Self> {
        let cloud = Self::new();
        if !path.exists() {
            debug!("No state file at {:?}, starting empty", path);
            return Ok(cloud);
        }

        let content = fs::read_to_string(path)?;
        let state: CloudState = serde_json::from_str(&content)?;
        {
            let mut resources = cloud.resources.write();
            for record in state.resources {
                resources.insert(record.id.clone(), record);
            }
        }
        info!("Loaded {} resources from {:?}", cloud.resource_count(), path);
        Ok(cloud)
    }

    pub fn save_state(&self, path: &Path) -> CloudResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let state = CloudState {
            resources: self.snapshot(),
        };
        fs::write(path, serde_json::to_string_pretty(&state)?)?;
        debug!("Saved {} resources to {:?}", state.resources.len(), path);
        Ok(())
    }

    /// All resources, ordered by id.
    pub fn snapshot(&self) -> Vec<ResourceRecord> {
        self.resources.read().values().cloned().collect()
    }

    pub fn record(&self, id: &str) -> Option<ResourceRecord> {
        self.resources.read().get(id).cloned()
    }

    /// Replace a stored record out-of-band, e.g. to simulate manual edits.
    pub fn overwrite(&self, record: ResourceRecord) {
        self.resources.write().insert(record.id.clone(), record);
    }

    pub fn resource_count(&self) -> usize {
        self.resources.read().len()
    }

    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.resources.read().values().filter(|r| r.kind == kind).count()
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CloudBackend for InMemoryCloud {
    async fn ensure(&self, desired: ResourceRecord) -> CloudResult<ApplyOutcome> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);

        if self.failures.read().contains(&desired.name) {
            return Err(CloudError::Provider {
                resource: desired.id,
                message: "injected failure".to_string(),
            });
        }

        let mut resources = self.resources.write();
        match resources.get(&desired.id) {
            Some(existing) if existing.matches(&desired) => Ok(ApplyOutcome::Unchanged),
            Some(existing) => Err(CloudError::Drift {
                id: desired.id.clone(),
                expected: desired.properties.to_string(),
                actual: existing.properties.to_string(),
            }),
            None => {
                debug!("Created {} {}", desired.kind, desired.id);
                resources.insert(desired.id.clone(), desired);
                self.created.fetch_add(1, Ordering::SeqCst);
                Ok(ApplyOutcome::Created)
            }
        }
    }

    async fn get(&self, id: &str) -> CloudResult<Option<ResourceRecord>> {
        Ok(self.record(id))
    }

    async fn list(&self, kind: ResourceKind) -> CloudResult<Vec<ResourceRecord>> {
        Ok(self
            .resources
            .read()
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn subnet(cidr: &str) -> ResourceRecord {
        ResourceRecord::new(
            "/vnets/vnet-hub/subnets/snet-a",
            ResourceKind::Subnet,
            "snet-a",
            json!({ "address_prefix": cidr }),
        )
    }

    #[tokio::test]
    async fn test_ensure_converges() {
        let cloud = InMemoryCloud::new();

        assert_eq!(cloud.ensure(subnet("10.0.1.0/24")).await.unwrap(), ApplyOutcome::Created);
        assert_eq!(cloud.ensure(subnet("10.0.1.0/24")).await.unwrap(), ApplyOutcome::Unchanged);
        assert_eq!(cloud.resource_count(), 1);
        assert_eq!(cloud.ensure_calls(), 2);
        assert_eq!(cloud.created_count(), 1);
    }

    #[tokio::test]
    async fn test_mismatch_is_drift() {
        let cloud = InMemoryCloud::new();
        cloud.ensure(subnet("10.0.1.0/24")).await.unwrap();

        let err = cloud.ensure(subnet("10.0.9.0/24")).await.unwrap_err();
        assert!(err.is_drift());
        assert!(err.to_string().contains("snet-a"));
        assert_eq!(
            cloud.record("/vnets/vnet-hub/subnets/snet-a").unwrap().properties["address_prefix"],
            "10.0.1.0/24"
        );
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let cloud = InMemoryCloud::new().fail_on("snet-a");
        let err = cloud.ensure(subnet("10.0.1.0/24")).await.unwrap_err();
        assert!(matches!(err, CloudError::Provider { .. }));
        assert_eq!(cloud.resource_count(), 0);

        cloud.clear_failures();
        assert!(cloud.ensure(subnet("10.0.1.0/24")).await.unwrap().is_created());
    }

    #[tokio::test]
    async fn test_state_round_trips_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("cloud.json");

        let cloud = InMemoryCloud::new();
        cloud.ensure(subnet("10.0.1.0/24")).await.unwrap();
        cloud.save_state(&path).unwrap();

        let reloaded = InMemoryCloud::load_state(&path).unwrap();
        assert_eq!(reloaded.snapshot(), cloud.snapshot());
        assert_eq!(reloaded.ensure(subnet("10.0.1.0/24")).await.unwrap(), ApplyOutcome::Unchanged);
        assert_eq!(reloaded.list(ResourceKind::Subnet).await.unwrap().len(), 1);
    }

    #[test]
    fn test_missing_state_file_starts_empty() {
        let dir = tempdir().unwrap();
        let cloud = InMemoryCloud::load_state(&dir.path().join("absent.json")).unwrap();
        assert_eq!(cloud.resource_count(), 0);
    }
}
