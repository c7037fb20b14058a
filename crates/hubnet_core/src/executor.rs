//! Layered plan executor with partial-apply semantics and a persisted log.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use hubnet_registry::RegistryValidator;

use crate::context::{ProvisioningContext, StepOutputs};
use crate::error::{CoreError, CoreResult};
use crate::handlers::HandlerRegistry;
use crate::plan::{Layer, ProvisioningPlan};

/// Overall execution state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    Pending,
    Running,
    Completed,
    /// At least one step failed or was skipped.
    Failed,
    Cancelled,
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Succeeded,
    Failed { error: String },
    /// Not run because a dependency did not succeed.
    Skipped { blocked_by: Vec<String> },
    Cancelled,
}

impl StepStatus {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, StepStatus::Succeeded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    pub layer: Layer,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Persistent execution log, rewritten after every layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub execution_id: Uuid,
    pub plan_id: String,
    pub state: ExecutionState,
    pub steps: Vec<StepRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Snapshot of all step outputs.
    pub outputs: StepOutputs,
    pub workspace_path: PathBuf,
}

impl ExecutionLog {
    pub fn new(plan: &ProvisioningPlan, ctx: &ProvisioningContext) -> Self {
        Self {
            execution_id: ctx.execution_id,
            plan_id: plan.id.clone(),
            state: ExecutionState::Pending,
            steps: plan
                .steps
                .iter()
                .map(|s| StepRecord {
                    step_id: s.id.clone(),
                    layer: s.layer,
                    status: StepStatus::Pending,
                    started_at: None,
                    completed_at: None,
                })
                .collect(),
            started_at: None,
            completed_at: None,
            error: None,
            outputs: StepOutputs::default(),
            workspace_path: ctx.workspace_path.clone(),
        }
    }

    pub fn logs_dir(workspace_path: &Path) -> PathBuf {
        workspace_path.join(".hubnet").join("logs")
    }

    pub fn log_path(&self) -> PathBuf {
        Self::logs_dir(&self.workspace_path).join(format!("{}.json", self.plan_id))
    }

    pub fn save(&self) -> CoreResult<()> {
        let path = self.log_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        fs::write(&path, json)?;
        debug!("Saved execution log to {:?}", path);
        Ok(())
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn record(&self, step_id: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|r| r.step_id == step_id)
    }

    fn record_mut(&mut self, step_id: &str) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|r| r.step_id == step_id)
    }

    pub fn status(&self, step_id: &str) -> Option<&StepStatus> {
        self.record(step_id).map(|r| &r.status)
    }

    pub fn failed_steps(&self) -> Vec<&str> {
        self.steps_where(|s| matches!(s, StepStatus::Failed { .. }))
    }

    pub fn skipped_steps(&self) -> Vec<&str> {
        self.steps_where(|s| matches!(s, StepStatus::Skipped { .. }))
    }

    pub fn succeeded_steps(&self) -> Vec<&str> {
        self.steps_where(StepStatus::is_succeeded)
    }

    fn steps_where(&self, predicate: impl Fn(&StepStatus) -> bool) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|r| predicate(&r.status))
            .map(|r| r.step_id.as_str())
            .collect()
    }
}

/// Executes a plan layer by layer.
///
/// Steps within a layer run concurrently and the layer joins before the
/// next one starts. A failed step only blocks its own dependents.
pub struct PlanExecutor {
    handlers: Arc<HandlerRegistry>,
    cancel: Arc<AtomicBool>,
}

impl PlanExecutor {
    pub fn new(handlers: Arc<HandlerRegistry>) -> Self {
        Self {
            handlers,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between layers; setting it cancels the remaining layers.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Configuration problems abort before any provider call and are
    /// returned as errors. Once execution starts the outcome is reported
    /// through the returned log's state.
    pub async fn execute(
        &self,
        plan: &ProvisioningPlan,
        mut context: ProvisioningContext,
    ) -> CoreResult<ExecutionLog> {
        self.preflight(plan, &context)?;

        let mut log = ExecutionLog::new(plan, &context);
        log.state = ExecutionState::Running;
        log.started_at = Some(Utc::now());
        log.save()?;

        info!("Executing plan '{}' ({} steps)", plan.id, plan.len());
        let mut statuses: HashMap<String, StepStatus> = HashMap::new();

        for (layer, steps) in plan.layers() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!("Cancelled before layer {} ({})", layer.number(), layer);
                for record in log.steps.iter_mut().filter(|r| r.status == StepStatus::Pending) {
                    record.status = StepStatus::Cancelled;
                }
                log.state = ExecutionState::Cancelled;
                log.completed_at = Some(Utc::now());
                log.save()?;
                return Ok(log);
            }

            info!("Layer {} ({}): {} steps", layer.number(), layer, steps.len());

            let mut runnable = Vec::new();
            for step in steps {
                let blocked_by: Vec<String> = step
                    .depends_on
                    .iter()
                    .filter(|dep| {
                        !statuses
                            .get(*dep)
                            .map(StepStatus::is_succeeded)
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect();
                if blocked_by.is_empty() {
                    runnable.push(step);
                } else {
                    warn!("Skipping {}: blocked by {}", step.id, blocked_by.join(", "));
                    let status = StepStatus::Skipped { blocked_by };
                    if let Some(record) = log.record_mut(&step.id) {
                        record.status = status.clone();
                    }
                    statuses.insert(step.id.clone(), status);
                }
            }

            let ctx = &context;
            let results = join_all(runnable.iter().map(|step| async move {
                let started = Utc::now();
                let result = match self.handlers.get_required(step.kind) {
                    Ok(handler) => handler.run(step, ctx).await,
                    Err(e) => Err(e),
                };
                (*step, started, result, Utc::now())
            }))
            .await;

            for (step, started, result, completed) in results {
                let status = match result {
                    Ok(output) => {
                        debug!("Step {} succeeded", step.id);
                        context.outputs.merge(output);
                        StepStatus::Succeeded
                    }
                    Err(e) => {
                        error!("Step {} failed: {}", step.id, e);
                        StepStatus::Failed { error: e.to_string() }
                    }
                };
                if let Some(record) = log.record_mut(&step.id) {
                    record.status = status.clone();
                    record.started_at = Some(started);
                    record.completed_at = Some(completed);
                }
                statuses.insert(step.id.clone(), status);
            }

            log.outputs = context.outputs.clone();
            log.save()?;
        }

        let failed = log.failed_steps().len();
        let skipped = log.skipped_steps().len();
        if failed + skipped == 0 {
            log.state = ExecutionState::Completed;
            info!("Plan '{}' completed", plan.id);
        } else {
            log.state = ExecutionState::Failed;
            let message = format!(
                "{} steps failed ({}), {} skipped",
                failed,
                log.failed_steps().join(", "),
                skipped
            );
            error!("Plan '{}': {}", plan.id, message);
            log.error = Some(message);
        }
        log.completed_at = Some(Utc::now());
        log.save()?;
        Ok(log)
    }

    fn preflight(&self, plan: &ProvisioningPlan, context: &ProvisioningContext) -> CoreResult<()> {
        plan.validate()?;
        RegistryValidator::check(&context.registry, &context.timezones)?;
        let mut checked = HashSet::new();
        for step in plan.steps.iter().filter(|s| checked.insert(s.kind)) {
            self.handlers.get_required(step.kind)?.preflight()?;
        }
        Ok(())
    }

    /// Load the log of the last execution of a plan, if any.
    pub fn find_latest_log(
        &self,
        workspace_path: &Path,
        plan_id: &str,
    ) -> CoreResult<Option<ExecutionLog>> {
        let path = ExecutionLog::logs_dir(workspace_path).join(format!("{}.json", plan_id));
        if path.exists() {
            Ok(Some(ExecutionLog::load(&path)?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StepOutput;
    use crate::handlers::StepHandler;
    use crate::plan::{PlanStep, StepKind};
    use async_trait::async_trait;
    use hubnet_registry::DeploymentConfig;
    use tempfile::TempDir;

    /// Succeeds for every step, except those listed in `fail`.
    struct StubHandler {
        kind: StepKind,
        fail: Vec<String>,
        cancel: Option<Arc<AtomicBool>>,
    }

    #[async_trait]
    impl StepHandler for StubHandler {
        fn kind(&self) -> StepKind {
            self.kind
        }

        async fn run(&self, step: &PlanStep, _ctx: &ProvisioningContext) -> CoreResult<StepOutput> {
            if let Some(cancel) = &self.cancel {
                cancel.store(true, Ordering::SeqCst);
            }
            if self.fail.contains(&step.id) {
                return Err(CoreError::InvalidStep {
                    step: step.id.clone(),
                    reason: "stub failure".to_string(),
                });
            }
            Ok(StepOutput::Applied(Default::default()))
        }
    }

    fn stub_plan() -> ProvisioningPlan {
        let a = PlanStep::scoped(StepKind::Network, &"a".into());
        let b = PlanStep::scoped(StepKind::Network, &"b".into());
        let ca = PlanStep::scoped(StepKind::Compute, &"a".into()).after("network:a");
        let cb = PlanStep::scoped(StepKind::Compute, &"b".into()).after("network:b");
        ProvisioningPlan {
            id: "stub".to_string(),
            steps: vec![a, b, ca, cb],
        }
    }

    fn stubs(fail: &[&str], cancel: Option<Arc<AtomicBool>>) -> HandlerRegistry {
        let fail: Vec<String> = fail.iter().map(|s| s.to_string()).collect();
        HandlerRegistry::new()
            .with(Arc::new(StubHandler {
                kind: StepKind::Network,
                fail: fail.clone(),
                cancel,
            }))
            .with(Arc::new(StubHandler {
                kind: StepKind::Compute,
                fail,
                cancel: None,
            }))
    }

    fn context(dir: &TempDir) -> ProvisioningContext {
        ProvisioningContext::from_config(dir.path().to_path_buf(), &DeploymentConfig::reference())
            .unwrap()
    }

    #[tokio::test]
    async fn test_failure_blocks_only_dependents() {
        let dir = TempDir::new().unwrap();
        let executor = PlanExecutor::new(Arc::new(stubs(&["network:b"], None)));

        let log = executor.execute(&stub_plan(), context(&dir)).await.unwrap();

        assert_eq!(log.state, ExecutionState::Failed);
        assert_eq!(log.failed_steps(), vec!["network:b"]);
        assert_eq!(log.succeeded_steps(), vec!["network:a", "compute:a"]);
        assert_eq!(
            log.status("compute:b"),
            Some(&StepStatus::Skipped {
                blocked_by: vec!["network:b".to_string()]
            })
        );
    }

    #[tokio::test]
    async fn test_cancellation_between_layers() {
        let dir = TempDir::new().unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let executor = PlanExecutor::new(Arc::new(stubs(&[], Some(flag.clone()))));
        let executor = PlanExecutor {
            cancel: flag,
            ..executor
        };

        let log = executor.execute(&stub_plan(), context(&dir)).await.unwrap();

        assert_eq!(log.state, ExecutionState::Cancelled);
        assert_eq!(log.succeeded_steps(), vec!["network:a", "network:b"]);
        assert_eq!(log.status("compute:a"), Some(&StepStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_flag_set_before_start_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let executor = PlanExecutor::new(Arc::new(stubs(&[], None)));
        executor.cancellation_flag().store(true, Ordering::SeqCst);

        let log = executor.execute(&stub_plan(), context(&dir)).await.unwrap();

        assert_eq!(log.state, ExecutionState::Cancelled);
        assert!(log.succeeded_steps().is_empty());
        assert!(log.steps.iter().all(|r| r.status == StepStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_missing_handler_fails_preflight() {
        let dir = TempDir::new().unwrap();
        let executor = PlanExecutor::new(Arc::new(HandlerRegistry::new()));

        let err = executor.execute(&stub_plan(), context(&dir)).await.unwrap_err();
        assert!(matches!(err, CoreError::HandlerNotFound(_)));
        assert!(!ExecutionLog::logs_dir(dir.path()).join("stub.json").exists());
    }

    #[tokio::test]
    async fn test_same_layer_dependency_fails_preflight() {
        let dir = TempDir::new().unwrap();
        let a = PlanStep::scoped(StepKind::Network, &"a".into());
        let b = PlanStep::scoped(StepKind::Network, &"b".into()).after("network:a");
        let plan = ProvisioningPlan {
            id: "same-layer".to_string(),
            steps: vec![a, b],
        };

        let err = PlanExecutor::new(Arc::new(stubs(&[], None)))
            .execute(&plan, context(&dir))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::OrderViolation { .. }));
        assert!(!ExecutionLog::logs_dir(dir.path()).join("same-layer.json").exists());
    }

    #[tokio::test]
    async fn test_log_persisted_and_reloadable() {
        let dir = TempDir::new().unwrap();
        let executor = PlanExecutor::new(Arc::new(stubs(&[], None)));

        let log = executor.execute(&stub_plan(), context(&dir)).await.unwrap();
        assert_eq!(log.state, ExecutionState::Completed);

        let loaded = executor.find_latest_log(dir.path(), "stub").unwrap().unwrap();
        assert_eq!(loaded.execution_id, log.execution_id);
        assert_eq!(loaded.state, ExecutionState::Completed);
        assert!(loaded.steps.iter().all(|r| r.completed_at.is_some()));
    }
}
