//! Whole-document replace with restart verification and rollback.
//!
//! # Responsibilities
//! - Optionally back up, then write a client-supplied configuration
//! - Run the restart/verify sequence as an observable background job
//! - Restore the backup and restart again when the service does not come up
//!
//! # Design Decisions
//! - Not gated by the external validator; the restart check is the gate
//! - Job failures never reach the client that submitted the change; they
//!   are logged and recorded on the job
//! - Delays are read per submission so settings reloads apply to new jobs
//! - Past [`DEFAULT_JOB_LIMIT`] records the oldest finished jobs are
//!   evicted; running jobs are never evicted

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::RollbackConfig;
use crate::document::{ConfigStore, Document, StoreError};
use crate::observability::metrics;
use crate::service::{ServiceAction, ServiceControl};

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceRequest {
    pub config: Value,
    #[serde(default)]
    pub backup: bool,
    #[serde(default)]
    pub auto_restart: bool,
    #[serde(default)]
    pub enable_rollback: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplaceOutcome {
    pub backup_path: Option<PathBuf>,
    pub needs_restart: bool,
    pub restarting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Submitted,
    Restarting,
    Verifying,
    /// Service came up after the restart.
    Stable,
    /// Service is down and no rollback was possible.
    Unhealthy,
    RolledBack,
    /// Restart failed and no rollback was possible.
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Stable | JobState::Unhealthy | JobState::RolledBack | JobState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitted => "submitted",
            JobState::Restarting => "restarting",
            JobState::Verifying => "verifying",
            JobState::Stable => "stable",
            JobState::Unhealthy => "unhealthy",
            JobState::RolledBack => "rolled_back",
            JobState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub state: JobState,
    pub backup: Option<PathBuf>,
    pub enable_rollback: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartTiming {
    pub flush_delay: Duration,
    pub verify_delay: Duration,
}

impl Default for RestartTiming {
    fn default() -> Self {
        Self::from(&RollbackConfig::default())
    }
}

impl From<&RollbackConfig> for RestartTiming {
    fn from(config: &RollbackConfig) -> Self {
        Self {
            flush_delay: Duration::from_secs(config.flush_delay_secs),
            verify_delay: Duration::from_secs(config.verify_delay_secs),
        }
    }
}

/// Job records retained for status queries.
pub const DEFAULT_JOB_LIMIT: usize = 64;

#[derive(Clone)]
pub struct RollbackCoordinator {
    store: ConfigStore,
    services: Arc<dyn ServiceControl>,
    service_name: Arc<str>,
    jobs: Arc<DashMap<Uuid, JobRecord>>,
    job_limit: usize,
}

impl RollbackCoordinator {
    pub fn new(store: ConfigStore, services: Arc<dyn ServiceControl>, service_name: &str) -> Self {
        Self {
            store,
            services,
            service_name: Arc::from(service_name),
            jobs: Arc::new(DashMap::new()),
            job_limit: DEFAULT_JOB_LIMIT,
        }
    }

    pub fn with_job_limit(mut self, limit: usize) -> Self {
        self.job_limit = limit;
        self
    }

    pub fn job(&self, id: &Uuid) -> Option<JobRecord> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    /// Write `request.config` and, when asked, start the restart job.
    pub fn replace(&self, request: ReplaceRequest, timing: RestartTiming) -> Result<ReplaceOutcome, StoreError> {
        let document = Document::from_value(request.config)?;

        let wants_backup = request.backup || request.enable_rollback;
        let backup_path = if wants_backup && self.store.path().exists() {
            Some(self.store.backup()?)
        } else {
            None
        };

        self.store.write(&document)?;

        let job_id = if request.auto_restart {
            let id = self.submit(backup_path.clone(), request.enable_rollback);
            let coordinator = self.clone();
            tokio::spawn(async move {
                coordinator.run_job(id, timing).await;
            });
            Some(id)
        } else {
            None
        };

        tracing::info!(
            backup = ?backup_path,
            auto_restart = request.auto_restart,
            enable_rollback = request.enable_rollback,
            job = ?job_id,
            "Configuration replaced"
        );

        Ok(ReplaceOutcome {
            backup_path,
            needs_restart: true,
            restarting: request.auto_restart,
            job_id,
        })
    }

    fn submit(&self, backup: Option<PathBuf>, enable_rollback: bool) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.jobs.insert(
            id,
            JobRecord {
                id,
                state: JobState::Submitted,
                backup,
                enable_rollback,
                created_at: now,
                updated_at: now,
                errors: Vec::new(),
            },
        );
        self.prune();
        id
    }

    /// Evict the oldest finished jobs while over the limit.
    fn prune(&self) {
        let excess = self.jobs.len().saturating_sub(self.job_limit);
        if excess == 0 {
            return;
        }

        let mut finished: Vec<(DateTime<Utc>, Uuid)> = self
            .jobs
            .iter()
            .filter(|entry| entry.state.is_terminal())
            .map(|entry| (entry.updated_at, entry.id))
            .collect();
        finished.sort();

        for (_, id) in finished.into_iter().take(excess) {
            self.jobs.remove(&id);
            tracing::debug!(job = %id, "Evicted finished restart job");
        }
    }

    fn transition(&self, id: Uuid, state: JobState) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.state = state;
            job.updated_at = Utc::now();
        }
        tracing::info!(job = %id, state = state.as_str(), "Restart job transition");
        if state.is_terminal() {
            metrics::record_rollback_job(state.as_str());
        }
    }

    fn note_error(&self, id: Uuid, error: String) {
        tracing::error!(job = %id, error = %error, "Restart job error");
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.errors.push(error);
        }
    }

    /// Drive one job to a terminal state.
    pub async fn run_job(&self, id: Uuid, timing: RestartTiming) {
        let Some((backup, enable_rollback)) = self
            .jobs
            .get(&id)
            .map(|job| (job.backup.clone(), job.enable_rollback))
        else {
            return;
        };
        let can_roll_back = enable_rollback && backup.is_some();

        tokio::time::sleep(timing.flush_delay).await;
        self.transition(id, JobState::Restarting);

        if let Err(e) = self.restart().await {
            self.note_error(id, format!("restart failed: {}", e));
            let terminal = if can_roll_back && self.roll_back(id, backup.as_ref()).await {
                JobState::RolledBack
            } else {
                JobState::Failed
            };
            self.transition(id, terminal);
            return;
        }

        tokio::time::sleep(timing.verify_delay).await;
        self.transition(id, JobState::Verifying);

        let running = match self.services.status(&self.service_name).await {
            Ok(info) => info.is_running(),
            Err(e) => {
                self.note_error(id, format!("status query failed: {}", e));
                false
            }
        };

        let terminal = if running {
            JobState::Stable
        } else if can_roll_back && self.roll_back(id, backup.as_ref()).await {
            JobState::RolledBack
        } else {
            JobState::Unhealthy
        };
        self.transition(id, terminal);
    }

    async fn restart(&self) -> Result<(), crate::service::ServiceError> {
        self.services
            .control(&self.service_name, ServiceAction::Restart)
            .await
    }

    /// Restore the backup and restart once more. Errors are recorded, never
    /// propagated.
    async fn roll_back(&self, id: Uuid, backup: Option<&PathBuf>) -> bool {
        let Some(backup) = backup else {
            return false;
        };
        match self.store.restore(backup) {
            Ok(true) => {}
            Ok(false) => {
                self.note_error(id, format!("backup {} missing or empty", backup.display()));
                return false;
            }
            Err(e) => {
                self.note_error(id, format!("restore failed: {}", e));
                return false;
            }
        }
        if let Err(e) = self.restart().await {
            self.note_error(id, format!("restart after rollback failed: {}", e));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ServiceError, ServiceInfo, ServiceStatus};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records control calls and reports a fixed status.
    struct FakeServices {
        status: ServiceStatus,
        fail_restart: bool,
        calls: Mutex<Vec<ServiceAction>>,
    }

    impl FakeServices {
        fn new(status: ServiceStatus, fail_restart: bool) -> Arc<Self> {
            Arc::new(Self {
                status,
                fail_restart,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ServiceControl for FakeServices {
        async fn control(&self, service: &str, action: ServiceAction) -> Result<(), ServiceError> {
            self.calls.lock().unwrap().push(action);
            if self.fail_restart {
                return Err(ServiceError::Command {
                    service: service.to_string(),
                    action,
                    output: "Job failed".into(),
                });
            }
            Ok(())
        }

        async fn status(&self, service: &str) -> Result<ServiceInfo, ServiceError> {
            Ok(ServiceInfo::new(service, self.status))
        }
    }

    const NO_DELAY: RestartTiming = RestartTiming {
        flush_delay: Duration::ZERO,
        verify_delay: Duration::ZERO,
    };

    fn setup(services: Arc<FakeServices>) -> (tempfile::TempDir, RollbackCoordinator) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"log":{"level":"info"}}"#).unwrap();
        let coordinator = RollbackCoordinator::new(ConfigStore::new(path), services, "sing-box");
        (dir, coordinator)
    }

    fn request(auto_restart: bool, enable_rollback: bool) -> ReplaceRequest {
        ReplaceRequest {
            config: json!({"log": {"level": "debug"}}),
            backup: false,
            auto_restart,
            enable_rollback,
        }
    }

    fn on_disk(coordinator: &RollbackCoordinator) -> Value {
        coordinator.store.read_loose().unwrap()
    }

    #[tokio::test]
    async fn test_replace_without_restart() {
        let services = FakeServices::new(ServiceStatus::Running, false);
        let (_dir, coordinator) = setup(services.clone());

        let outcome = coordinator.replace(request(false, false), NO_DELAY).unwrap();
        assert!(outcome.needs_restart);
        assert!(!outcome.restarting);
        assert_eq!(outcome.backup_path, None);
        assert_eq!(outcome.job_id, None);
        assert_eq!(on_disk(&coordinator)["log"]["level"], "debug");
        assert!(services.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_non_object_config() {
        let (_dir, coordinator) = setup(FakeServices::new(ServiceStatus::Running, false));
        let mut req = request(false, false);
        req.config = json!([1]);
        assert!(matches!(coordinator.replace(req, NO_DELAY), Err(StoreError::Document(_))));
        assert_eq!(on_disk(&coordinator)["log"]["level"], "info");
    }

    #[tokio::test]
    async fn test_old_finished_jobs_are_evicted() {
        let (_dir, coordinator) = setup(FakeServices::new(ServiceStatus::Running, false));
        let coordinator = coordinator.with_job_limit(3);

        let running_a = coordinator.submit(None, false);
        let running_b = coordinator.submit(None, false);
        let first = coordinator.submit(None, false);
        coordinator.transition(first, JobState::Stable);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let second = coordinator.submit(None, false);
        assert!(coordinator.job(&first).is_none());
        coordinator.transition(second, JobState::Failed);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let third = coordinator.submit(None, false);
        assert!(coordinator.job(&second).is_none());

        for id in [running_a, running_b, third] {
            assert!(coordinator.job(&id).is_some());
        }
        assert_eq!(coordinator.jobs.len(), 3);
    }

    #[tokio::test]
    async fn test_running_jobs_are_never_evicted() {
        let (_dir, coordinator) = setup(FakeServices::new(ServiceStatus::Running, false));
        let coordinator = coordinator.with_job_limit(2);

        let ids: Vec<Uuid> = (0..4).map(|_| coordinator.submit(None, false)).collect();

        assert_eq!(coordinator.jobs.len(), 4);
        assert!(ids.iter().all(|id| coordinator.job(id).is_some()));
    }

    #[tokio::test]
    async fn test_stable_job() {
        let services = FakeServices::new(ServiceStatus::Running, false);
        let (_dir, coordinator) = setup(services.clone());
        let id = coordinator.submit(None, false);

        coordinator.run_job(id, NO_DELAY).await;

        assert_eq!(coordinator.job(&id).unwrap().state, JobState::Stable);
        assert_eq!(*services.calls.lock().unwrap(), [ServiceAction::Restart]);
    }

    #[tokio::test]
    async fn test_unhealthy_service_rolls_back() {
        let services = FakeServices::new(ServiceStatus::Failed, false);
        let (_dir, coordinator) = setup(services.clone());
        let backup = coordinator.store.backup().unwrap();
        coordinator
            .store
            .write_value(&json!({"log": {"level": "broken"}}))
            .unwrap();
        let id = coordinator.submit(Some(backup), true);

        coordinator.run_job(id, NO_DELAY).await;

        assert_eq!(coordinator.job(&id).unwrap().state, JobState::RolledBack);
        assert_eq!(on_disk(&coordinator)["log"]["level"], "info");
        assert_eq!(
            *services.calls.lock().unwrap(),
            [ServiceAction::Restart, ServiceAction::Restart]
        );
    }

    #[tokio::test]
    async fn test_unhealthy_without_backup_has_no_safety_net() {
        let services = FakeServices::new(ServiceStatus::Stopped, false);
        let (_dir, coordinator) = setup(services);
        let id = coordinator.submit(None, true);

        coordinator.run_job(id, NO_DELAY).await;

        assert_eq!(coordinator.job(&id).unwrap().state, JobState::Unhealthy);
    }

    #[tokio::test]
    async fn test_restart_failure_is_recorded() {
        let services = FakeServices::new(ServiceStatus::Running, true);
        let (_dir, coordinator) = setup(services);
        let id = coordinator.submit(None, false);

        coordinator.run_job(id, NO_DELAY).await;

        let job = coordinator.job(&id).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.errors.len(), 1);
        assert!(job.errors[0].starts_with("restart failed"));
    }

    #[tokio::test]
    async fn test_replace_with_rollback_takes_backup_and_spawns_job() {
        let services = FakeServices::new(ServiceStatus::Running, false);
        let (_dir, coordinator) = setup(services);

        let outcome = coordinator.replace(request(true, true), NO_DELAY).unwrap();
        let backup = outcome.backup_path.clone().unwrap();
        assert_eq!(
            std::fs::read_to_string(backup).unwrap(),
            r#"{"log":{"level":"info"}}"#
        );

        let id = outcome.job_id.unwrap();
        for _ in 0..100 {
            if coordinator.job(&id).map(|j| j.state.is_terminal()).unwrap_or(false) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(coordinator.job(&id).unwrap().state, JobState::Stable);
    }
}
