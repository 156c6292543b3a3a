//! Background execution of long-running job operations.
//!
//! Execute and rollback run under the job's exclusive lock. The `start_*`
//! variants check the job and take the lock before returning, so callers
//! learn about bad state or contention synchronously, then finish the work
//! on a spawned task.

use std::sync::Arc;

use bizsuite_core::types::DbId;
use tokio::task::JoinHandle;

use crate::error::MigrationResult;
use crate::lock::{HeldLock, JobLock};
use crate::service::{ExecuteSummary, MigrationService, RollbackSummary};

pub struct TaskRunner {
    service: Arc<MigrationService>,
    lock: Arc<dyn JobLock>,
}

impl TaskRunner {
    pub fn new(service: Arc<MigrationService>, lock: Arc<dyn JobLock>) -> Self {
        Self { service, lock }
    }

    pub fn service(&self) -> &Arc<MigrationService> {
        &self.service
    }

    /// Run execute to completion on the current task.
    pub async fn run_execute(
        &self,
        job_id: DbId,
        actor: Option<DbId>,
    ) -> MigrationResult<ExecuteSummary> {
        let guard = self.lock.try_acquire(job_id).await?;
        let result = self.service.execute(job_id, actor).await;
        release(guard).await;
        result
    }

    /// Run rollback to completion on the current task.
    pub async fn run_rollback(
        &self,
        job_id: DbId,
        actor: Option<DbId>,
    ) -> MigrationResult<RollbackSummary> {
        let guard = self.lock.try_acquire(job_id).await?;
        let result = self.service.rollback(job_id, actor).await;
        release(guard).await;
        result
    }

    pub async fn start_execute(
        &self,
        job_id: DbId,
        actor: Option<DbId>,
    ) -> MigrationResult<JoinHandle<MigrationResult<ExecuteSummary>>> {
        self.service.check_executable(job_id).await?;
        let guard = self.lock.try_acquire(job_id).await?;
        let service = Arc::clone(&self.service);

        Ok(tokio::spawn(async move {
            let result = service.execute(job_id, actor).await;
            if let Err(err) = &result {
                tracing::error!(job_id, error = %err, "Background execute failed");
            }
            release(guard).await;
            result
        }))
    }

    pub async fn start_rollback(
        &self,
        job_id: DbId,
        actor: Option<DbId>,
    ) -> MigrationResult<JoinHandle<MigrationResult<RollbackSummary>>> {
        self.service.check_rollbackable(job_id).await?;
        let guard = self.lock.try_acquire(job_id).await?;
        let service = Arc::clone(&self.service);

        Ok(tokio::spawn(async move {
            let result = service.rollback(job_id, actor).await;
            if let Err(err) = &result {
                tracing::error!(job_id, error = %err, "Background rollback failed");
            }
            release(guard).await;
            result
        }))
    }
}

async fn release(guard: Box<dyn HeldLock>) {
    let job_id = guard.job_id();
    if let Err(err) = guard.release().await {
        tracing::warn!(job_id, error = %err, "Failed to release job lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationSettings;
    use crate::error::MigrationError;
    use crate::lock::LocalJobLock;
    use crate::memory::{MemoryJobStore, MemoryTargetStore};
    use crate::service::SaveMappingRequest;
    use assert_matches::assert_matches;
    use bizsuite_core::migration::{EntityType, JobStatus};
    use bizsuite_db::models::migration_job::CreateMigrationJob;
    use bizsuite_events::EventBus;
    use tempfile::TempDir;

    async fn runner_with_mapped_job() -> (TaskRunner, LocalJobLock, DbId, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = MigrationSettings {
            upload_dir: dir.path().to_path_buf(),
            ..MigrationSettings::default()
        };
        let service = Arc::new(MigrationService::new(
            Arc::new(MemoryJobStore::new()),
            Arc::new(MemoryTargetStore::new()),
            Arc::new(EventBus::default()),
            settings,
        ));
        let input = CreateMigrationJob {
            name: "Customers".into(),
            entity_type: EntityType::Customers,
            dedup_strategy: None,
            dedup_fields: None,
            cleaning_rules: None,
        };
        let job = service.create_job(&input, None).await.unwrap();
        service
            .upload_file(job.id, "customers.csv", b"Name\nAcme\nGlobex\n")
            .await
            .unwrap();
        service
            .save_mapping(
                job.id,
                SaveMappingRequest {
                    field_mapping: [("Name".to_string(), "name".to_string())]
                        .into_iter()
                        .collect(),
                    cleaning_rules: None,
                    dedup_strategy: None,
                    dedup_fields: None,
                },
            )
            .await
            .unwrap();

        let lock = LocalJobLock::new();
        let runner = TaskRunner::new(service, Arc::new(lock.clone()));
        (runner, lock, job.id, dir)
    }

    #[tokio::test]
    async fn contention_is_reported_without_touching_the_job() {
        let (runner, lock, job_id, _dir) = runner_with_mapped_job().await;
        let held = lock.try_acquire(job_id).await.unwrap();

        assert_matches!(
            runner.start_execute(job_id, None).await,
            Err(MigrationError::LockContention(id)) if id == job_id
        );
        assert_matches!(
            runner.run_execute(job_id, None).await,
            Err(MigrationError::LockContention(_))
        );
        let job = runner.service().get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Mapped);
        assert_eq!(job.processed_rows, 0);

        held.release().await.unwrap();
        let summary = runner.run_execute(job_id, None).await.unwrap();
        assert_eq!(summary.counters.created, 2);
        assert!(!lock.is_held(job_id));
    }

    #[tokio::test]
    async fn background_execute_then_rollback() {
        let (runner, lock, job_id, _dir) = runner_with_mapped_job().await;

        let handle = runner.start_execute(job_id, Some(3)).await.unwrap();
        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.status, JobStatus::Completed);
        assert!(!lock.is_held(job_id));

        let handle = runner.start_rollback(job_id, Some(3)).await.unwrap();
        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.deleted, 2);
        let job = runner.service().get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::RolledBack);
    }

    #[tokio::test]
    async fn bad_state_is_reported_before_locking() {
        let (runner, lock, job_id, _dir) = runner_with_mapped_job().await;
        assert_matches!(
            runner.start_rollback(job_id, None).await,
            Err(MigrationError::InvalidState(_))
        );
        assert!(!lock.is_held(job_id));
    }
}
