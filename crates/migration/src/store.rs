//! Persistence seams of the migration service.
//!
//! [`JobStore`] owns the bookkeeping tables (jobs, records, rollback logs);
//! [`TargetStore`] reads and writes the business-entity tables that jobs
//! import into. Both return `sqlx::Error` so the PostgreSQL implementations
//! pass errors straight through.

use std::collections::HashSet;

use async_trait::async_trait;
use bizsuite_core::hierarchy::HierarchyTable;
use bizsuite_core::migration::registry::EntityConfig;
use bizsuite_core::migration::validator::ValidationResult;
use bizsuite_core::migration::JobStatus;
use bizsuite_core::types::{DbId, Row};
use bizsuite_db::models::migration_job::{CreateMigrationJob, JobCounters, JobFilter, MigrationJob};
use bizsuite_db::models::migration_record::{MigrationRecord, NewMigrationRecord, RecordFilter};
use bizsuite_db::models::rollback_log::{MigrationRollbackLog, NewRollbackLog};

pub type StoreResult<T> = Result<T, sqlx::Error>;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(
        &self,
        input: &CreateMigrationJob,
        created_by: Option<DbId>,
    ) -> StoreResult<MigrationJob>;

    async fn find_job(&self, id: DbId) -> StoreResult<Option<MigrationJob>>;

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<MigrationJob>>;

    /// Persist the mutable columns of a job. Counters are not written.
    async fn save_job(&self, job: &MigrationJob) -> StoreResult<Option<MigrationJob>>;

    async fn reset_counters(&self, id: DbId) -> StoreResult<()>;

    /// Move a job to `to` only while it is still in `from`. Returns `None`
    /// when the job is gone or its status has moved on.
    async fn swap_status(
        &self,
        id: DbId,
        from: JobStatus,
        to: JobStatus,
    ) -> StoreResult<Option<MigrationJob>>;

    /// Persist a validation result without touching any other column.
    async fn save_validation_result(
        &self,
        id: DbId,
        result: &ValidationResult,
    ) -> StoreResult<Option<MigrationJob>>;

    async fn delete_job(&self, id: DbId) -> StoreResult<bool>;

    /// Insert a batch of records and add `delta` to the job counters,
    /// atomically. Returns the job with updated counters.
    async fn commit_batch(
        &self,
        job_id: DbId,
        records: &[NewMigrationRecord],
        delta: &JobCounters,
    ) -> StoreResult<MigrationJob>;

    async fn list_records(
        &self,
        job_id: DbId,
        filter: &RecordFilter,
    ) -> StoreResult<Vec<MigrationRecord>>;

    /// Records still eligible for rollback, highest row number first.
    async fn rollback_candidates(&self, job_id: DbId) -> StoreResult<Vec<MigrationRecord>>;

    /// Append a rollback log entry and clear the record's `can_rollback`,
    /// atomically.
    async fn record_rollback(&self, entry: &NewRollbackLog) -> StoreResult<MigrationRollbackLog>;

    async fn list_rollback_logs(&self, job_id: DbId) -> StoreResult<Vec<MigrationRollbackLog>>;
}

#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Which of `values` exist in `field`, lowercased.
    async fn existing_values(
        &self,
        config: &EntityConfig,
        field: &str,
        values: &[String],
    ) -> StoreResult<HashSet<String>>;

    async fn count_rows(&self, config: &EntityConfig) -> StoreResult<i64>;

    /// First row matching every criterion case-insensitively.
    async fn find_by_fields(
        &self,
        config: &EntityConfig,
        criteria: &Row,
    ) -> StoreResult<Option<(DbId, Row)>>;

    /// Resolve a raw foreign-key value through `lookup_fields`, then as an id.
    async fn resolve_reference(
        &self,
        config: &EntityConfig,
        lookup_fields: &[&str],
        raw: &str,
    ) -> StoreResult<Option<DbId>>;

    async fn insert(&self, config: &EntityConfig, data: &Row) -> StoreResult<DbId>;

    async fn update(&self, config: &EntityConfig, id: DbId, data: &Row) -> StoreResult<bool>;

    async fn delete(&self, config: &EntityConfig, id: DbId) -> StoreResult<bool>;

    /// Whether `parent_id` may become the parent of `record_id`.
    async fn validate_no_circular_reference(
        &self,
        table: HierarchyTable,
        record_id: DbId,
        parent_id: Option<DbId>,
    ) -> StoreResult<bool>;
}
