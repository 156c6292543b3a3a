//! PostgreSQL implementations of the store traits, delegating to the
//! `bizsuite-db` repositories.

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
use bizsuite_db::repositories::{
    HierarchyRepo, MigrationJobRepo, MigrationRecordRepo, RollbackLogRepo, TargetRepo,
};
use bizsuite_db::DbPool;

use crate::store::{JobStore, StoreResult, TargetStore};

#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(
        &self,
        input: &CreateMigrationJob,
        created_by: Option<DbId>,
    ) -> StoreResult<MigrationJob> {
        MigrationJobRepo::create(&self.pool, input, created_by).await
    }

    async fn find_job(&self, id: DbId) -> StoreResult<Option<MigrationJob>> {
        MigrationJobRepo::find_by_id(&self.pool, id).await
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<MigrationJob>> {
        MigrationJobRepo::list(&self.pool, filter).await
    }

    async fn save_job(&self, job: &MigrationJob) -> StoreResult<Option<MigrationJob>> {
        MigrationJobRepo::save(&self.pool, job).await
    }

    async fn reset_counters(&self, id: DbId) -> StoreResult<()> {
        MigrationJobRepo::reset_counters(&self.pool, id).await
    }

    async fn swap_status(
        &self,
        id: DbId,
        from: JobStatus,
        to: JobStatus,
    ) -> StoreResult<Option<MigrationJob>> {
        MigrationJobRepo::swap_status(&self.pool, id, from, to).await
    }

    async fn save_validation_result(
        &self,
        id: DbId,
        result: &ValidationResult,
    ) -> StoreResult<Option<MigrationJob>> {
        MigrationJobRepo::save_validation_result(&self.pool, id, result).await
    }

    async fn delete_job(&self, id: DbId) -> StoreResult<bool> {
        MigrationJobRepo::delete(&self.pool, id).await
    }

    async fn commit_batch(
        &self,
        job_id: DbId,
        records: &[NewMigrationRecord],
        delta: &JobCounters,
    ) -> StoreResult<MigrationJob> {
        MigrationRecordRepo::commit_batch(&self.pool, job_id, records, delta).await
    }

    async fn list_records(
        &self,
        job_id: DbId,
        filter: &RecordFilter,
    ) -> StoreResult<Vec<MigrationRecord>> {
        MigrationRecordRepo::list_for_job(&self.pool, job_id, filter).await
    }

    async fn rollback_candidates(&self, job_id: DbId) -> StoreResult<Vec<MigrationRecord>> {
        MigrationRecordRepo::rollback_candidates(&self.pool, job_id).await
    }

    async fn record_rollback(&self, entry: &NewRollbackLog) -> StoreResult<MigrationRollbackLog> {
        RollbackLogRepo::record(&self.pool, entry).await
    }

    async fn list_rollback_logs(&self, job_id: DbId) -> StoreResult<Vec<MigrationRollbackLog>> {
        RollbackLogRepo::list_for_job(&self.pool, job_id).await
    }
}

#[derive(Clone)]
pub struct PgTargetStore {
    pool: DbPool,
}

impl PgTargetStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TargetStore for PgTargetStore {
    async fn existing_values(
        &self,
        config: &EntityConfig,
        field: &str,
        values: &[String],
    ) -> StoreResult<HashSet<String>> {
        TargetRepo::existing_values(&self.pool, config, field, values).await
    }

    async fn count_rows(&self, config: &EntityConfig) -> StoreResult<i64> {
        TargetRepo::count_rows(&self.pool, config).await
    }

    async fn find_by_fields(
        &self,
        config: &EntityConfig,
        criteria: &Row,
    ) -> StoreResult<Option<(DbId, Row)>> {
        TargetRepo::find_by_fields(&self.pool, config, criteria).await
    }

    async fn resolve_reference(
        &self,
        config: &EntityConfig,
        lookup_fields: &[&str],
        raw: &str,
    ) -> StoreResult<Option<DbId>> {
        TargetRepo::resolve_reference(&self.pool, config, lookup_fields, raw).await
    }

    async fn insert(&self, config: &EntityConfig, data: &Row) -> StoreResult<DbId> {
        TargetRepo::insert(&self.pool, config, data).await
    }

    async fn update(&self, config: &EntityConfig, id: DbId, data: &Row) -> StoreResult<bool> {
        TargetRepo::update(&self.pool, config, id, data).await
    }

    async fn delete(&self, config: &EntityConfig, id: DbId) -> StoreResult<bool> {
        TargetRepo::delete(&self.pool, config, id).await
    }

    async fn validate_no_circular_reference(
        &self,
        table: HierarchyTable,
        record_id: DbId,
        parent_id: Option<DbId>,
    ) -> StoreResult<bool> {
        HierarchyRepo::validate_no_circular_reference(&self.pool, table, record_id, parent_id).await
    }
}
