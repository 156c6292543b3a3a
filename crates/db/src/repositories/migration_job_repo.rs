//! Repository for the `migration_jobs` table.

use bizsuite_core::migration::cleaning::CleaningConfig;
use bizsuite_core::migration::validator::ValidationResult;
use bizsuite_core::migration::JobStatus;
use bizsuite_core::types::DbId;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::models::migration_job::{CreateMigrationJob, JobCounters, JobFilter, MigrationJob};

/// Column list for migration_jobs queries.
pub(crate) const COLUMNS: &str = "id, name, entity_type, status, source_type, \
    total_rows, processed_rows, created_records, updated_records, skipped_records, \
    failed_records, field_mapping, cleaning_rules, dedup_strategy, dedup_fields, \
    file_name, file_path, file_hash, file_size, detected_columns, sample_data, \
    validation_result, error_message, created_by, started_at, completed_at, \
    rolled_back_at, created_at, updated_at";

/// Provides persistence for migration jobs.
pub struct MigrationJobRepo;

impl MigrationJobRepo {
    /// Insert a new job in `pending`.
    pub async fn create(
        pool: &PgPool,
        input: &CreateMigrationJob,
        created_by: Option<DbId>,
    ) -> Result<MigrationJob, sqlx::Error> {
        let cleaning_rules = input.cleaning_rules.clone().unwrap_or_default();
        let dedup_strategy = input.dedup_strategy.unwrap_or_default();
        let dedup_fields = input.dedup_fields.clone().unwrap_or_default();

        let query = format!(
            "INSERT INTO migration_jobs
                (name, entity_type, status, cleaning_rules, dedup_strategy, dedup_fields, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MigrationJob>(&query)
            .bind(&input.name)
            .bind(input.entity_type.as_str())
            .bind(JobStatus::Pending.as_str())
            .bind(Json::<&CleaningConfig>(&cleaning_rules))
            .bind(dedup_strategy.as_str())
            .bind(&dedup_fields)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    /// Find a job by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<MigrationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM migration_jobs WHERE id = $1");
        sqlx::query_as::<_, MigrationJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List jobs, newest first.
    pub async fn list(pool: &PgPool, filter: &JobFilter) -> Result<Vec<MigrationJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_jobs
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::text IS NULL OR entity_type = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, MigrationJob>(&query)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.entity_type.map(|e| e.as_str()))
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(pool)
            .await
    }

    /// Persist every mutable column of `job`.
    ///
    /// Row counters are not written here; they only move through
    /// [`MigrationJobRepo::add_counters`] and [`MigrationJobRepo::reset_counters`].
    pub async fn save(pool: &PgPool, job: &MigrationJob) -> Result<Option<MigrationJob>, sqlx::Error> {
        let query = format!(
            "UPDATE migration_jobs SET
                name = $2,
                status = $3,
                source_type = $4,
                total_rows = $5,
                field_mapping = $6,
                cleaning_rules = $7,
                dedup_strategy = $8,
                dedup_fields = $9,
                file_name = $10,
                file_path = $11,
                file_hash = $12,
                file_size = $13,
                detected_columns = $14,
                sample_data = $15,
                validation_result = $16,
                error_message = $17,
                started_at = $18,
                completed_at = $19,
                rolled_back_at = $20
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MigrationJob>(&query)
            .bind(job.id)
            .bind(&job.name)
            .bind(job.status.as_str())
            .bind(job.source_type.as_deref())
            .bind(job.total_rows)
            .bind(&job.field_mapping)
            .bind(&job.cleaning_rules)
            .bind(job.dedup_strategy.as_str())
            .bind(&job.dedup_fields)
            .bind(job.file_name.as_deref())
            .bind(job.file_path.as_deref())
            .bind(job.file_hash.as_deref())
            .bind(job.file_size)
            .bind(&job.detected_columns)
            .bind(&job.sample_data)
            .bind(&job.validation_result)
            .bind(job.error_message.as_deref())
            .bind(job.started_at)
            .bind(job.completed_at)
            .bind(job.rolled_back_at)
            .fetch_optional(pool)
            .await
    }

    /// Move a job from `from` to `to`. Returns `None` when the job is gone
    /// or no longer in `from`.
    pub async fn swap_status(
        pool: &PgPool,
        id: DbId,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Option<MigrationJob>, sqlx::Error> {
        let query = format!(
            "UPDATE migration_jobs SET status = $3
             WHERE id = $1 AND status = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MigrationJob>(&query)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Write only the validation result of a job.
    pub async fn save_validation_result(
        pool: &PgPool,
        id: DbId,
        result: &ValidationResult,
    ) -> Result<Option<MigrationJob>, sqlx::Error> {
        let query = format!(
            "UPDATE migration_jobs SET validation_result = $2
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MigrationJob>(&query)
            .bind(id)
            .bind(Json::<&ValidationResult>(result))
            .fetch_optional(pool)
            .await
    }

    /// Zero the row counters before a run starts.
    pub async fn reset_counters(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE migration_jobs SET
                processed_rows = 0, created_records = 0, updated_records = 0,
                skipped_records = 0, failed_records = 0
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Increment counters by a batch delta. Runs on the caller's connection
    /// so it can share the batch transaction.
    pub async fn add_counters(
        conn: &mut PgConnection,
        id: DbId,
        delta: &JobCounters,
    ) -> Result<MigrationJob, sqlx::Error> {
        let query = format!(
            "UPDATE migration_jobs SET
                processed_rows = processed_rows + $2,
                created_records = created_records + $3,
                updated_records = updated_records + $4,
                skipped_records = skipped_records + $5,
                failed_records = failed_records + $6
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MigrationJob>(&query)
            .bind(id)
            .bind(delta.processed)
            .bind(delta.created)
            .bind(delta.updated)
            .bind(delta.skipped)
            .bind(delta.failed)
            .fetch_one(conn)
            .await
    }

    /// Delete a job. Records cascade. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM migration_jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
