//! Repository for the `migration_records` table.

use bizsuite_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::migration_job::{JobCounters, MigrationJob};
use crate::models::migration_record::{MigrationRecord, NewMigrationRecord, RecordFilter};
use crate::repositories::MigrationJobRepo;

const COLUMNS: &str = "id, job_id, row_number, source_data, transformed_data, \
    target_record_id, target_record_type, action, previous_data, can_rollback, \
    error_message, validation_warnings, processed_at";

pub struct MigrationRecordRepo;

impl MigrationRecordRepo {
    /// Write one batch of records and bump the job counters in a single
    /// transaction. Returns the job with its updated counters.
    pub async fn commit_batch(
        pool: &PgPool,
        job_id: DbId,
        records: &[NewMigrationRecord],
        delta: &JobCounters,
    ) -> Result<MigrationJob, sqlx::Error> {
        let mut tx = pool.begin().await?;

        for record in records {
            sqlx::query(
                "INSERT INTO migration_records
                    (job_id, row_number, source_data, transformed_data, target_record_id,
                     target_record_type, action, previous_data, can_rollback,
                     error_message, validation_warnings)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(job_id)
            .bind(record.row_number)
            .bind(Json(&record.source_data))
            .bind(record.transformed_data.as_ref().map(Json))
            .bind(record.target_record_id)
            .bind(record.target_record_type.map(|e| e.as_str()))
            .bind(record.action.as_str())
            .bind(record.previous_data.as_ref().map(Json))
            .bind(record.can_rollback)
            .bind(record.error_message.as_deref())
            .bind(Json(&record.validation_warnings))
            .execute(&mut *tx)
            .await?;
        }

        let job = MigrationJobRepo::add_counters(&mut tx, job_id, delta).await?;
        tx.commit().await?;
        Ok(job)
    }

    /// List a job's records in row order.
    pub async fn list_for_job(
        pool: &PgPool,
        job_id: DbId,
        filter: &RecordFilter,
    ) -> Result<Vec<MigrationRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_records
             WHERE job_id = $1 AND ($2::text IS NULL OR action = $2)
             ORDER BY row_number
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, MigrationRecord>(&query)
            .bind(job_id)
            .bind(filter.action.map(|a| a.as_str()))
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(pool)
            .await
    }

    /// Records still eligible for rollback, latest row first so rows that
    /// reference earlier rows of the same job are reversed before them.
    pub async fn rollback_candidates(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Vec<MigrationRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_records
             WHERE job_id = $1 AND can_rollback AND action IN ('created', 'updated')
             ORDER BY row_number DESC"
        );
        sqlx::query_as::<_, MigrationRecord>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
