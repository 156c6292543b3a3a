//! Repository for the `migration_rollback_logs` table.

use bizsuite_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::rollback_log::{MigrationRollbackLog, NewRollbackLog};

const COLUMNS: &str = "id, job_id, record_id, entity_type, target_record_id, action, \
    previous_data, rolled_back_by, created_at";

pub struct RollbackLogRepo;

impl RollbackLogRepo {
    /// Append a log entry and clear the record's `can_rollback` flag in one
    /// transaction.
    pub async fn record(
        pool: &PgPool,
        entry: &NewRollbackLog,
    ) -> Result<MigrationRollbackLog, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO migration_rollback_logs
                (job_id, record_id, entity_type, target_record_id, action, previous_data, rolled_back_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        let log = sqlx::query_as::<_, MigrationRollbackLog>(&query)
            .bind(entry.job_id)
            .bind(entry.record_id)
            .bind(entry.entity_type.as_str())
            .bind(entry.target_record_id)
            .bind(entry.action.as_str())
            .bind(entry.previous_data.as_ref().map(Json))
            .bind(entry.rolled_back_by)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE migration_records SET can_rollback = false WHERE id = $1")
            .bind(entry.record_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(log)
    }

    /// A job's rollback entries, oldest first.
    pub async fn list_for_job(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Vec<MigrationRollbackLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_rollback_logs
             WHERE job_id = $1
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, MigrationRollbackLog>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
