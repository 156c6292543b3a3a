//! Migration job model.

use bizsuite_core::migration::cleaning::CleaningConfig;
use bizsuite_core::migration::job::progress_percent;
use bizsuite_core::migration::mapping::FieldMapping;
use bizsuite_core::migration::validator::ValidationResult;
use bizsuite_core::migration::{DedupStrategy, EntityType, JobStatus, RecordAction, SourceType};
use bizsuite_core::types::{DbId, Row, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `migration_jobs` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MigrationJob {
    pub id: DbId,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub entity_type: EntityType,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub source_type: Option<String>,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub created_records: i64,
    pub updated_records: i64,
    pub skipped_records: i64,
    pub failed_records: i64,
    pub field_mapping: Option<Json<FieldMapping>>,
    pub cleaning_rules: Json<CleaningConfig>,
    #[sqlx(try_from = "String")]
    pub dedup_strategy: DedupStrategy,
    pub dedup_fields: Vec<String>,
    pub file_name: Option<String>,
    #[serde(skip_serializing)]
    pub file_path: Option<String>,
    pub file_hash: Option<String>,
    pub file_size: Option<i64>,
    pub detected_columns: Vec<String>,
    pub sample_data: Json<Vec<Row>>,
    pub validation_result: Option<Json<ValidationResult>>,
    pub error_message: Option<String>,
    pub created_by: Option<DbId>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub rolled_back_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MigrationJob {
    /// Saved mapping, if any column is mapped.
    pub fn mapping(&self) -> Option<&FieldMapping> {
        self.field_mapping
            .as_ref()
            .map(|Json(m)| m)
            .filter(|m| !m.is_empty())
    }

    pub fn source_type(&self) -> Option<SourceType> {
        self.source_type.as_deref().and_then(SourceType::from_str)
    }

    pub fn counters(&self) -> JobCounters {
        JobCounters {
            processed: self.processed_rows,
            created: self.created_records,
            updated: self.updated_records,
            skipped: self.skipped_records,
            failed: self.failed_records,
        }
    }

    /// Point-in-time progress snapshot for polling.
    pub fn progress(&self) -> JobProgress {
        JobProgress {
            job_id: self.id,
            status: self.status,
            total_rows: self.total_rows,
            processed_rows: self.processed_rows,
            created_records: self.created_records,
            updated_records: self.updated_records,
            skipped_records: self.skipped_records,
            failed_records: self.failed_records,
            percent: progress_percent(self.processed_rows, self.total_rows),
            error_message: self.error_message.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// DTO for creating a migration job.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMigrationJob {
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub dedup_strategy: Option<DedupStrategy>,
    #[serde(default)]
    pub dedup_fields: Option<Vec<String>>,
    #[serde(default)]
    pub cleaning_rules: Option<CleaningConfig>,
}

/// Filters for listing jobs. `limit`/`offset` are already clamped.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub entity_type: Option<EntityType>,
    pub limit: i64,
    pub offset: i64,
}

/// Row-outcome counters, used both as job totals and as per-batch deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounters {
    pub processed: i64,
    pub created: i64,
    pub updated: i64,
    pub skipped: i64,
    pub failed: i64,
}

impl JobCounters {
    /// Count one row with the given outcome.
    pub fn record(&mut self, action: RecordAction) {
        self.processed += 1;
        match action {
            RecordAction::Created => self.created += 1,
            RecordAction::Updated => self.updated += 1,
            RecordAction::Skipped => self.skipped += 1,
            RecordAction::Failed => self.failed += 1,
        }
    }

    pub fn add(&mut self, other: JobCounters) {
        self.processed += other.processed;
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Progress view of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub job_id: DbId,
    pub status: JobStatus,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub created_records: i64,
    pub updated_records: i64,
    pub skipped_records: i64,
    pub failed_records: i64,
    pub percent: f64,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}
