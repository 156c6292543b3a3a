//! Per-row migration outcome model.

use bizsuite_core::migration::{EntityType, RecordAction};
use bizsuite_core::types::{DbId, Row, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `migration_records` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MigrationRecord {
    pub id: DbId,
    pub job_id: DbId,
    pub row_number: i32,
    pub source_data: Json<Row>,
    pub transformed_data: Option<Json<Row>>,
    pub target_record_id: Option<DbId>,
    pub target_record_type: Option<String>,
    #[sqlx(try_from = "String")]
    pub action: RecordAction,
    pub previous_data: Option<Json<Row>>,
    pub can_rollback: bool,
    pub error_message: Option<String>,
    pub validation_warnings: Json<Vec<String>>,
    pub processed_at: Timestamp,
}

/// A record about to be written as part of a batch commit.
#[derive(Debug, Clone)]
pub struct NewMigrationRecord {
    pub row_number: i32,
    pub source_data: Row,
    pub transformed_data: Option<Row>,
    pub target_record_id: Option<DbId>,
    pub target_record_type: Option<EntityType>,
    pub action: RecordAction,
    pub previous_data: Option<Row>,
    pub can_rollback: bool,
    pub error_message: Option<String>,
    pub validation_warnings: Vec<String>,
}

/// Filters for listing a job's records.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub action: Option<RecordAction>,
    pub limit: i64,
    pub offset: i64,
}
