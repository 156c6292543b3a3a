//! Rollback audit log model. Append-only.

use bizsuite_core::migration::{EntityType, RollbackAction};
use bizsuite_core::types::{DbId, Row, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `migration_rollback_logs` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MigrationRollbackLog {
    pub id: DbId,
    pub job_id: DbId,
    pub record_id: Option<DbId>,
    #[sqlx(try_from = "String")]
    pub entity_type: EntityType,
    pub target_record_id: DbId,
    #[sqlx(try_from = "String")]
    pub action: RollbackAction,
    pub previous_data: Option<Json<Row>>,
    pub rolled_back_by: Option<DbId>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct NewRollbackLog {
    pub job_id: DbId,
    pub record_id: DbId,
    pub entity_type: EntityType,
    pub target_record_id: DbId,
    pub action: RollbackAction,
    pub previous_data: Option<Row>,
    pub rolled_back_by: Option<DbId>,
}
