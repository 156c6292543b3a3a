//! Cycle checks for self-referencing parent pointers.

use bizsuite_core::hierarchy::{precheck, HierarchyTable};
use bizsuite_core::types::DbId;
use sqlx::PgPool;

pub struct HierarchyRepo;

impl HierarchyRepo {
    /// Whether `parent_id` may be assigned as the parent of `record_id`.
    ///
    /// Clearing the parent is always allowed and a direct self-reference is
    /// always rejected; otherwise the ancestor chain of `parent_id` must not
    /// reach `record_id`.
    pub async fn validate_no_circular_reference(
        pool: &PgPool,
        table: HierarchyTable,
        record_id: DbId,
        parent_id: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        if let Some(decided) = precheck(record_id, parent_id) {
            return Ok(decided);
        }

        let (cycle,): (bool,) = sqlx::query_as(&table.ancestor_cycle_sql())
            .bind(parent_id)
            .bind(record_id)
            .fetch_one(pool)
            .await?;
        Ok(!cycle)
    }
}
