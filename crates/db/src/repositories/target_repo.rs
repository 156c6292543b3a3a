//! Reads and writes against the business-entity tables that imports target.
//!
//! Table and column identifiers are taken only from the entity registry:
//! the table from [`EntityType::table_name`] and columns from the entity's
//! [`FieldConfig`](bizsuite_core::migration::registry::FieldConfig) names.
//! Keys of a data row that name no registry field are dropped with a warning
//! and never reach SQL. Values are bound as a single JSONB parameter and
//! coerced to column types by `jsonb_populate_record`.

use std::collections::HashSet;

use bizsuite_core::migration::registry::EntityConfig;
use bizsuite_core::migration::validator::value_text;
use bizsuite_core::types::{DbId, Row};
use sqlx::types::Json;
use sqlx::PgPool;

pub struct TargetRepo;

impl TargetRepo {
    /// Which of `values` already exist in `field`, compared case-insensitively.
    ///
    /// Returned values are lowercased. Unknown fields yield an empty set.
    pub async fn existing_values(
        pool: &PgPool,
        config: &EntityConfig,
        field: &str,
        values: &[String],
    ) -> Result<HashSet<String>, sqlx::Error> {
        let Some(column) = config.field(field).map(|f| f.name) else {
            tracing::warn!(entity = %config.entity_type, field, "Lookup on unknown field ignored");
            return Ok(HashSet::new());
        };
        if values.is_empty() {
            return Ok(HashSet::new());
        }

        let lowered: Vec<String> = values.iter().map(|v| v.trim().to_lowercase()).collect();
        let table = config.entity_type.table_name();
        let query = format!(
            "SELECT DISTINCT lower({column}::text) FROM {table}
             WHERE lower({column}::text) = ANY($1)"
        );
        let rows: Vec<(String,)> = sqlx::query_as(&query)
            .bind(&lowered)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    /// Total rows currently in the entity's table.
    pub async fn count_rows(pool: &PgPool, config: &EntityConfig) -> Result<i64, sqlx::Error> {
        let table = config.entity_type.table_name();
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// First row whose `criteria` fields all match case-insensitively.
    ///
    /// Criteria with null values or unknown field names are ignored; when no
    /// usable criterion remains nothing matches.
    pub async fn find_by_fields(
        pool: &PgPool,
        config: &EntityConfig,
        criteria: &Row,
    ) -> Result<Option<(DbId, Row)>, sqlx::Error> {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();
        for (key, value) in criteria {
            let Some(field) = config.field(key) else {
                continue;
            };
            let Some(text) = value_text(value) else {
                continue;
            };
            binds.push(text);
            conditions.push(format!(
                "lower(t.{}::text) = lower(${})",
                field.name,
                binds.len()
            ));
        }
        if conditions.is_empty() {
            return Ok(None);
        }

        let table = config.entity_type.table_name();
        let query = format!(
            "SELECT t.id, to_jsonb(t) FROM {table} t
             WHERE {}
             ORDER BY t.id
             LIMIT 1",
            conditions.join(" AND ")
        );
        let mut q = sqlx::query_as::<_, (DbId, Json<Row>)>(&query);
        for bind in &binds {
            q = q.bind(bind.as_str());
        }
        let found = q.fetch_optional(pool).await?;
        Ok(found.map(|(id, Json(data))| (id, registry_fields(config, data))))
    }

    /// Resolve a raw foreign-key value to a row id.
    ///
    /// Each lookup field is tried in order with a case-insensitive match; a
    /// value that parses as an integer is finally tried as an id.
    pub async fn resolve_reference(
        pool: &PgPool,
        config: &EntityConfig,
        lookup_fields: &[&str],
        raw: &str,
    ) -> Result<Option<DbId>, sqlx::Error> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let table = config.entity_type.table_name();

        for lookup in lookup_fields {
            let Some(field) = config.field(lookup) else {
                continue;
            };
            let query = format!(
                "SELECT id FROM {table} WHERE lower({}::text) = lower($1) ORDER BY id LIMIT 1",
                field.name
            );
            let found: Option<(DbId,)> = sqlx::query_as(&query)
                .bind(raw)
                .fetch_optional(pool)
                .await?;
            if let Some((id,)) = found {
                return Ok(Some(id));
            }
        }

        if let Ok(id) = raw.parse::<DbId>() {
            let found: Option<(DbId,)> =
                sqlx::query_as(&format!("SELECT id FROM {table} WHERE id = $1"))
                    .bind(id)
                    .fetch_optional(pool)
                    .await?;
            return Ok(found.map(|(id,)| id));
        }

        Ok(None)
    }

    /// Insert a row and return its id.
    pub async fn insert(pool: &PgPool, config: &EntityConfig, data: &Row) -> Result<DbId, sqlx::Error> {
        let table = config.entity_type.table_name();
        let columns = writable_columns(config, data);

        let query = if columns.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES RETURNING id")
        } else {
            let list = columns.join(", ");
            format!(
                "INSERT INTO {table} ({list})
                 SELECT {list} FROM jsonb_populate_record(NULL::{table}, $1)
                 RETURNING id"
            )
        };
        let (id,): (DbId,) = sqlx::query_as(&query)
            .bind(Json(data))
            .fetch_one(pool)
            .await?;
        Ok(id)
    }

    /// Overwrite the given fields of one row. Returns `false` if no row matched.
    pub async fn update(
        pool: &PgPool,
        config: &EntityConfig,
        id: DbId,
        data: &Row,
    ) -> Result<bool, sqlx::Error> {
        let columns = writable_columns(config, data);
        if columns.is_empty() {
            return Ok(true);
        }

        let table = config.entity_type.table_name();
        let assignments = columns
            .iter()
            .map(|c| format!("{c} = r.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "UPDATE {table} t SET {assignments}
             FROM jsonb_populate_record(NULL::{table}, $2) r
             WHERE t.id = $1"
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(Json(data))
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete one row. Returns `false` if it was already gone.
    pub async fn delete(pool: &PgPool, config: &EntityConfig, id: DbId) -> Result<bool, sqlx::Error> {
        let table = config.entity_type.table_name();
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Registry field names present in `data`, in registry order.
fn writable_columns(config: &EntityConfig, data: &Row) -> Vec<&'static str> {
    for key in data.keys() {
        if config.field(key).is_none() {
            tracing::warn!(entity = %config.entity_type, field = %key, "Dropping unknown column");
        }
    }
    config
        .fields
        .iter()
        .filter(|f| data.contains_key(f.name))
        .map(|f| f.name)
        .collect()
}

fn registry_fields(config: &EntityConfig, mut data: Row) -> Row {
    data.retain(|key, _| config.field(key).is_some());
    data
}
