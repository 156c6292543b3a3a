//! In-memory store implementations for tests and database-free tooling.
//!
//! Semantics follow the PostgreSQL stores: case-insensitive lookups, batch
//! commits that are all-or-nothing, and rollback logs that clear the
//! record's `can_rollback` flag.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bizsuite_core::hierarchy::{precheck, HierarchyTable};
use bizsuite_core::migration::registry::EntityConfig;
use bizsuite_core::migration::validator::{value_text, ValidationResult};
use bizsuite_core::migration::{EntityType, JobStatus, RecordAction};
use bizsuite_core::types::{DbId, Row};
use bizsuite_db::models::migration_job::{CreateMigrationJob, JobCounters, JobFilter, MigrationJob};
use bizsuite_db::models::migration_record::{MigrationRecord, NewMigrationRecord, RecordFilter};
use bizsuite_db::models::rollback_log::{MigrationRollbackLog, NewRollbackLog};
use chrono::Utc;
use serde_json::Value;
use sqlx::types::Json;

use crate::store::{JobStore, StoreResult, TargetStore};

fn poisoned() -> sqlx::Error {
    sqlx::Error::Protocol("in-memory store lock poisoned".into())
}

// ---------------------------------------------------------------------------
// Job store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct JobTables {
    next_id: DbId,
    jobs: BTreeMap<DbId, MigrationJob>,
    records: Vec<MigrationRecord>,
    logs: Vec<MigrationRollbackLog>,
}

impl JobTables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryJobStore {
    tables: Mutex<JobTables>,
    fail_commits: AtomicBool,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `commit_batch` fail without writing anything.
    pub fn fail_batch_commits(&self) {
        self.fail_commits.store(true, Ordering::SeqCst);
    }

    /// Overwrite a job's stored status, bypassing the state machine.
    pub fn force_status(&self, id: DbId, status: JobStatus) {
        if let Ok(mut tables) = self.tables.lock() {
            if let Some(job) = tables.jobs.get_mut(&id) {
                job.status = status;
            }
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(
        &self,
        input: &CreateMigrationJob,
        created_by: Option<DbId>,
    ) -> StoreResult<MigrationJob> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        let id = tables.next_id();
        let now = Utc::now();
        let job = MigrationJob {
            id,
            name: input.name.clone(),
            entity_type: input.entity_type,
            status: JobStatus::Pending,
            source_type: None,
            total_rows: 0,
            processed_rows: 0,
            created_records: 0,
            updated_records: 0,
            skipped_records: 0,
            failed_records: 0,
            field_mapping: None,
            cleaning_rules: Json(input.cleaning_rules.clone().unwrap_or_default()),
            dedup_strategy: input.dedup_strategy.unwrap_or_default(),
            dedup_fields: input.dedup_fields.clone().unwrap_or_default(),
            file_name: None,
            file_path: None,
            file_hash: None,
            file_size: None,
            detected_columns: Vec::new(),
            sample_data: Json(Vec::new()),
            validation_result: None,
            error_message: None,
            created_by,
            started_at: None,
            completed_at: None,
            rolled_back_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn find_job(&self, id: DbId) -> StoreResult<Option<MigrationJob>> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        Ok(tables.jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<MigrationJob>> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        Ok(tables
            .jobs
            .values()
            .rev()
            .filter(|j| filter.status.map_or(true, |s| j.status == s))
            .filter(|j| filter.entity_type.map_or(true, |e| j.entity_type == e))
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn save_job(&self, job: &MigrationJob) -> StoreResult<Option<MigrationJob>> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        let Some(stored) = tables.jobs.get_mut(&job.id) else {
            return Ok(None);
        };
        let counters = stored.counters();
        *stored = job.clone();
        stored.processed_rows = counters.processed;
        stored.created_records = counters.created;
        stored.updated_records = counters.updated;
        stored.skipped_records = counters.skipped;
        stored.failed_records = counters.failed;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn swap_status(
        &self,
        id: DbId,
        from: JobStatus,
        to: JobStatus,
    ) -> StoreResult<Option<MigrationJob>> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        match tables.jobs.get_mut(&id) {
            Some(job) if job.status == from => {
                job.status = to;
                job.updated_at = Utc::now();
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn save_validation_result(
        &self,
        id: DbId,
        result: &ValidationResult,
    ) -> StoreResult<Option<MigrationJob>> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        Ok(tables.jobs.get_mut(&id).map(|job| {
            job.validation_result = Some(Json(result.clone()));
            job.updated_at = Utc::now();
            job.clone()
        }))
    }

    async fn reset_counters(&self, id: DbId) -> StoreResult<()> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        if let Some(job) = tables.jobs.get_mut(&id) {
            job.processed_rows = 0;
            job.created_records = 0;
            job.updated_records = 0;
            job.skipped_records = 0;
            job.failed_records = 0;
        }
        Ok(())
    }

    async fn delete_job(&self, id: DbId) -> StoreResult<bool> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        let removed = tables.jobs.remove(&id).is_some();
        tables.records.retain(|r| r.job_id != id);
        Ok(removed)
    }

    async fn commit_batch(
        &self,
        job_id: DbId,
        records: &[NewMigrationRecord],
        delta: &JobCounters,
    ) -> StoreResult<MigrationJob> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol("simulated batch commit failure".into()));
        }
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        if !tables.jobs.contains_key(&job_id) {
            return Err(sqlx::Error::RowNotFound);
        }

        let now = Utc::now();
        for record in records {
            let id = tables.next_id();
            tables.records.push(MigrationRecord {
                id,
                job_id,
                row_number: record.row_number,
                source_data: Json(record.source_data.clone()),
                transformed_data: record.transformed_data.clone().map(Json),
                target_record_id: record.target_record_id,
                target_record_type: record.target_record_type.map(|e| e.as_str().to_string()),
                action: record.action,
                previous_data: record.previous_data.clone().map(Json),
                can_rollback: record.can_rollback,
                error_message: record.error_message.clone(),
                validation_warnings: Json(record.validation_warnings.clone()),
                processed_at: now,
            });
        }

        let job = tables.jobs.get_mut(&job_id).ok_or(sqlx::Error::RowNotFound)?;
        job.processed_rows += delta.processed;
        job.created_records += delta.created;
        job.updated_records += delta.updated;
        job.skipped_records += delta.skipped;
        job.failed_records += delta.failed;
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn list_records(
        &self,
        job_id: DbId,
        filter: &RecordFilter,
    ) -> StoreResult<Vec<MigrationRecord>> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        let mut records: Vec<MigrationRecord> = tables
            .records
            .iter()
            .filter(|r| r.job_id == job_id)
            .filter(|r| filter.action.map_or(true, |a| r.action == a))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.row_number);
        Ok(records
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn rollback_candidates(&self, job_id: DbId) -> StoreResult<Vec<MigrationRecord>> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        let mut records: Vec<MigrationRecord> = tables
            .records
            .iter()
            .filter(|r| {
                r.job_id == job_id
                    && r.can_rollback
                    && matches!(r.action, RecordAction::Created | RecordAction::Updated)
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| std::cmp::Reverse(r.row_number));
        Ok(records)
    }

    async fn record_rollback(&self, entry: &NewRollbackLog) -> StoreResult<MigrationRollbackLog> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        let id = tables.next_id();
        let log = MigrationRollbackLog {
            id,
            job_id: entry.job_id,
            record_id: Some(entry.record_id),
            entity_type: entry.entity_type,
            target_record_id: entry.target_record_id,
            action: entry.action,
            previous_data: entry.previous_data.clone().map(Json),
            rolled_back_by: entry.rolled_back_by,
            created_at: Utc::now(),
        };
        if let Some(record) = tables.records.iter_mut().find(|r| r.id == entry.record_id) {
            record.can_rollback = false;
        }
        tables.logs.push(log.clone());
        Ok(log)
    }

    async fn list_rollback_logs(&self, job_id: DbId) -> StoreResult<Vec<MigrationRollbackLog>> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        Ok(tables
            .logs
            .iter()
            .filter(|l| l.job_id == job_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Target store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TargetTables {
    next_id: DbId,
    rows: HashMap<EntityType, BTreeMap<DbId, Row>>,
    protected: HashSet<(EntityType, DbId)>,
}

/// Entity tables held as JSON rows keyed by id.
#[derive(Default)]
pub struct MemoryTargetStore {
    tables: Mutex<TargetTables>,
}

fn text_eq(value: Option<&Value>, wanted: &str) -> bool {
    value
        .and_then(value_text)
        .is_some_and(|v| v.to_lowercase() == wanted.trim().to_lowercase())
}

impl MemoryTargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly, returning its id.
    pub fn seed(&self, entity: EntityType, data: Row) -> DbId {
        match self.tables.lock() {
            Ok(mut tables) => {
                tables.next_id += 1;
                let id = tables.next_id;
                tables.rows.entry(entity).or_default().insert(id, data);
                id
            }
            Err(_) => 0,
        }
    }

    /// Snapshot of every row of an entity.
    pub fn rows(&self, entity: EntityType) -> BTreeMap<DbId, Row> {
        self.tables
            .lock()
            .ok()
            .and_then(|t| t.rows.get(&entity).cloned())
            .unwrap_or_default()
    }

    /// Make deletes of one row fail, as a restricting foreign key would.
    pub fn protect(&self, entity: EntityType, id: DbId) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.protected.insert((entity, id));
        }
    }
}

#[async_trait]
impl TargetStore for MemoryTargetStore {
    async fn existing_values(
        &self,
        config: &EntityConfig,
        field: &str,
        values: &[String],
    ) -> StoreResult<HashSet<String>> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        let wanted: HashSet<String> = values.iter().map(|v| v.trim().to_lowercase()).collect();
        let Some(rows) = tables.rows.get(&config.entity_type) else {
            return Ok(HashSet::new());
        };
        Ok(rows
            .values()
            .filter_map(|row| row.get(field).and_then(value_text))
            .map(|v| v.to_lowercase())
            .filter(|v| wanted.contains(v))
            .collect())
    }

    async fn count_rows(&self, config: &EntityConfig) -> StoreResult<i64> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        Ok(tables
            .rows
            .get(&config.entity_type)
            .map_or(0, |rows| rows.len() as i64))
    }

    async fn find_by_fields(
        &self,
        config: &EntityConfig,
        criteria: &Row,
    ) -> StoreResult<Option<(DbId, Row)>> {
        let usable: Vec<(&String, String)> = criteria
            .iter()
            .filter(|(key, _)| config.field(key).is_some())
            .filter_map(|(key, value)| value_text(value).map(|t| (key, t)))
            .collect();
        if usable.is_empty() {
            return Ok(None);
        }

        let tables = self.tables.lock().map_err(|_| poisoned())?;
        let Some(rows) = tables.rows.get(&config.entity_type) else {
            return Ok(None);
        };
        Ok(rows
            .iter()
            .find(|(_, row)| usable.iter().all(|(key, text)| text_eq(row.get(*key), text)))
            .map(|(id, row)| (*id, row.clone())))
    }

    async fn resolve_reference(
        &self,
        config: &EntityConfig,
        lookup_fields: &[&str],
        raw: &str,
    ) -> StoreResult<Option<DbId>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        let Some(rows) = tables.rows.get(&config.entity_type) else {
            return Ok(None);
        };
        for lookup in lookup_fields {
            if let Some((id, _)) = rows.iter().find(|(_, row)| text_eq(row.get(*lookup), raw)) {
                return Ok(Some(*id));
            }
        }
        Ok(raw
            .parse::<DbId>()
            .ok()
            .filter(|id| rows.contains_key(id)))
    }

    async fn insert(&self, config: &EntityConfig, data: &Row) -> StoreResult<DbId> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        for field in config.unique_fields() {
            let Some(text) = data.get(field).and_then(value_text) else {
                continue;
            };
            let clash = tables
                .rows
                .get(&config.entity_type)
                .is_some_and(|rows| rows.values().any(|r| text_eq(r.get(field), &text)));
            if clash {
                return Err(sqlx::Error::Protocol(format!(
                    "duplicate key value violates unique constraint on {}.{field}",
                    config.entity_type
                )));
            }
        }
        tables.next_id += 1;
        let id = tables.next_id;
        let row: Row = data
            .iter()
            .filter(|(k, _)| config.field(k).is_some())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        tables.rows.entry(config.entity_type).or_default().insert(id, row);
        Ok(id)
    }

    async fn update(&self, config: &EntityConfig, id: DbId, data: &Row) -> StoreResult<bool> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        let Some(row) = tables
            .rows
            .get_mut(&config.entity_type)
            .and_then(|rows| rows.get_mut(&id))
        else {
            return Ok(false);
        };
        for (key, value) in data {
            if config.field(key).is_some() {
                row.insert(key.clone(), value.clone());
            }
        }
        Ok(true)
    }

    async fn delete(&self, config: &EntityConfig, id: DbId) -> StoreResult<bool> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        if tables.protected.contains(&(config.entity_type, id)) {
            return Err(sqlx::Error::Protocol(format!(
                "{} {id} is still referenced",
                config.entity_type
            )));
        }
        Ok(tables
            .rows
            .get_mut(&config.entity_type)
            .is_some_and(|rows| rows.remove(&id).is_some()))
    }

    async fn validate_no_circular_reference(
        &self,
        table: HierarchyTable,
        record_id: DbId,
        parent_id: Option<DbId>,
    ) -> StoreResult<bool> {
        if let Some(decided) = precheck(record_id, parent_id) {
            return Ok(decided);
        }
        let Some(entity) = EntityType::from_str(table.table_name()) else {
            return Ok(true);
        };
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        let Some(rows) = tables.rows.get(&entity) else {
            return Ok(true);
        };

        let mut visited = HashSet::new();
        let mut current = parent_id;
        while let Some(id) = current {
            if id == record_id {
                return Ok(false);
            }
            if !visited.insert(id) {
                break;
            }
            current = rows
                .get(&id)
                .and_then(|row| row.get(table.parent_column()))
                .and_then(Value::as_i64);
        }
        Ok(true)
    }
}
