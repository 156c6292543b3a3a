//! Migration job lifecycle.
//!
//! ```text
//! pending → uploaded → mapped → validating → validated → running → completed | failed
//!                                                                   completed → rolled_back
//! pending … validated → cancelled
//! ```
//!
//! Every operation checks the job's status first and leaves the job
//! untouched when the check fails.

use std::path::Path;
use std::sync::Arc;

use bizsuite_core::error::CoreError;
use bizsuite_core::hashing::{hash_prefix, sha256_hex};
use bizsuite_core::hierarchy::HierarchyTable;
use bizsuite_core::migration::cleaning::CleaningConfig;
use bizsuite_core::migration::mapping::{suggest_mapping, FieldMapping, MappingSuggestion};
use bizsuite_core::migration::parser::{parse_bytes, parse_file, ParsedFile};
use bizsuite_core::migration::registry::{entity_config, EntityConfig};
use bizsuite_core::migration::validator::{validate_row, value_text, ValidationIssue, ValidationResult};
use bizsuite_core::migration::{
    DedupStrategy, EntityType, JobOperation, JobStatus, RecordAction, RollbackAction,
    SourceType,
};
use bizsuite_core::pagination::{clamp_limit, preview_window, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use bizsuite_core::types::{DbId, Row};
use bizsuite_db::models::migration_job::{
    CreateMigrationJob, JobCounters, JobFilter, JobProgress, MigrationJob,
};
use bizsuite_db::models::migration_record::{MigrationRecord, NewMigrationRecord, RecordFilter};
use bizsuite_db::models::rollback_log::{MigrationRollbackLog, NewRollbackLog};
use bizsuite_events::{EventBus, JobEvent, JobEventKind};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;

use crate::config::MigrationSettings;
use crate::error::{MigrationError, MigrationResult};
use crate::store::{JobStore, TargetStore};
use crate::transform::RowTransformer;
use crate::validation::validate_with_fk;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Mapping and per-job configuration saved before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveMappingRequest {
    pub field_mapping: FieldMapping,
    #[serde(default)]
    pub cleaning_rules: Option<CleaningConfig>,
    #[serde(default)]
    pub dedup_strategy: Option<DedupStrategy>,
    #[serde(default)]
    pub dedup_fields: Option<Vec<String>>,
}

/// One source row as it would be written.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewRow {
    pub row_number: usize,
    pub source: Row,
    pub transformed: Row,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewPage {
    pub page: usize,
    pub page_size: usize,
    pub total_rows: usize,
    pub rows: Vec<PreviewRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteSummary {
    pub job_id: DbId,
    pub status: JobStatus,
    pub total_rows: i64,
    pub counters: JobCounters,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackSummary {
    pub job_id: DbId,
    pub deleted: usize,
    pub reverted: usize,
}

impl RollbackSummary {
    pub fn rolled_back(&self) -> usize {
        self.deleted + self.reverted
    }
}

// ---------------------------------------------------------------------------
// Per-row execution outcome
// ---------------------------------------------------------------------------

struct AppliedRow {
    action: RecordAction,
    target_id: Option<DbId>,
    data: Row,
    previous: Option<Row>,
    warnings: Vec<String>,
}

struct RowFailure {
    message: String,
    transformed: Option<Row>,
    warnings: Vec<String>,
}

impl RowFailure {
    fn new(message: impl Into<String>, transformed: &Row, warnings: &[String]) -> Self {
        Self {
            message: message.into(),
            transformed: Some(transformed.clone()),
            warnings: warnings.to_vec(),
        }
    }
}

type RowResult = Result<AppliedRow, RowFailure>;

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct MigrationService {
    jobs: Arc<dyn JobStore>,
    targets: Arc<dyn TargetStore>,
    events: Arc<EventBus>,
    settings: MigrationSettings,
}

impl MigrationService {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        targets: Arc<dyn TargetStore>,
        events: Arc<EventBus>,
        settings: MigrationSettings,
    ) -> Self {
        Self {
            jobs,
            targets,
            events,
            settings,
        }
    }

    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    // -- reads -------------------------------------------------------------

    pub async fn get_job(&self, id: DbId) -> MigrationResult<MigrationJob> {
        self.jobs
            .find_job(id)
            .await?
            .ok_or(MigrationError::NotFound(id))
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> MigrationResult<Vec<MigrationJob>> {
        let filter = JobFilter {
            limit: page_limit(filter.limit),
            offset: filter.offset.max(0),
            ..filter.clone()
        };
        Ok(self.jobs.list_jobs(&filter).await?)
    }

    pub async fn get_progress(&self, id: DbId) -> MigrationResult<JobProgress> {
        Ok(self.get_job(id).await?.progress())
    }

    pub async fn list_records(
        &self,
        id: DbId,
        filter: &RecordFilter,
    ) -> MigrationResult<Vec<MigrationRecord>> {
        self.get_job(id).await?;
        let filter = RecordFilter {
            limit: page_limit(filter.limit),
            offset: filter.offset.max(0),
            ..filter.clone()
        };
        Ok(self.jobs.list_records(id, &filter).await?)
    }

    pub async fn list_rollback_logs(&self, id: DbId) -> MigrationResult<Vec<MigrationRollbackLog>> {
        self.get_job(id).await?;
        Ok(self.jobs.list_rollback_logs(id).await?)
    }

    // -- create / upload / mapping ----------------------------------------

    pub async fn create_job(
        &self,
        input: &CreateMigrationJob,
        created_by: Option<DbId>,
    ) -> MigrationResult<MigrationJob> {
        if input.name.trim().is_empty() {
            return Err(MigrationError::validation("Job name must not be empty"));
        }
        let config = config_for(input.entity_type)?;
        if let Some(fields) = &input.dedup_fields {
            check_dedup_fields(config, fields)?;
        }

        let job = self.jobs.create_job(input, created_by).await?;
        tracing::info!(
            job_id = job.id,
            entity_type = %job.entity_type,
            "Migration job created"
        );
        Ok(job)
    }

    /// Parse and store an uploaded file. Parse failures leave the job as it
    /// was.
    pub async fn upload_file(
        &self,
        id: DbId,
        filename: &str,
        bytes: &[u8],
    ) -> MigrationResult<MigrationJob> {
        let mut job = self.get_job(id).await?;
        ensure_allows(&job, JobOperation::Upload)?;

        if bytes.len() > self.settings.max_upload_bytes {
            return Err(MigrationError::validation(format!(
                "File is {} bytes; the limit is {}",
                bytes.len(),
                self.settings.max_upload_bytes
            )));
        }

        let parsed = parse_file(bytes, filename)?;
        let hash = sha256_hex(bytes);
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        let stored = self
            .settings
            .upload_dir
            .join(format!("{id}_{}{ext}", hash_prefix(&hash)));

        tokio::fs::create_dir_all(&self.settings.upload_dir).await?;
        tokio::fs::write(&stored, bytes).await?;
        let stored = stored.to_string_lossy().into_owned();

        if let Some(old) = job.file_path.take().filter(|old| *old != stored) {
            remove_file_quietly(id, &old).await;
        }

        job.source_type = Some(parsed.source_type.as_str().to_string());
        job.file_name = Some(filename.to_string());
        job.file_path = Some(stored);
        job.file_hash = Some(hash);
        job.file_size = Some(bytes.len() as i64);
        job.total_rows = parsed.total_rows() as i64;
        job.sample_data = Json(parsed.sample(self.settings.sample_size));
        job.detected_columns = parsed.columns;
        job.validation_result = None;
        job.error_message = None;
        transition(&mut job, JobStatus::Uploaded);

        let job = self.save(&job).await?;
        tracing::info!(
            job_id = id,
            total_rows = job.total_rows,
            columns = job.detected_columns.len(),
            "Source file uploaded"
        );
        Ok(job)
    }

    pub async fn suggest_mapping(&self, id: DbId) -> MigrationResult<MappingSuggestion> {
        let job = self.get_job(id).await?;
        if job.detected_columns.is_empty() {
            return Err(MigrationError::InvalidState(format!(
                "job {id} has no uploaded file"
            )));
        }
        let config = config_for(job.entity_type)?;
        Ok(suggest_mapping(&job.detected_columns, config))
    }

    pub async fn save_mapping(
        &self,
        id: DbId,
        request: SaveMappingRequest,
    ) -> MigrationResult<MigrationJob> {
        let mut job = self.get_job(id).await?;
        ensure_allows(&job, JobOperation::SaveMapping)?;
        let config = config_for(job.entity_type)?;

        if request.field_mapping.is_empty() {
            return Err(MigrationError::validation(
                "Mapping must map at least one column",
            ));
        }
        let mut problems = request.field_mapping.check_against(config);
        for (source, _) in request.field_mapping.iter() {
            if !job.detected_columns.iter().any(|c| c == source) {
                problems.push(format!("Column '{source}' is not in the uploaded file"));
            }
        }
        if !problems.is_empty() {
            return Err(MigrationError::validation(problems.join("; ")));
        }

        if let Some(fields) = request.dedup_fields {
            check_dedup_fields(config, &fields)?;
            job.dedup_fields = fields;
        }
        if let Some(strategy) = request.dedup_strategy {
            job.dedup_strategy = strategy;
        }
        if let Some(rules) = request.cleaning_rules {
            job.cleaning_rules = Json(rules);
        }
        job.field_mapping = Some(Json(request.field_mapping));
        job.validation_result = None;
        transition(&mut job, JobStatus::Mapped);

        self.save(&job).await
    }

    // -- validate / preview -----------------------------------------------

    /// Validate every row of the file. Stores the result on the job and moves
    /// a mapped job to `validated` when there are no errors.
    pub async fn validate(&self, id: DbId) -> MigrationResult<ValidationResult> {
        let job = self.get_job(id).await?;
        ensure_allows(&job, JobOperation::Validate)?;
        let mapping = job.mapping().cloned().ok_or(MigrationError::MissingMapping(id))?;
        let config = config_for(job.entity_type)?;
        let parsed = self.read_source(&job).await?;

        // Jobs past the mapping stage keep their status; only the report
        // is refreshed. Status moves are conditional on the status we saw so
        // a concurrent execute or cancel is never overwritten.
        let previous = job.status;
        let moves = matches!(
            previous,
            JobStatus::Mapped | JobStatus::Validating | JobStatus::Validated
        );
        if moves && self.swap_status(&job, previous, JobStatus::Validating).await?.is_none() {
            return Err(MigrationError::InvalidState(format!(
                "job {id} changed state during validation"
            )));
        }

        let outcome = self.run_validation(&job, config, &mapping, &parsed.rows).await;
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                if moves {
                    if let Err(restore_err) =
                        self.swap_status(&job, JobStatus::Validating, previous).await
                    {
                        tracing::warn!(job_id = id, error = %restore_err, "Failed to restore job status");
                    }
                }
                return Err(err);
            }
        };

        self.jobs
            .save_validation_result(id, &result)
            .await?
            .ok_or(MigrationError::NotFound(id))?;
        if moves {
            let next = if result.is_valid() {
                JobStatus::Validated
            } else {
                JobStatus::Mapped
            };
            if self.swap_status(&job, JobStatus::Validating, next).await?.is_none() {
                tracing::warn!(job_id = id, to = %next, "Job left validating before validation finished");
            }
        }

        tracing::info!(
            job_id = id,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Validation finished"
        );
        Ok(result)
    }

    async fn run_validation(
        &self,
        job: &MigrationJob,
        config: &EntityConfig,
        mapping: &FieldMapping,
        rows: &[Row],
    ) -> MigrationResult<ValidationResult> {
        let transformer = RowTransformer::new(config, mapping, &job.cleaning_rules);
        let mut cleaned = Vec::with_capacity(rows.len());
        let mut cleaning_warnings = Vec::new();
        for (index, source) in rows.iter().enumerate() {
            let transformed = transformer.transform(source);
            for warning in &transformed.warnings {
                cleaning_warnings.push(
                    ValidationIssue::new(&warning.field, &warning.message)
                        .at_row(index + 1)
                        .with_value(warning.original.clone()),
                );
            }
            cleaned.push(transformed.data);
        }

        let mut result = validate_with_fk(
            &cleaned,
            config,
            job.dedup_fields.as_slice(),
            self.targets.as_ref(),
            self.settings.max_errors,
        )
        .await?;
        result.warnings.extend(cleaning_warnings);
        result.info.push(format!("{} rows checked", rows.len()));
        Ok(result)
    }

    /// Transformed view of one page of the file.
    pub async fn preview(
        &self,
        id: DbId,
        page: Option<usize>,
        page_size: Option<usize>,
    ) -> MigrationResult<PreviewPage> {
        let job = self.get_job(id).await?;
        ensure_allows(&job, JobOperation::Preview)?;
        let mapping = job.mapping().cloned().ok_or(MigrationError::MissingMapping(id))?;
        let config = config_for(job.entity_type)?;
        let parsed = self.read_source(&job).await?;

        let (start, len) = preview_window(page, page_size);
        let transformer = RowTransformer::new(config, &mapping, &job.cleaning_rules);
        let rows = parsed
            .rows
            .iter()
            .enumerate()
            .skip(start)
            .take(len)
            .map(|(index, source)| {
                let row_number = index + 1;
                let transformed = transformer.transform(source);
                let check = validate_row(&transformed.data, row_number, config);
                let mut warnings = transformed.warning_messages();
                warnings.extend(check.warnings.iter().map(issue_message));
                PreviewRow {
                    row_number,
                    source: source.clone(),
                    transformed: transformed.data,
                    warnings,
                    errors: check.errors.iter().map(issue_message).collect(),
                }
            })
            .collect();

        Ok(PreviewPage {
            page: start / len + 1,
            page_size: len,
            total_rows: parsed.total_rows(),
            rows,
        })
    }

    // -- execute ----------------------------------------------------------

    /// Status and mapping checks shared by `execute` and the task runner.
    pub async fn check_executable(&self, id: DbId) -> MigrationResult<MigrationJob> {
        let job = self.get_job(id).await?;
        ensure_allows(&job, JobOperation::Execute)?;
        if job.mapping().is_none() {
            return Err(MigrationError::MissingMapping(id));
        }
        Ok(job)
    }

    /// Import every row of the file in batches.
    ///
    /// Row problems become `failed` records and never stop the run. A batch
    /// commit failure fails the whole job.
    pub async fn execute(&self, id: DbId, actor: Option<DbId>) -> MigrationResult<ExecuteSummary> {
        let mut job = self.check_executable(id).await?;
        let mapping = job.mapping().cloned().ok_or(MigrationError::MissingMapping(id))?;
        let config = config_for(job.entity_type)?;
        let parsed = self.read_source(&job).await?;

        transition(&mut job, JobStatus::Running);
        job.total_rows = parsed.total_rows() as i64;
        job.started_at = Some(Utc::now());
        job.completed_at = None;
        job.rolled_back_at = None;
        job.error_message = None;
        self.jobs.reset_counters(id).await?;
        let mut job = self.save(&job).await?;
        self.publish(JobEventKind::StatusChanged, &job);
        tracing::info!(job_id = id, ?actor, total_rows = job.total_rows, "Migration started");

        let cleaning = job.cleaning_rules.0.clone();
        let transformer = RowTransformer::new(config, &mapping, &cleaning);
        let batch_size = self.settings.batch_size.max(1);

        for (batch_index, chunk) in parsed.rows.chunks(batch_size).enumerate() {
            let mut records = Vec::with_capacity(chunk.len());
            let mut delta = JobCounters::default();
            for (offset, source) in chunk.iter().enumerate() {
                let row_number = batch_index * batch_size + offset + 1;
                let outcome = self.apply_row(&transformer, &job, row_number, source).await;
                let record = into_record(config, row_number, source, outcome);
                delta.record(record.action);
                records.push(record);
            }

            match self.jobs.commit_batch(id, &records, &delta).await {
                Ok(updated) => {
                    job = updated;
                    tracing::debug!(
                        job_id = id,
                        batch = batch_index + 1,
                        processed_rows = job.processed_rows,
                        "Batch committed"
                    );
                    self.publish(JobEventKind::Progress, &job);
                }
                Err(err) => {
                    tracing::error!(job_id = id, batch = batch_index + 1, error = %err, "Batch commit failed");
                    self.fail_job(job, format!("Batch {} failed to commit: {err}", batch_index + 1))
                        .await;
                    return Err(err.into());
                }
            }
        }

        transition(&mut job, JobStatus::Completed);
        job.completed_at = Some(Utc::now());
        let job = self.save(&job).await?;
        self.publish(JobEventKind::StatusChanged, &job);

        let counters = job.counters();
        tracing::info!(
            job_id = id,
            created = counters.created,
            updated = counters.updated,
            skipped = counters.skipped,
            failed = counters.failed,
            "Migration completed"
        );
        Ok(ExecuteSummary {
            job_id: id,
            status: job.status,
            total_rows: job.total_rows,
            counters,
        })
    }

    async fn fail_job(&self, mut job: MigrationJob, message: String) {
        transition(&mut job, JobStatus::Failed);
        job.error_message = Some(message);
        job.completed_at = Some(Utc::now());
        match self.save(&job).await {
            Ok(saved) => self.publish(JobEventKind::StatusChanged, &saved),
            Err(err) => {
                tracing::error!(job_id = job.id, error = %err, "Failed to mark job as failed");
            }
        }
    }

    async fn apply_row(
        &self,
        transformer: &RowTransformer<'_>,
        job: &MigrationJob,
        row_number: usize,
        source: &Row,
    ) -> RowResult {
        let config = transformer.config();
        let transformed = transformer.transform(source);
        let mut warnings = transformed.warning_messages();
        let mut data = transformed.data;

        let check = validate_row(&data, row_number, config);
        warnings.extend(check.warnings.iter().map(issue_message));
        if !check.is_valid() {
            let message = check
                .errors
                .iter()
                .map(issue_message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RowFailure::new(message, &data, &warnings));
        }

        for field in config.foreign_keys() {
            let Some((target, lookup_fields)) = field.foreign_key() else {
                continue;
            };
            let Some(raw) = data.get(field.name).and_then(value_text) else {
                continue;
            };
            let Some(target_config) = entity_config(target) else {
                continue;
            };
            let resolved = self
                .targets
                .resolve_reference(target_config, lookup_fields, &raw)
                .await
                .map_err(|e| RowFailure::new(e.to_string(), &data, &warnings))?;
            match resolved {
                Some(target_id) => {
                    data.insert(field.name.to_string(), Value::from(target_id));
                }
                None if field.required => {
                    return Err(RowFailure::new(
                        format!("{}: no {} matches '{raw}'", field.name, target.label()),
                        &data,
                        &warnings,
                    ));
                }
                None => {
                    warnings.push(format!(
                        "{}: no {} matches '{raw}', left empty",
                        field.name,
                        target.label()
                    ));
                    data.insert(field.name.to_string(), Value::Null);
                }
            }
        }

        let data = transformer.coerce_for_storage(&data);

        let existing = self
            .find_existing(config, job, &data)
            .await
            .map_err(|e| RowFailure::new(e.to_string(), &data, &warnings))?;
        if let Some((existing_id, existing_row)) = existing {
            return self
                .apply_dedup(config, job, existing_id, existing_row, data, warnings)
                .await;
        }

        let target_id = self
            .targets
            .insert(config, &data)
            .await
            .map_err(|e| RowFailure::new(e.to_string(), &data, &warnings))?;
        Ok(AppliedRow {
            action: RecordAction::Created,
            target_id: Some(target_id),
            previous: Some(data.clone()),
            data,
            warnings,
        })
    }

    /// Existing target row matching the job's dedup fields, if any.
    async fn find_existing(
        &self,
        config: &EntityConfig,
        job: &MigrationJob,
        data: &Row,
    ) -> Result<Option<(DbId, Row)>, sqlx::Error> {
        let criteria: Row = job
            .dedup_fields
            .iter()
            .filter_map(|f| {
                data.get(f)
                    .filter(|v| value_text(v).is_some())
                    .map(|v| (f.clone(), v.clone()))
            })
            .collect();
        if criteria.is_empty() {
            return Ok(None);
        }
        self.targets.find_by_fields(config, &criteria).await
    }

    async fn apply_dedup(
        &self,
        config: &EntityConfig,
        job: &MigrationJob,
        existing_id: DbId,
        existing: Row,
        data: Row,
        mut warnings: Vec<String>,
    ) -> RowResult {
        let skipped = |data: Row, mut warnings: Vec<String>| -> RowResult {
            warnings.push(format!(
                "Matches existing {} {existing_id}; skipped",
                config.entity_type
            ));
            Ok(AppliedRow {
                action: RecordAction::Skipped,
                target_id: Some(existing_id),
                data,
                previous: None,
                warnings,
            })
        };

        let changes: Row = match job.dedup_strategy {
            _ if !config.supports_upsert => return skipped(data, warnings),
            DedupStrategy::Skip => return skipped(data, warnings),
            DedupStrategy::Update => data.clone(),
            DedupStrategy::Merge => data
                .iter()
                .filter(|(key, value)| {
                    value_text(value).is_some()
                        && existing.get(*key).and_then(value_text).is_none()
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        if changes.is_empty() {
            return skipped(data, warnings);
        }

        if let Some(table) = HierarchyTable::from_str(config.entity_type.as_str()) {
            if let Some(parent_id) = changes.get(table.parent_column()).and_then(Value::as_i64) {
                let allowed = self
                    .targets
                    .validate_no_circular_reference(table, existing_id, Some(parent_id))
                    .await
                    .map_err(|e| RowFailure::new(e.to_string(), &data, &warnings))?;
                if !allowed {
                    return Err(RowFailure::new(
                        format!(
                            "{}: setting parent {parent_id} would create a circular reference",
                            table.parent_column()
                        ),
                        &data,
                        &warnings,
                    ));
                }
            }
        }

        let previous: Row = changes
            .keys()
            .map(|k| (k.clone(), existing.get(k).cloned().unwrap_or(Value::Null)))
            .collect();
        let updated = self
            .targets
            .update(config, existing_id, &changes)
            .await
            .map_err(|e| RowFailure::new(e.to_string(), &data, &warnings))?;
        if !updated {
            return Err(RowFailure::new(
                format!("{} {existing_id} disappeared before it could be updated", config.entity_type),
                &data,
                &warnings,
            ));
        }

        if job.dedup_strategy == DedupStrategy::Merge {
            warnings.push(format!(
                "Filled {} empty field(s) of existing {} {existing_id}",
                changes.len(),
                config.entity_type
            ));
        }
        Ok(AppliedRow {
            action: RecordAction::Updated,
            target_id: Some(existing_id),
            data,
            previous: Some(previous),
            warnings,
        })
    }

    // -- rollback ---------------------------------------------------------

    pub async fn check_rollbackable(&self, id: DbId) -> MigrationResult<MigrationJob> {
        let job = self.get_job(id).await?;
        ensure_allows(&job, JobOperation::Rollback)?;
        let config = config_for(job.entity_type)?;
        if !config.supports_rollback {
            return Err(MigrationError::InvalidState(format!(
                "{} imports cannot be rolled back",
                config.label
            )));
        }
        Ok(job)
    }

    /// Reverse every rollback-eligible record, latest row first: created
    /// rows are deleted, updated rows restored from their snapshot.
    ///
    /// Records that cannot be reversed stay eligible and the job stays
    /// `completed` so the rollback can be retried.
    pub async fn rollback(&self, id: DbId, actor: Option<DbId>) -> MigrationResult<RollbackSummary> {
        let mut job = self.check_rollbackable(id).await?;
        let config = config_for(job.entity_type)?;
        let candidates = self.jobs.rollback_candidates(id).await?;

        let mut summary = RollbackSummary {
            job_id: id,
            ..Default::default()
        };
        let mut failed = 0;
        for record in &candidates {
            match self.reverse_record(config, &job, record, actor).await {
                Ok(RollbackAction::Deleted) => summary.deleted += 1,
                Ok(RollbackAction::Reverted) => summary.reverted += 1,
                Err(err) => {
                    failed += 1;
                    tracing::warn!(
                        job_id = id,
                        record_id = record.id,
                        row_number = record.row_number,
                        error = %err,
                        "Could not reverse migrated row"
                    );
                }
            }
        }

        if failed > 0 {
            job.error_message = Some(format!(
                "Rollback incomplete: {failed} of {} records could not be reversed",
                candidates.len()
            ));
            let job = self.save(&job).await?;
            self.publish(JobEventKind::RolledBack, &job);
            return Err(MigrationError::RollbackIncomplete {
                job_id: id,
                rolled_back: summary.rolled_back(),
                failed,
            });
        }

        transition(&mut job, JobStatus::RolledBack);
        job.rolled_back_at = Some(Utc::now());
        job.error_message = None;
        let job = self.save(&job).await?;
        self.publish(JobEventKind::RolledBack, &job);
        tracing::info!(
            job_id = id,
            ?actor,
            deleted = summary.deleted,
            reverted = summary.reverted,
            "Migration rolled back"
        );
        Ok(summary)
    }

    async fn reverse_record(
        &self,
        config: &EntityConfig,
        job: &MigrationJob,
        record: &MigrationRecord,
        actor: Option<DbId>,
    ) -> MigrationResult<RollbackAction> {
        let action = record.action.rollback_action().ok_or_else(|| {
            MigrationError::InvalidState(format!("record {} is not reversible", record.id))
        })?;
        let target_id = record.target_record_id.ok_or_else(|| {
            MigrationError::InvalidState(format!("record {} has no target row", record.id))
        })?;

        match action {
            RollbackAction::Deleted => {
                if !self.targets.delete(config, target_id).await? {
                    tracing::debug!(job_id = job.id, target_id, "Target row already gone");
                }
            }
            RollbackAction::Reverted => {
                let Some(Json(previous)) = record.previous_data.as_ref() else {
                    return Err(MigrationError::InvalidState(format!(
                        "record {} has no previous data to restore",
                        record.id
                    )));
                };
                if !self.targets.update(config, target_id, previous).await? {
                    return Err(CoreError::NotFound {
                        entity: config.entity_type.as_str(),
                        id: target_id,
                    }
                    .into());
                }
            }
        }

        self.jobs
            .record_rollback(&NewRollbackLog {
                job_id: job.id,
                record_id: record.id,
                entity_type: job.entity_type,
                target_record_id: target_id,
                action,
                previous_data: record.previous_data.clone().map(|Json(p)| p),
                rolled_back_by: actor,
            })
            .await?;
        Ok(action)
    }

    // -- cancel / delete --------------------------------------------------

    pub async fn cancel_job(&self, id: DbId) -> MigrationResult<MigrationJob> {
        let mut job = self.get_job(id).await?;
        ensure_allows(&job, JobOperation::Cancel)?;
        transition(&mut job, JobStatus::Cancelled);
        job.completed_at = Some(Utc::now());
        let job = self.save(&job).await?;
        self.publish(JobEventKind::StatusChanged, &job);
        Ok(job)
    }

    /// Delete a job, its records, and its stored file.
    pub async fn delete_job(&self, id: DbId) -> MigrationResult<()> {
        let job = self.get_job(id).await?;
        ensure_allows(&job, JobOperation::Delete)?;
        if !self.jobs.delete_job(id).await? {
            return Err(MigrationError::NotFound(id));
        }
        if let Some(path) = job.file_path.as_deref() {
            remove_file_quietly(id, path).await;
        }
        tracing::info!(job_id = id, "Migration job deleted");
        Ok(())
    }

    // -- helpers ----------------------------------------------------------

    async fn save(&self, job: &MigrationJob) -> MigrationResult<MigrationJob> {
        self.jobs
            .save_job(job)
            .await?
            .ok_or(MigrationError::NotFound(job.id))
    }

    /// Conditional status move. `None` when the stored status is not `from`.
    async fn swap_status(
        &self,
        job: &MigrationJob,
        from: JobStatus,
        to: JobStatus,
    ) -> MigrationResult<Option<MigrationJob>> {
        let swapped = self.jobs.swap_status(job.id, from, to).await?;
        if swapped.is_some() {
            tracing::info!(
                job_id = job.id,
                entity_type = %job.entity_type,
                from = %from,
                to = %to,
                "Migration job status changed"
            );
        }
        Ok(swapped)
    }

    async fn read_source(&self, job: &MigrationJob) -> MigrationResult<ParsedFile> {
        let path = job.file_path.as_deref().ok_or_else(|| {
            MigrationError::InvalidState(format!("job {} has no uploaded file", job.id))
        })?;
        let bytes = tokio::fs::read(path).await?;
        let parsed = match job
            .source_type()
            .or_else(|| job.file_name.as_deref().and_then(SourceType::from_filename))
        {
            Some(source_type) => parse_bytes(&bytes, source_type)?,
            None => parse_file(&bytes, path)?,
        };
        Ok(parsed)
    }

    fn publish(&self, kind: JobEventKind, job: &MigrationJob) {
        let payload = serde_json::to_value(job.progress()).unwrap_or_default();
        self.events
            .publish(JobEvent::new(kind, job.id, job.entity_type, job.status).with_payload(payload));
    }
}

fn config_for(entity_type: EntityType) -> MigrationResult<&'static EntityConfig> {
    entity_config(entity_type).ok_or_else(|| {
        CoreError::Internal(format!("entity type {entity_type} is not registered")).into()
    })
}

fn ensure_allows(job: &MigrationJob, op: JobOperation) -> MigrationResult<()> {
    job.status.ensure_allows(op).map_err(|err| match err {
        CoreError::InvalidState(message) => MigrationError::InvalidState(message),
        other => other.into(),
    })
}

fn check_dedup_fields(config: &EntityConfig, fields: &[String]) -> MigrationResult<()> {
    let unknown: Vec<&str> = fields
        .iter()
        .filter(|f| config.field(f).is_none())
        .map(String::as_str)
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(MigrationError::validation(format!(
            "Unknown dedup field(s) for {}: {}",
            config.entity_type,
            unknown.join(", ")
        )))
    }
}

fn transition(job: &mut MigrationJob, to: JobStatus) {
    tracing::info!(
        job_id = job.id,
        entity_type = %job.entity_type,
        from = %job.status,
        to = %to,
        "Migration job status changed"
    );
    job.status = to;
}

/// Non-positive limits mean "use the default page size".
fn page_limit(limit: i64) -> i64 {
    clamp_limit(Some(limit).filter(|l| *l > 0), DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT)
}

fn issue_message(issue: &ValidationIssue) -> String {
    format!("{}: {}", issue.field, issue.message)
}

fn into_record(
    config: &EntityConfig,
    row_number: usize,
    source: &Row,
    outcome: RowResult,
) -> NewMigrationRecord {
    match outcome {
        Ok(applied) => NewMigrationRecord {
            row_number: row_number as i32,
            source_data: source.clone(),
            transformed_data: Some(applied.data),
            target_record_id: applied.target_id,
            target_record_type: Some(config.entity_type),
            action: applied.action,
            previous_data: applied.previous,
            can_rollback: applied.action.is_reversible() && config.supports_rollback,
            error_message: None,
            validation_warnings: applied.warnings,
        },
        Err(failure) => {
            tracing::debug!(row_number, error = %failure.message, "Row failed");
            NewMigrationRecord {
                row_number: row_number as i32,
                source_data: source.clone(),
                transformed_data: failure.transformed,
                target_record_id: None,
                target_record_type: None,
                action: RecordAction::Failed,
                previous_data: None,
                can_rollback: false,
                error_message: Some(failure.message),
                validation_warnings: failure.warnings,
            }
        }
    }
}

async fn remove_file_quietly(job_id: DbId, path: &str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(job_id, path, "Removed source file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(job_id, path, error = %err, "Failed to remove source file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryJobStore, MemoryTargetStore};
    use crate::store::StoreResult;
    use assert_matches::assert_matches;
    use std::collections::HashSet;
    use bizsuite_events::JobEventKind;
    use serde_json::json;
    use tempfile::TempDir;

    const CONTACTS_CSV: &str = "Name,Email,Phone\n\
        ada okafor,ada@example.com,08031234567\n\
        bob smith,bob@@x,08051234567\n\
        Chidi Eze,chidi@example.com,\n";

    struct Harness {
        service: MigrationService,
        jobs: Arc<MemoryJobStore>,
        targets: Arc<MemoryTargetStore>,
        events: Arc<EventBus>,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let settings = MigrationSettings {
            upload_dir: dir.path().to_path_buf(),
            batch_size: 2,
            ..MigrationSettings::default()
        };
        let jobs = Arc::new(MemoryJobStore::new());
        let targets = Arc::new(MemoryTargetStore::new());
        let events = Arc::new(EventBus::default());
        let service = MigrationService::new(
            Arc::clone(&jobs) as Arc<dyn JobStore>,
            Arc::clone(&targets) as Arc<dyn TargetStore>,
            Arc::clone(&events),
            settings,
        );
        Harness {
            service,
            jobs,
            targets,
            events,
            _dir: dir,
        }
    }

    fn mapping(pairs: &[(&str, &str)]) -> FieldMapping {
        pairs.iter().map(|(s, t)| (s.to_string(), t.to_string())).collect()
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn contacts_input(strategy: DedupStrategy, dedup_fields: &[&str]) -> CreateMigrationJob {
        CreateMigrationJob {
            name: "Contacts import".into(),
            entity_type: EntityType::Contacts,
            dedup_strategy: Some(strategy),
            dedup_fields: Some(dedup_fields.iter().map(|f| f.to_string()).collect()),
            cleaning_rules: None,
        }
    }

    async fn mapped_job(h: &Harness, csv: &str, input: CreateMigrationJob) -> MigrationJob {
        let job = h.service.create_job(&input, Some(7)).await.unwrap();
        h.service
            .upload_file(job.id, "contacts.csv", csv.as_bytes())
            .await
            .unwrap();
        h.service
            .save_mapping(
                job.id,
                SaveMappingRequest {
                    field_mapping: mapping(&[("Name", "name"), ("Email", "email"), ("Phone", "phone")]),
                    cleaning_rules: None,
                    dedup_strategy: None,
                    dedup_fields: None,
                },
            )
            .await
            .unwrap()
    }

    fn assert_counters_consistent(job: &MigrationJob) {
        assert_eq!(
            job.processed_rows,
            job.created_records + job.updated_records + job.skipped_records + job.failed_records
        );
        assert!(job.processed_rows <= job.total_rows);
    }

    #[tokio::test]
    async fn end_to_end_import_creates_every_row() {
        let h = harness();
        let job = mapped_job(&h, CONTACTS_CSV, contacts_input(DedupStrategy::Skip, &[])).await;
        assert_eq!(job.status, JobStatus::Mapped);
        assert_eq!(job.total_rows, 3);
        assert_eq!(job.detected_columns, vec!["Name", "Email", "Phone"]);

        let result = h.service.validate(job.id).await.unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "email" && w.row == Some(2)));
        assert_eq!(h.service.get_job(job.id).await.unwrap().status, JobStatus::Validated);

        let mut events = h.events.subscribe();
        let summary = h.service.execute(job.id, Some(7)).await.unwrap();
        assert_eq!(summary.status, JobStatus::Completed);
        assert_eq!(summary.counters.created, 3);
        assert_eq!(summary.counters.failed, 0);

        let stored = h.targets.rows(EntityType::Contacts);
        let names: Vec<_> = stored.values().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("Ada Okafor"), json!("Bob Smith"), json!("Chidi Eze")]);
        assert!(stored.values().any(|r| r["phone"] == json!("+2348031234567")));

        let job = h.service.get_job(job.id).await.unwrap();
        assert_counters_consistent(&job);
        assert_eq!(job.processed_rows, 3);
        assert!(job.started_at.is_some() && job.completed_at.is_some());

        let records = h
            .service
            .list_records(job.id, &RecordFilter::default())
            .await
            .unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.action == RecordAction::Created && r.can_rollback));
        assert!(!records[1].validation_warnings.0.is_empty());

        let mut progress = 0;
        let mut last = None;
        while let Ok(event) = events.try_recv() {
            if event.kind == JobEventKind::Progress {
                progress += 1;
            }
            last = Some(event);
        }
        // Two batches of at most two rows.
        assert_eq!(progress, 2);
        assert_eq!(last.map(|e| e.status), Some(JobStatus::Completed));
    }

    #[tokio::test]
    async fn execute_before_mapping_is_rejected() {
        let h = harness();
        let job = h
            .service
            .create_job(&contacts_input(DedupStrategy::Skip, &[]), None)
            .await
            .unwrap();
        assert_matches!(
            h.service.execute(job.id, None).await,
            Err(MigrationError::InvalidState(_))
        );

        h.service
            .upload_file(job.id, "contacts.csv", CONTACTS_CSV.as_bytes())
            .await
            .unwrap();
        assert_matches!(
            h.service.execute(job.id, None).await,
            Err(MigrationError::InvalidState(_))
        );
        let job = h.service.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Uploaded);
        assert_eq!(job.processed_rows, 0);
        assert!(h.targets.rows(EntityType::Contacts).is_empty());
    }

    #[tokio::test]
    async fn invalid_rows_fail_individually() {
        let h = harness();
        let csv = "Name,Email,Phone,Company\n\
            Ada,ada@example.com,,Globex\n\
            ,nobody@example.com,,\n";
        let job = h
            .service
            .create_job(&contacts_input(DedupStrategy::Skip, &[]), None)
            .await
            .unwrap();
        h.service.upload_file(job.id, "c.csv", csv.as_bytes()).await.unwrap();
        h.service
            .save_mapping(
                job.id,
                SaveMappingRequest {
                    field_mapping: mapping(&[
                        ("Name", "name"),
                        ("Email", "email"),
                        ("Company", "customer_id"),
                    ]),
                    cleaning_rules: None,
                    dedup_strategy: None,
                    dedup_fields: None,
                },
            )
            .await
            .unwrap();

        let summary = h.service.execute(job.id, None).await.unwrap();
        assert_eq!(summary.counters.created, 1);
        assert_eq!(summary.counters.failed, 1);

        let records = h
            .service
            .list_records(job.id, &RecordFilter::default())
            .await
            .unwrap();
        let created = &records[0];
        assert!(created
            .validation_warnings
            .0
            .iter()
            .any(|w| w.starts_with("customer_id: ")));
        let (_, stored) = h.targets.rows(EntityType::Contacts).into_iter().next().unwrap();
        assert_eq!(stored["customer_id"], Value::Null);

        let failed = &records[1];
        assert_eq!(failed.action, RecordAction::Failed);
        assert!(!failed.can_rollback);
        assert!(failed.error_message.as_deref().unwrap().contains("name"));
    }

    #[tokio::test]
    async fn required_reference_resolves_by_lookup_field() {
        let h = harness();
        let acme = h.targets.seed(
            EntityType::Customers,
            row(json!({"name": "Acme Ltd", "customer_code": "C-001"})),
        );
        let csv = "Title,Customer,Stage\nRenewal,c-001,Proposal\nUpsell,Initech,proposal\n";
        let input = CreateMigrationJob {
            name: "Pipeline".into(),
            entity_type: EntityType::Opportunities,
            dedup_strategy: None,
            dedup_fields: None,
            cleaning_rules: None,
        };
        let job = h.service.create_job(&input, None).await.unwrap();
        h.service.upload_file(job.id, "deals.csv", csv.as_bytes()).await.unwrap();
        h.service
            .save_mapping(
                job.id,
                SaveMappingRequest {
                    field_mapping: mapping(&[
                        ("Title", "title"),
                        ("Customer", "customer_id"),
                        ("Stage", "stage"),
                    ]),
                    cleaning_rules: None,
                    dedup_strategy: None,
                    dedup_fields: None,
                },
            )
            .await
            .unwrap();

        let summary = h.service.execute(job.id, None).await.unwrap();
        assert_eq!(summary.counters.created, 1);
        assert_eq!(summary.counters.failed, 1);
        let (_, deal) = h
            .targets
            .rows(EntityType::Opportunities)
            .into_iter()
            .next()
            .unwrap();
        assert_eq!(deal["customer_id"], json!(acme));
        assert_eq!(deal["stage"], json!("proposal"));
    }

    #[tokio::test]
    async fn rollback_deletes_created_rows() {
        let h = harness();
        let job = mapped_job(&h, CONTACTS_CSV, contacts_input(DedupStrategy::Skip, &[])).await;
        h.service.execute(job.id, None).await.unwrap();

        let summary = h.service.rollback(job.id, Some(7)).await.unwrap();
        assert_eq!(summary.deleted, 3);
        assert_eq!(summary.reverted, 0);
        assert!(h.targets.rows(EntityType::Contacts).is_empty());

        let job = h.service.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::RolledBack);
        assert!(job.rolled_back_at.is_some());

        let logs = h.service.list_rollback_logs(job.id).await.unwrap();
        assert_eq!(logs.len(), 3);
        assert!(logs.iter().all(|l| l.action == RollbackAction::Deleted));
        assert!(logs.iter().all(|l| l.rolled_back_by == Some(7)));

        let records = h
            .service
            .list_records(job.id, &RecordFilter::default())
            .await
            .unwrap();
        assert!(records.iter().all(|r| !r.can_rollback));

        assert_matches!(
            h.service.rollback(job.id, None).await,
            Err(MigrationError::InvalidState(_))
        );
    }

    #[tokio::test]
    async fn partial_rollback_keeps_job_completed() {
        let h = harness();
        let job = mapped_job(&h, CONTACTS_CSV, contacts_input(DedupStrategy::Skip, &[])).await;
        h.service.execute(job.id, None).await.unwrap();
        let stuck = *h.targets.rows(EntityType::Contacts).keys().next().unwrap();
        h.targets.protect(EntityType::Contacts, stuck);

        let err = h.service.rollback(job.id, None).await.unwrap_err();
        assert_matches!(
            err,
            MigrationError::RollbackIncomplete {
                rolled_back: 2,
                failed: 1,
                ..
            }
        );

        let job = h.service.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error_message.is_some());
        assert_eq!(h.service.list_rollback_logs(job.id).await.unwrap().len(), 2);
        let remaining = h.jobs.rollback_candidates(job.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].target_record_id, Some(stuck));
    }

    #[tokio::test]
    async fn dedup_update_is_reverted_on_rollback() {
        let h = harness();
        let existing = h.targets.seed(
            EntityType::Contacts,
            row(json!({"name": "Ada O.", "email": "ada@example.com", "phone": "+2340000000000"})),
        );
        let job = mapped_job(
            &h,
            CONTACTS_CSV,
            contacts_input(DedupStrategy::Update, &["email"]),
        )
        .await;

        let summary = h.service.execute(job.id, None).await.unwrap();
        assert_eq!(summary.counters.updated, 1);
        assert_eq!(summary.counters.created, 2);
        let updated = &h.targets.rows(EntityType::Contacts)[&existing];
        assert_eq!(updated["name"], json!("Ada Okafor"));
        assert_eq!(updated["phone"], json!("+2348031234567"));

        let records = h
            .service
            .list_records(job.id, &RecordFilter::default())
            .await
            .unwrap();
        let previous = records[0].previous_data.as_ref().unwrap();
        assert_eq!(previous.0["phone"], json!("+2340000000000"));

        let summary = h.service.rollback(job.id, None).await.unwrap();
        assert_eq!(summary.reverted, 1);
        assert_eq!(summary.deleted, 2);
        let rows = h.targets.rows(EntityType::Contacts);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[&existing]["name"], json!("Ada O."));
        assert_eq!(rows[&existing]["phone"], json!("+2340000000000"));

        // Log entries carry the record's snapshot, never the imported values.
        let logs = h.service.list_rollback_logs(job.id).await.unwrap();
        assert_eq!(logs.len(), 3);
        let reverted = logs
            .iter()
            .find(|l| l.action == RollbackAction::Reverted)
            .unwrap();
        assert_eq!(reverted.target_record_id, existing);
        let restored = &reverted.previous_data.as_ref().unwrap().0;
        assert_eq!(restored["name"], json!("Ada O."));
        assert_eq!(restored["phone"], json!("+2340000000000"));
        for log in logs.iter().filter(|l| l.action == RollbackAction::Deleted) {
            let record = records
                .iter()
                .find(|r| Some(r.id) == log.record_id)
                .unwrap();
            assert_eq!(record.action, RecordAction::Created);
            assert_eq!(
                log.previous_data.as_ref().map(|p| &p.0),
                record.previous_data.as_ref().map(|p| &p.0)
            );
        }
    }

    #[tokio::test]
    async fn dedup_update_rejects_a_parent_that_closes_a_cycle() {
        let h = harness();
        let existing = h.targets.seed(
            EntityType::Contacts,
            row(json!({"name": "Ada Okafor", "email": "ada@example.com"})),
        );
        let child = h.targets.seed(
            EntityType::Contacts,
            row(json!({"name": "Kemi Okafor", "email": "kemi@example.com", "parent_contact_id": existing})),
        );

        let input = contacts_input(DedupStrategy::Update, &["email"]);
        let job = h.service.create_job(&input, None).await.unwrap();
        let csv = "Name,Email,Reports To
Ada Okafor,ada@example.com,kemi@example.com
";
        h.service
            .upload_file(job.id, "contacts.csv", csv.as_bytes())
            .await
            .unwrap();
        h.service
            .save_mapping(
                job.id,
                SaveMappingRequest {
                    field_mapping: mapping(&[
                        ("Name", "name"),
                        ("Email", "email"),
                        ("Reports To", "parent_contact_id"),
                    ]),
                    cleaning_rules: None,
                    dedup_strategy: None,
                    dedup_fields: None,
                },
            )
            .await
            .unwrap();

        let summary = h.service.execute(job.id, None).await.unwrap();
        assert_eq!(summary.counters.failed, 1);
        assert_eq!(summary.counters.updated, 0);

        let records = h
            .service
            .list_records(job.id, &RecordFilter::default())
            .await
            .unwrap();
        assert_eq!(records[0].action, RecordAction::Failed);
        assert!(!records[0].can_rollback);
        assert!(records[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("circular reference"));

        let rows = h.targets.rows(EntityType::Contacts);
        assert!(rows[&existing].get("parent_contact_id").is_none());
        assert_eq!(rows[&child]["parent_contact_id"], json!(existing));
    }

    #[tokio::test]
    async fn dedup_skip_leaves_existing_row_alone() {
        let h = harness();
        let existing = h.targets.seed(
            EntityType::Contacts,
            row(json!({"name": "Ada O.", "email": "ADA@example.com"})),
        );
        let job = mapped_job(&h, CONTACTS_CSV, contacts_input(DedupStrategy::Skip, &["email"])).await;

        let summary = h.service.execute(job.id, None).await.unwrap();
        assert_eq!(summary.counters.skipped, 1);
        assert_eq!(summary.counters.created, 2);
        assert_eq!(h.targets.rows(EntityType::Contacts)[&existing]["name"], json!("Ada O."));

        let records = h
            .service
            .list_records(job.id, &RecordFilter::default())
            .await
            .unwrap();
        assert_eq!(records[0].action, RecordAction::Skipped);
        assert_eq!(records[0].target_record_id, Some(existing));
        assert!(!records[0].can_rollback);
    }

    #[tokio::test]
    async fn dedup_merge_fills_only_empty_fields() {
        let h = harness();
        let existing = h.targets.seed(
            EntityType::Contacts,
            row(json!({"name": "Ada O.", "email": "ada@example.com", "phone": null})),
        );
        let job = mapped_job(&h, CONTACTS_CSV, contacts_input(DedupStrategy::Merge, &["email"])).await;

        let summary = h.service.execute(job.id, None).await.unwrap();
        assert_eq!(summary.counters.updated, 1);
        let merged = &h.targets.rows(EntityType::Contacts)[&existing];
        assert_eq!(merged["name"], json!("Ada O."));
        assert_eq!(merged["phone"], json!("+2348031234567"));

        let records = h
            .service
            .list_records(job.id, &RecordFilter::default())
            .await
            .unwrap();
        let previous = &records[0].previous_data.as_ref().unwrap().0;
        assert_eq!(previous.keys().collect::<Vec<_>>(), vec!["phone"]);
    }

    #[tokio::test]
    async fn batch_commit_failure_fails_the_job() {
        let h = harness();
        let job = mapped_job(&h, CONTACTS_CSV, contacts_input(DedupStrategy::Skip, &[])).await;
        h.jobs.fail_batch_commits();

        assert_matches!(
            h.service.execute(job.id, None).await,
            Err(MigrationError::Database(_))
        );
        let job = h.service.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("Batch 1"));
        assert!(job.completed_at.is_some());
        assert_eq!(job.processed_rows, 0);
    }

    #[tokio::test]
    async fn upload_rejects_spreadsheets_and_keeps_status() {
        let h = harness();
        let job = h
            .service
            .create_job(&contacts_input(DedupStrategy::Skip, &[]), None)
            .await
            .unwrap();
        assert_matches!(
            h.service.upload_file(job.id, "book.xlsx", b"PK\x03\x04").await,
            Err(MigrationError::Parse(_))
        );
        let job = h.service.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.file_path.is_none());
    }

    #[tokio::test]
    async fn reupload_replaces_stored_file() {
        let h = harness();
        let job = h
            .service
            .create_job(&contacts_input(DedupStrategy::Skip, &[]), None)
            .await
            .unwrap();
        let first = h
            .service
            .upload_file(job.id, "a.csv", b"Name\nAda\n")
            .await
            .unwrap();
        let second = h
            .service
            .upload_file(job.id, "b.json", br#"[{"Name": "Bola"}, {"Name": "Chidi"}]"#)
            .await
            .unwrap();

        let first_path = first.file_path.unwrap();
        let second_path = second.file_path.unwrap();
        assert_ne!(first_path, second_path);
        assert!(!Path::new(&first_path).exists());
        assert!(Path::new(&second_path).exists());
        assert!(second_path.ends_with(".json"));
        assert_eq!(second.source_type.as_deref(), Some("json"));
        assert_eq!(second.total_rows, 2);
        assert_eq!(second.sample_data.0.len(), 2);
    }

    #[tokio::test]
    async fn save_mapping_rejects_unknown_columns_and_fields() {
        let h = harness();
        let job = h
            .service
            .create_job(&contacts_input(DedupStrategy::Skip, &[]), None)
            .await
            .unwrap();
        h.service
            .upload_file(job.id, "contacts.csv", CONTACTS_CSV.as_bytes())
            .await
            .unwrap();

        let request = |pairs: &[(&str, &str)]| SaveMappingRequest {
            field_mapping: mapping(pairs),
            cleaning_rules: None,
            dedup_strategy: None,
            dedup_fields: None,
        };
        for pairs in [
            &[("Nickname", "name")][..],
            &[("Name", "nickname")][..],
            &[][..],
        ] {
            assert_matches!(
                h.service.save_mapping(job.id, request(pairs)).await,
                Err(MigrationError::Core(CoreError::Validation(_)))
            );
        }
        assert_eq!(h.service.get_job(job.id).await.unwrap().status, JobStatus::Uploaded);
    }

    #[tokio::test]
    async fn failed_validation_keeps_job_mapped() {
        let h = harness();
        let csv = "Name,Email,Phone\nAda,ada@example.com,\n,ghost@example.com,\n";
        let job = mapped_job(&h, csv, contacts_input(DedupStrategy::Skip, &[])).await;

        let result = h.service.validate(job.id).await.unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].row, Some(2));

        let job = h.service.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Mapped);
        assert_eq!(job.validation_result.unwrap().0, result);
    }

    /// Target store that moves one job to `running` while validation is
    /// counting dependency rows, as a concurrent execute would.
    struct StatusFlippingTargets {
        inner: MemoryTargetStore,
        jobs: Arc<MemoryJobStore>,
        job_id: DbId,
    }

    #[async_trait::async_trait]
    impl TargetStore for StatusFlippingTargets {
        async fn existing_values(
            &self,
            config: &EntityConfig,
            field: &str,
            values: &[String],
        ) -> StoreResult<HashSet<String>> {
            self.inner.existing_values(config, field, values).await
        }

        async fn count_rows(&self, config: &EntityConfig) -> StoreResult<i64> {
            self.jobs.force_status(self.job_id, JobStatus::Running);
            self.inner.count_rows(config).await
        }

        async fn find_by_fields(
            &self,
            config: &EntityConfig,
            criteria: &Row,
        ) -> StoreResult<Option<(DbId, Row)>> {
            self.inner.find_by_fields(config, criteria).await
        }

        async fn resolve_reference(
            &self,
            config: &EntityConfig,
            lookup_fields: &[&str],
            raw: &str,
        ) -> StoreResult<Option<DbId>> {
            self.inner.resolve_reference(config, lookup_fields, raw).await
        }

        async fn insert(&self, config: &EntityConfig, data: &Row) -> StoreResult<DbId> {
            self.inner.insert(config, data).await
        }

        async fn update(&self, config: &EntityConfig, id: DbId, data: &Row) -> StoreResult<bool> {
            self.inner.update(config, id, data).await
        }

        async fn delete(&self, config: &EntityConfig, id: DbId) -> StoreResult<bool> {
            self.inner.delete(config, id).await
        }

        async fn validate_no_circular_reference(
            &self,
            table: HierarchyTable,
            record_id: DbId,
            parent_id: Option<DbId>,
        ) -> StoreResult<bool> {
            self.inner
                .validate_no_circular_reference(table, record_id, parent_id)
                .await
        }
    }

    #[tokio::test]
    async fn validate_never_overwrites_a_concurrent_status_change() {
        let h = harness();
        let job = mapped_job(&h, CONTACTS_CSV, contacts_input(DedupStrategy::Skip, &[])).await;
        let racing = MigrationService::new(
            Arc::clone(&h.jobs) as Arc<dyn JobStore>,
            Arc::new(StatusFlippingTargets {
                inner: MemoryTargetStore::new(),
                jobs: Arc::clone(&h.jobs),
                job_id: job.id,
            }),
            Arc::clone(&h.events),
            MigrationSettings {
                upload_dir: h._dir.path().to_path_buf(),
                ..MigrationSettings::default()
            },
        );

        let result = racing.validate(job.id).await.unwrap();
        assert!(result.is_valid());

        let stored = h.service.get_job(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Running);
        assert_eq!(stored.validation_result.unwrap().0, result);
        assert_eq!(stored.total_rows, job.total_rows);
    }

    #[tokio::test]
    async fn validating_a_running_job_only_refreshes_the_report() {
        let h = harness();
        let job = mapped_job(&h, CONTACTS_CSV, contacts_input(DedupStrategy::Skip, &[])).await;
        h.jobs.force_status(job.id, JobStatus::Running);

        let result = h.service.validate(job.id).await.unwrap();
        let stored = h.service.get_job(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Running);
        assert!(stored.completed_at.is_none());
        assert_eq!(stored.validation_result.unwrap().0, result);
    }

    #[tokio::test]
    async fn swap_status_requires_the_expected_status() {
        let h = harness();
        let job = mapped_job(&h, CONTACTS_CSV, contacts_input(DedupStrategy::Skip, &[])).await;

        let missed = h
            .jobs
            .swap_status(job.id, JobStatus::Validated, JobStatus::Running)
            .await
            .unwrap();
        assert!(missed.is_none());
        assert_eq!(h.service.get_job(job.id).await.unwrap().status, JobStatus::Mapped);

        let swapped = h
            .jobs
            .swap_status(job.id, JobStatus::Mapped, JobStatus::Validating)
            .await
            .unwrap();
        assert_eq!(swapped.map(|j| j.status), Some(JobStatus::Validating));
    }

    #[tokio::test]
    async fn preview_pages_through_transformed_rows() {
        let h = harness();
        let job = mapped_job(&h, CONTACTS_CSV, contacts_input(DedupStrategy::Skip, &[])).await;

        let page = h.service.preview(job.id, Some(2), Some(2)).await.unwrap();
        assert_eq!(page.total_rows, 3);
        assert_eq!(page.page, 2);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].row_number, 3);
        assert_eq!(page.rows[0].transformed["name"], json!("Chidi Eze"));

        let page = h.service.preview(job.id, None, Some(2)).await.unwrap();
        assert!(!page.rows[1].warnings.is_empty());
        assert!(page.rows[1].errors.is_empty());
    }

    #[tokio::test]
    async fn cancel_and_delete_follow_the_state_machine() {
        let h = harness();
        let job = mapped_job(&h, CONTACTS_CSV, contacts_input(DedupStrategy::Skip, &[])).await;
        let path = job.file_path.clone().unwrap();

        let cancelled = h.service.cancel_job(job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert_matches!(
            h.service.execute(job.id, None).await,
            Err(MigrationError::InvalidState(_))
        );

        h.jobs.force_status(job.id, JobStatus::Running);
        assert_matches!(
            h.service.delete_job(job.id).await,
            Err(MigrationError::InvalidState(_))
        );
        h.jobs.force_status(job.id, JobStatus::Cancelled);

        h.service.delete_job(job.id).await.unwrap();
        assert!(!Path::new(&path).exists());
        assert_matches!(
            h.service.get_job(job.id).await,
            Err(MigrationError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn create_job_validates_input() {
        let h = harness();
        let mut input = contacts_input(DedupStrategy::Skip, &[]);
        input.name = "   ".into();
        assert_matches!(
            h.service.create_job(&input, None).await,
            Err(MigrationError::Core(CoreError::Validation(_)))
        );

        let input = contacts_input(DedupStrategy::Skip, &["shoe_size"]);
        assert_matches!(
            h.service.create_job(&input, None).await,
            Err(MigrationError::Core(CoreError::Validation(_)))
        );
    }
}
