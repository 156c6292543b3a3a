//! Handlers for the `/migration/jobs` resource.
//!
//! Execute and rollback are handed to the [`TaskRunner`](bizsuite_migration::TaskRunner)
//! and answer `202 Accepted`; clients follow along through the progress
//! endpoint.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bizsuite_core::migration::{EntityType, JobStatus, RecordAction};
use bizsuite_core::types::DbId;
use bizsuite_db::models::migration_job::{CreateMigrationJob, JobFilter};
use bizsuite_db::models::migration_record::RecordFilter;
use bizsuite_migration::service::SaveMappingRequest;

use crate::error::{AppError, AppResult};
use crate::extract::Actor;
use crate::query::{JobListParams, PreviewParams, RecordListParams};
use crate::response::{DataResponse, TaskAccepted};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_param<T>(
    name: &str,
    raw: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
) -> AppResult<Option<T>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => parse(value)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid {name} '{value}'"))),
    }
}

// ---------------------------------------------------------------------------
// Create / list / get / delete
// ---------------------------------------------------------------------------

/// POST /api/v1/migration/jobs
pub async fn create_job(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(input): Json<CreateMigrationJob>,
) -> AppResult<impl IntoResponse> {
    let job = state.migrations.create_job(&input, actor).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

/// GET /api/v1/migration/jobs
///
/// Supports optional `status`, `entity_type`, `limit`, and `offset` query
/// parameters.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListParams>,
) -> AppResult<impl IntoResponse> {
    let filter = JobFilter {
        status: parse_param("status", params.status.as_deref(), JobStatus::from_str)?,
        entity_type: parse_param(
            "entity_type",
            params.entity_type.as_deref(),
            EntityType::from_str,
        )?,
        limit: params.limit.unwrap_or(0),
        offset: params.offset.unwrap_or(0),
    };
    let jobs = state.migrations.list_jobs(&filter).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/migration/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.migrations.get_job(id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// DELETE /api/v1/migration/jobs/{id}
///
/// Removes the job, its records and its stored file. Refused while running.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    state.migrations.delete_job(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Upload / mapping
// ---------------------------------------------------------------------------

/// POST /api/v1/migration/jobs/{id}/upload
///
/// Multipart body with a `file` part carrying a `.csv` or `.json` file.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("The 'file' part has no filename".into()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let job = state.migrations.upload_file(id, &filename, &data).await?;
        return Ok(Json(DataResponse { data: job }));
    }

    Err(AppError::BadRequest(
        "Multipart body must contain a 'file' part".into(),
    ))
}

/// GET /api/v1/migration/jobs/{id}/mapping/suggest
pub async fn suggest_mapping(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let suggestion = state.migrations.suggest_mapping(id).await?;
    Ok(Json(DataResponse { data: suggestion }))
}

/// PUT /api/v1/migration/jobs/{id}/mapping
pub async fn save_mapping(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<SaveMappingRequest>,
) -> AppResult<impl IntoResponse> {
    let job = state.migrations.save_mapping(id, input).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Validate / preview
// ---------------------------------------------------------------------------

/// POST /api/v1/migration/jobs/{id}/validate
pub async fn validate(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let result = state.migrations.validate(id).await?;
    Ok(Json(DataResponse { data: result }))
}

/// GET /api/v1/migration/jobs/{id}/preview
pub async fn preview(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<PreviewParams>,
) -> AppResult<impl IntoResponse> {
    let page = state
        .migrations
        .preview(id, params.page, params.page_size)
        .await?;
    Ok(Json(DataResponse { data: page }))
}

// ---------------------------------------------------------------------------
// Execute / cancel / progress / records
// ---------------------------------------------------------------------------

/// POST /api/v1/migration/jobs/{id}/execute
///
/// Returns 202 once the job lock is held; 409 if the job is not ready or
/// already being processed.
pub async fn execute(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Actor(actor): Actor,
) -> AppResult<impl IntoResponse> {
    let _handle = state.tasks.start_execute(id, actor).await?;
    tracing::info!(job_id = id, ?actor, "Migration execute scheduled");
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: TaskAccepted {
                job_id: id,
                operation: "execute",
            },
        }),
    ))
}

/// POST /api/v1/migration/jobs/{id}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.migrations.cancel_job(id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/v1/migration/jobs/{id}/progress
pub async fn progress(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let progress = state.migrations.get_progress(id).await?;
    Ok(Json(DataResponse { data: progress }))
}

/// GET /api/v1/migration/jobs/{id}/records
pub async fn list_records(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<RecordListParams>,
) -> AppResult<impl IntoResponse> {
    let filter = RecordFilter {
        action: parse_param("action", params.action.as_deref(), RecordAction::from_str)?,
        limit: params.limit.unwrap_or(0),
        offset: params.offset.unwrap_or(0),
    };
    let records = state.migrations.list_records(id, &filter).await?;
    Ok(Json(DataResponse { data: records }))
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

/// POST /api/v1/migration/jobs/{id}/rollback
pub async fn rollback(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Actor(actor): Actor,
) -> AppResult<impl IntoResponse> {
    let _handle = state.tasks.start_rollback(id, actor).await?;
    tracing::info!(job_id = id, ?actor, "Migration rollback scheduled");
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: TaskAccepted {
                job_id: id,
                operation: "rollback",
            },
        }),
    ))
}

/// GET /api/v1/migration/jobs/{id}/rollback-logs
pub async fn rollback_logs(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let logs = state.migrations.list_rollback_logs(id).await?;
    Ok(Json(DataResponse { data: logs }))
}
