use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bizsuite_core::error::CoreError;
use bizsuite_migration::MigrationError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`MigrationError`] and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `bizsuite_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An error from the migration service.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

type ErrorParts = (StatusCode, &'static str, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Migration(err) => classify_migration_error(err),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> ErrorParts {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core_error(err: &CoreError) -> ErrorParts {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::InvalidState(msg) => (StatusCode::CONFLICT, "INVALID_STATE", msg.clone()),
        CoreError::Parse(msg) => (StatusCode::BAD_REQUEST, "PARSE_ERROR", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

fn classify_migration_error(err: &MigrationError) -> ErrorParts {
    match err {
        MigrationError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        MigrationError::InvalidState(msg) => (StatusCode::CONFLICT, "INVALID_STATE", msg.clone()),
        MigrationError::MissingMapping(_) => {
            (StatusCode::BAD_REQUEST, "MISSING_MAPPING", err.to_string())
        }
        MigrationError::Parse(_) => (StatusCode::BAD_REQUEST, "PARSE_ERROR", err.to_string()),
        MigrationError::LockContention(_) => {
            (StatusCode::CONFLICT, "LOCK_CONTENTION", err.to_string())
        }
        MigrationError::RollbackIncomplete { .. } => {
            tracing::error!(error = %err, "Rollback incomplete");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ROLLBACK_INCOMPLETE",
                err.to_string(),
            )
        }
        MigrationError::Storage(io) => {
            tracing::error!(error = %io, "File storage error");
            internal()
        }
        MigrationError::Database(db) => classify_sqlx_error(db),
        MigrationError::Core(core) => classify_core_error(core),
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> ErrorParts {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
