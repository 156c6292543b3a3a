use bizsuite_core::error::CoreError;
use bizsuite_core::migration::parser::ParseError;
use bizsuite_core::types::DbId;

/// Errors surfaced by [`MigrationService`](crate::MigrationService) and
/// [`TaskRunner`](crate::TaskRunner).
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Migration job {0} not found")]
    NotFound(DbId),

    /// The operation is not allowed in the job's current status. The job is
    /// left unchanged.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Migration job {0} has no field mapping")]
    MissingMapping(DbId),

    #[error("Could not parse source file: {0}")]
    Parse(#[from] ParseError),

    /// Another worker holds the job's lock. Safe to retry later.
    #[error("Migration job {0} is already being processed")]
    LockContention(DbId),

    /// Some rollback candidates could not be reversed; the job stays
    /// `completed` so rollback can be retried.
    #[error("Rollback of job {job_id} incomplete: {rolled_back} reversed, {failed} failed")]
    RollbackIncomplete {
        job_id: DbId,
        rolled_back: usize,
        failed: usize,
    },

    #[error("File storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl MigrationError {
    /// Shorthand for a [`CoreError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Core(CoreError::Validation(message.into()))
    }
}

pub type MigrationResult<T> = Result<T, MigrationError>;
