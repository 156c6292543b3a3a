//! Per-job exclusive locks.
//!
//! Acquisition never waits: if another worker holds the job, the caller gets
//! [`MigrationError::LockContention`] and may retry later.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bizsuite_core::types::DbId;
use bizsuite_db::DbPool;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

use crate::error::{MigrationError, MigrationResult};

/// Lock name for a job; also hashed into the PostgreSQL advisory key.
pub fn lock_key(job_id: DbId) -> String {
    format!("migration_job:{job_id}")
}

#[async_trait]
pub trait JobLock: Send + Sync {
    /// Take the job's lock or fail immediately with `LockContention`.
    async fn try_acquire(&self, job_id: DbId) -> MigrationResult<Box<dyn HeldLock>>;
}

/// A held job lock. Call [`HeldLock::release`] when done; dropping the guard
/// also frees the lock.
#[async_trait]
pub trait HeldLock: Send {
    fn job_id(&self) -> DbId;

    async fn release(self: Box<Self>) -> MigrationResult<()>;
}

// ---------------------------------------------------------------------------
// PostgreSQL advisory lock
// ---------------------------------------------------------------------------

/// Session-level `pg_try_advisory_lock` held on a dedicated pool connection,
/// so every worker process sharing the database observes it.
pub struct AdvisoryJobLock {
    pool: DbPool,
}

impl AdvisoryJobLock {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobLock for AdvisoryJobLock {
    async fn try_acquire(&self, job_id: DbId) -> MigrationResult<Box<dyn HeldLock>> {
        let key = lock_key(job_id);
        let mut conn = self.pool.acquire().await?;
        let (acquired,): (bool,) =
            sqlx::query_as("SELECT pg_try_advisory_lock(hashtextextended($1, 0))")
                .bind(&key)
                .fetch_one(&mut *conn)
                .await?;

        if !acquired {
            tracing::info!(job_id, %key, "Job lock held elsewhere");
            return Err(MigrationError::LockContention(job_id));
        }
        tracing::debug!(job_id, %key, "Job lock acquired");
        Ok(Box::new(AdvisoryLockGuard {
            job_id,
            key,
            conn: Some(conn),
        }))
    }
}

struct AdvisoryLockGuard {
    job_id: DbId,
    key: String,
    conn: Option<PoolConnection<Postgres>>,
}

#[async_trait]
impl HeldLock for AdvisoryLockGuard {
    fn job_id(&self) -> DbId {
        self.job_id
    }

    async fn release(mut self: Box<Self>) -> MigrationResult<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        let unlocked = sqlx::query("SELECT pg_advisory_unlock(hashtextextended($1, 0))")
            .bind(&self.key)
            .execute(&mut *conn)
            .await;
        if let Err(err) = unlocked {
            // The session may still hold the lock; never hand it back to the pool.
            tracing::warn!(job_id = self.job_id, error = %err, "Job lock unlock failed, closing session");
            drop(conn.detach());
            return Err(err.into());
        }
        tracing::debug!(job_id = self.job_id, key = %self.key, "Job lock released");
        Ok(())
    }
}

impl Drop for AdvisoryLockGuard {
    fn drop(&mut self) {
        // Session locks survive a return to the pool; closing the session
        // is the only synchronous way to free them.
        if let Some(conn) = self.conn.take() {
            tracing::warn!(job_id = self.job_id, "Job lock dropped without release, closing session");
            drop(conn.detach());
        }
    }
}

// ---------------------------------------------------------------------------
// In-process lock
// ---------------------------------------------------------------------------

/// Lock table shared by clones, for single-process deployments and tests.
#[derive(Clone, Default)]
pub struct LocalJobLock {
    held: Arc<Mutex<HashSet<DbId>>>,
}

impl LocalJobLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, job_id: DbId) -> bool {
        self.held.lock().map(|h| h.contains(&job_id)).unwrap_or(false)
    }
}

#[async_trait]
impl JobLock for LocalJobLock {
    async fn try_acquire(&self, job_id: DbId) -> MigrationResult<Box<dyn HeldLock>> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| MigrationError::InvalidState("job lock table poisoned".into()))?;
        if !held.insert(job_id) {
            tracing::info!(job_id, "Job lock held elsewhere");
            return Err(MigrationError::LockContention(job_id));
        }
        Ok(Box::new(LocalLockGuard {
            job_id,
            held: Arc::clone(&self.held),
        }))
    }
}

struct LocalLockGuard {
    job_id: DbId,
    held: Arc<Mutex<HashSet<DbId>>>,
}

#[async_trait]
impl HeldLock for LocalLockGuard {
    fn job_id(&self) -> DbId {
        self.job_id
    }

    async fn release(self: Box<Self>) -> MigrationResult<()> {
        // Drop does the work.
        Ok(())
    }
}

impl Drop for LocalLockGuard {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn key_format() {
        assert_eq!(lock_key(42), "migration_job:42");
    }

    #[tokio::test]
    async fn second_acquire_is_contention() {
        let lock = LocalJobLock::new();
        let guard = lock.try_acquire(1).await.unwrap();
        assert_matches!(
            lock.try_acquire(1).await.err(),
            Some(MigrationError::LockContention(1))
        );
        assert!(lock.try_acquire(2).await.is_ok());

        guard.release().await.unwrap();
        assert!(!lock.is_held(1));
        assert!(lock.try_acquire(1).await.is_ok());
    }

    #[tokio::test]
    async fn dropping_guard_frees_lock() {
        let lock = LocalJobLock::new();
        {
            let _guard = lock.try_acquire(5).await.unwrap();
            assert!(lock.is_held(5));
        }
        assert!(!lock.is_held(5));
    }
}
