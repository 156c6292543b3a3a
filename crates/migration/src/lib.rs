//! Migration job orchestration.
//!
//! [`MigrationService`] drives a job through upload, mapping, validation,
//! execution and rollback. Persistence sits behind the [`JobStore`] and
//! [`TargetStore`] traits, with PostgreSQL implementations in [`pg`] and
//! in-memory ones in [`memory`]. [`TaskRunner`] wraps the long-running
//! operations in a per-job lock.

pub mod config;
pub mod error;
pub mod lock;
pub mod memory;
pub mod pg;
pub mod service;
pub mod store;
pub mod tasks;
pub mod transform;
pub mod validation;

pub use config::MigrationSettings;
pub use error::MigrationError;
pub use lock::{AdvisoryJobLock, JobLock, LocalJobLock};
pub use service::MigrationService;
pub use store::{JobStore, TargetStore};
pub use tasks::TaskRunner;
