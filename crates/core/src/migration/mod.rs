//! Pure building blocks of the data-migration pipeline.
//!
//! File parsing, column mapping, value cleaning, schema validation, the
//! entity registry, and the job state machine. Persistence and
//! orchestration live in the `bizsuite-migration` crate.

pub mod cleaning;
pub mod entity;
pub mod job;
pub mod mapping;
pub mod parser;
pub mod registry;
pub mod validator;

pub use entity::EntityType;
pub use job::{DedupStrategy, JobOperation, JobStatus, RecordAction, RollbackAction, SourceType};
