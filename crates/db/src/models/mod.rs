pub mod migration_job;
pub mod migration_record;
pub mod rollback_log;
