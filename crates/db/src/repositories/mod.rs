pub mod hierarchy_repo;
pub mod migration_job_repo;
pub mod migration_record_repo;
pub mod rollback_log_repo;
pub mod target_repo;

pub use hierarchy_repo::HierarchyRepo;
pub use migration_job_repo::MigrationJobRepo;
pub use migration_record_repo::MigrationRecordRepo;
pub use rollback_log_repo::RollbackLogRepo;
pub use target_repo::TargetRepo;
