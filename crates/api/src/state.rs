use std::sync::Arc;

use bizsuite_events::EventBus;
use bizsuite_migration::{MigrationService, TaskRunner};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: bizsuite_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Migration job lifecycle.
    pub migrations: Arc<MigrationService>,
    /// Lock-guarded background execute and rollback.
    pub tasks: Arc<TaskRunner>,
    /// Progress and status events for migration jobs.
    pub event_bus: Arc<EventBus>,
}
