//! Route definitions for the `/migration` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{entities, migration};
use crate::state::AppState;

/// Routes mounted at `/migration`.
///
/// ```text
/// GET    /entities                          -> list_entities
/// GET    /entities/order                    -> migration_order
/// GET    /entities/{entity_type}            -> get_entity
/// GET    /jobs                              -> list_jobs
/// POST   /jobs                              -> create_job
/// GET    /jobs/{id}                         -> get_job
/// DELETE /jobs/{id}                         -> delete_job
/// POST   /jobs/{id}/upload                  -> upload_file
/// GET    /jobs/{id}/mapping/suggest         -> suggest_mapping
/// PUT    /jobs/{id}/mapping                 -> save_mapping
/// POST   /jobs/{id}/validate                -> validate
/// GET    /jobs/{id}/preview                 -> preview
/// POST   /jobs/{id}/execute                 -> execute
/// POST   /jobs/{id}/cancel                  -> cancel_job
/// GET    /jobs/{id}/progress                -> progress
/// GET    /jobs/{id}/records                 -> list_records
/// POST   /jobs/{id}/rollback                -> rollback
/// GET    /jobs/{id}/rollback-logs           -> rollback_logs
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/entities", get(entities::list_entities))
        .route("/entities/order", get(entities::migration_order))
        .route("/entities/{entity_type}", get(entities::get_entity))
        .route("/jobs", get(migration::list_jobs).post(migration::create_job))
        .route(
            "/jobs/{id}",
            get(migration::get_job).delete(migration::delete_job),
        )
        .route("/jobs/{id}/upload", post(migration::upload_file))
        .route("/jobs/{id}/mapping/suggest", get(migration::suggest_mapping))
        .route("/jobs/{id}/mapping", put(migration::save_mapping))
        .route("/jobs/{id}/validate", post(migration::validate))
        .route("/jobs/{id}/preview", get(migration::preview))
        .route("/jobs/{id}/execute", post(migration::execute))
        .route("/jobs/{id}/cancel", post(migration::cancel_job))
        .route("/jobs/{id}/progress", get(migration::progress))
        .route("/jobs/{id}/records", get(migration::list_records))
        .route("/jobs/{id}/rollback", post(migration::rollback))
        .route("/jobs/{id}/rollback-logs", get(migration::rollback_logs))
}
