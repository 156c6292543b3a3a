pub mod health;
pub mod migration;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /migration/entities                    registry listing
/// /migration/entities/order              dependency-respecting order
/// /migration/entities/{entity_type}      one entity config
/// /migration/jobs/...                    job lifecycle (see routes::migration)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/migration", migration::router())
}
