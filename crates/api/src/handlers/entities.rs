//! Handlers for browsing the entity registry.

use axum::extract::Path;
use axum::response::IntoResponse;
use axum::Json;
use bizsuite_core::migration::registry::{all_entity_configs, get_entity_config, get_migration_order};
use bizsuite_core::migration::EntityType;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;

/// One row of the registry listing.
#[derive(Debug, Serialize)]
pub struct EntitySummary {
    pub entity_type: EntityType,
    pub label: &'static str,
    pub module: &'static str,
    pub field_count: usize,
    pub required_fields: Vec<&'static str>,
    pub dependencies: &'static [EntityType],
    pub supports_upsert: bool,
    pub supports_rollback: bool,
}

/// GET /api/v1/migration/entities
pub async fn list_entities() -> impl IntoResponse {
    let data: Vec<EntitySummary> = all_entity_configs()
        .iter()
        .map(|c| EntitySummary {
            entity_type: c.entity_type,
            label: c.label,
            module: c.module,
            field_count: c.fields.len(),
            required_fields: c.required_fields(),
            dependencies: c.dependencies,
            supports_upsert: c.supports_upsert,
            supports_rollback: c.supports_rollback,
        })
        .collect();
    Json(DataResponse { data })
}

/// GET /api/v1/migration/entities/order
///
/// Entity types with every type after the types it references.
pub async fn migration_order() -> impl IntoResponse {
    Json(DataResponse {
        data: get_migration_order(),
    })
}

/// GET /api/v1/migration/entities/{entity_type}
pub async fn get_entity(Path(entity_type): Path<String>) -> AppResult<impl IntoResponse> {
    let config = get_entity_config(&entity_type)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown entity type '{entity_type}'")))?;
    Ok(Json(DataResponse { data: config }))
}
