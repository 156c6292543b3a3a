//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use bizsuite_core::types::DbId;

use crate::error::AppError;

/// Header carrying the calling user's id, set by the upstream gateway.
pub const ACTOR_HEADER: &str = "x-user-id";

/// Id of the user making the request, if the gateway supplied one.
///
/// Recorded as `created_by` on new jobs and `rolled_back_by` on rollback
/// logs. A present but malformed header is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Actor(pub Option<DbId>);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(ACTOR_HEADER) else {
            return Ok(Actor(None));
        };
        raw.to_str()
            .ok()
            .and_then(|v| v.trim().parse::<DbId>().ok())
            .map(|id| Actor(Some(id)))
            .ok_or_else(|| AppError::BadRequest(format!("Invalid {ACTOR_HEADER} header")))
    }
}
