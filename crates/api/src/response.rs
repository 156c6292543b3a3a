//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! instead of ad-hoc `serde_json::json!({ "data": ... })`.

use bizsuite_core::types::DbId;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Body of a `202 Accepted` for work continuing in the background.
#[derive(Debug, Serialize)]
pub struct TaskAccepted {
    pub job_id: DbId,
    pub operation: &'static str,
}
