//! Query parameter types for the migration endpoints.
//!
//! Enum-valued filters arrive as strings and are parsed in the handlers so
//! an unknown value produces the standard JSON error body.

use serde::Deserialize;

/// `GET /migration/jobs` (`?status=&entity_type=&limit=&offset=`).
#[derive(Debug, Default, Deserialize)]
pub struct JobListParams {
    pub status: Option<String>,
    pub entity_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /migration/jobs/{id}/records` (`?action=&limit=&offset=`).
#[derive(Debug, Default, Deserialize)]
pub struct RecordListParams {
    pub action: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /migration/jobs/{id}/preview` (`?page=&page_size=`).
#[derive(Debug, Default, Deserialize)]
pub struct PreviewParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}
