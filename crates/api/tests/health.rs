mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get};

#[tokio::test]
async fn health_reports_degraded_without_database() {
    let app = build_test_app();

    let response = get(&app.router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["db_healthy"], false);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app();

    let response = get(&app.router, "/api/v1/does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
