#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use tempfile::TempDir;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use bizsuite_api::config::ServerConfig;
use bizsuite_api::routes;
use bizsuite_api::state::AppState;
use bizsuite_events::EventBus;
use bizsuite_migration::memory::{MemoryJobStore, MemoryTargetStore};
use bizsuite_migration::{LocalJobLock, MigrationService, MigrationSettings, TaskRunner};

pub const BOUNDARY: &str = "bizsuite-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_url: "postgres://bizsuite@127.0.0.1:1/bizsuite_test".to_string(),
    }
}

/// Application router plus the handles tests inspect.
pub struct TestApp {
    pub router: Router,
    pub targets: Arc<MemoryTargetStore>,
    pub upload_dir: TempDir,
}

/// Build the full application router with all middleware layers.
///
/// Jobs and target rows live in memory. The pool points at a closed port
/// and connects lazily, so only the health check ever touches it.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let upload_dir = tempfile::tempdir().unwrap();
    let settings = MigrationSettings {
        upload_dir: upload_dir.path().to_path_buf(),
        batch_size: 2,
        ..MigrationSettings::default()
    };

    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy(&config.database_url)
        .unwrap();

    let event_bus = Arc::new(EventBus::default());
    let targets = Arc::new(MemoryTargetStore::new());
    let migrations = Arc::new(MigrationService::new(
        Arc::new(MemoryJobStore::new()),
        Arc::clone(&targets) as Arc<dyn bizsuite_migration::TargetStore>,
        Arc::clone(&event_bus),
        settings,
    ));
    let tasks = Arc::new(TaskRunner::new(
        Arc::clone(&migrations),
        Arc::new(LocalJobLock::new()),
    ));

    let state = AppState {
        pool,
        config: Arc::new(config),
        migrations,
        tasks,
        event_bus,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    TestApp {
        router,
        targets,
        upload_dir,
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn post(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// POST a single-file multipart body under the `file` part.
pub async fn upload(app: &Router, uri: &str, filename: &str, content: &[u8]) -> Response {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
