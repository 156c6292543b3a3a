use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use bizsuite_events::{EventBus, JobEvent};
use bizsuite_migration::pg::{PgJobStore, PgTargetStore};
use bizsuite_migration::{AdvisoryJobLock, MigrationService, MigrationSettings, TaskRunner};
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bizsuite_api::config::ServerConfig;
use bizsuite_api::extract::ACTOR_HEADER;
use bizsuite_api::{routes, state};

use state::AppState;

/// Room for multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bizsuite_api=debug,bizsuite_migration=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let settings = MigrationSettings::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        upload_dir = %settings.upload_dir.display(),
        batch_size = settings.batch_size,
        "Loaded migration settings"
    );

    // --- Database ---
    let pool = bizsuite_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    bizsuite_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    bizsuite_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let event_log_handle = tokio::spawn(log_job_events(event_bus.subscribe()));
    tracing::info!("Event bus created");

    // --- Migration service ---
    let upload_limit = settings.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let migrations = Arc::new(MigrationService::new(
        Arc::new(PgJobStore::new(pool.clone())),
        Arc::new(PgTargetStore::new(pool.clone())),
        Arc::clone(&event_bus),
        settings,
    ));
    let tasks = Arc::new(TaskRunner::new(
        Arc::clone(&migrations),
        Arc::new(AdvisoryJobLock::new(pool.clone())),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        migrations,
        tasks,
        event_bus: Arc::clone(&event_bus),
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        // API v1 routes.
        .nest("/api/v1", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        // Uploads are bounded by the migration settings, not axum's default.
        .layer(DefaultBodyLimit::max(upload_limit))
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Dropping the last sender closes the channel and ends the event logger.
    drop(event_bus);
    let _ = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        event_log_handle,
    )
    .await;

    tracing::info!("Graceful shutdown complete");
}

/// Log every migration event until the bus closes.
async fn log_job_events(mut rx: broadcast::Receiver<JobEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => tracing::debug!(
                event = event.kind.event_name(),
                job_id = event.job_id,
                entity_type = %event.entity_type,
                status = %event.status,
                "Migration event"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(ACTOR_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
