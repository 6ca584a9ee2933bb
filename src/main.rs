//! Papermill Server
//!
//! Accepts uploaded PDFs, removes password encryption when a password is
//! supplied, runs OCR conversion through an external toolchain, and
//! publishes the result to S3-compatible storage.

use anyhow::Context;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use papermill_server::config::{check_dependencies, Config};
use papermill_server::routes;
use papermill_server::state::AppState;
use papermill_server::storage::S3Client;

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    time: String,
    version: &'static str,
    deps: BTreeMap<&'static str, Option<String>>,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        time: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        deps: check_dependencies(&state.config().tools),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "papermill_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Papermill Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("S3 bucket: {}", config.storage.bucket);
    if let Some(limit) = config.conversion.max_concurrent_jobs {
        tracing::info!("Conversion admission limit: {} concurrent jobs", limit);
    }

    // Surface a broken toolchain at startup instead of on first upload
    for (tool, path) in check_dependencies(&config.tools) {
        match path {
            Some(p) => tracing::info!("Found {}: {}", tool, p),
            None => tracing::warn!("{} not found on PATH", tool),
        }
    }

    // Initialize S3 client
    let s3_client = S3Client::new(&config.storage)
        .await
        .context("Failed to initialize S3 client")?;

    // Create application state
    let app_state = AppState::new(config.clone(), s3_client);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/ocr", routes::ocr::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    // Start server with graceful shutdown
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));
    tracing::info!("Papermill Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
