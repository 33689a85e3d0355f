//! HTTP server: shared context, router construction, lifecycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use framefusion_av::{tools, TranscodeExecutor};
use framefusion_core::{Config, Error};

pub mod error;
pub mod extract;
pub mod routes_compose;

/// Uploads can be full-length videos; the axum default of 2 MB is far too
/// small.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024 * 1024;

/// Shared application context.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub executor: Arc<TranscodeExecutor>,
    pub http: reqwest::Client,
}

impl AppContext {
    /// Build the context from configuration: locate ffmpeg, size the
    /// admission gate, construct the download client.
    pub fn new(config: Config) -> framefusion_core::Result<Self> {
        let ffmpeg = tools::find_ffmpeg(config.tools.ffmpeg_path.as_deref())?;
        tracing::info!("Using ffmpeg at {}", ffmpeg.display());

        let max_jobs = match config.engine.max_concurrent_jobs {
            0 => num_cpus::get().max(1),
            n => n,
        };
        tracing::info!("Engine admission limit: {max_jobs} concurrent jobs");

        let executor = TranscodeExecutor::new(
            ffmpeg,
            max_jobs,
            Duration::from_secs(config.engine.timeout_secs),
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.downloads.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            executor: Arc::new(executor),
            http,
        })
    }
}

/// Create the Axum router with all routes.
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(routes_compose::describe))
        .route("/health", get(health_check))
        .route("/image-audio", post(routes_compose::image_audio))
        .route("/slideshow", post(routes_compose::slideshow))
        .route("/concat-videos", post(routes_compose::concat_videos))
        .route("/video-audio", post(routes_compose::video_audio))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server and block until shutdown.
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let ctx = AppContext::new(config)?;
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
