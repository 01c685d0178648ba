use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod error;
pub mod handlers;
pub mod request_id;

use crate::config::{Config, CorsConfig, ResponseMode};
use crate::output::{ArtifactStore, AUDIO_ROUTE};
use crate::pipeline::DubPipeline;
use handlers::{dub_handler, health_handler};
use request_id::request_id_middleware;

/// Process-wide state, built once at startup and never mutated
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DubPipeline>,
    pub artifacts: Arc<ArtifactStore>,
    pub response_mode: ResponseMode,
}

pub fn create_router(state: AppState, cors: &CorsConfig) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let audio_files = ServeDir::new(state.artifacts.dir());

    Router::new()
        .route("/", get(health_handler))
        .route("/dub", post(dub_handler))
        .nest_service(AUDIO_ROUTE, audio_files)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors_layer(cors))
        .with_state(state)
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    if cors.allow_any_origin {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the production state and serve until Ctrl-C
pub async fn serve(config: &Config) -> crate::Result<()> {
    let pipeline = DubPipeline::from_config(config)?;
    let artifacts = ArtifactStore::new(
        config.pipeline.output_dir.clone(),
        &config.server.public_base_url,
    );
    artifacts.prepare().await?;

    let state = AppState {
        pipeline: Arc::new(pipeline),
        artifacts: Arc::new(artifacts),
        response_mode: config.pipeline.response_mode,
    };

    let router = create_router(state, &config.server.cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        response_mode = ?config.pipeline.response_mode,
        "Listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
