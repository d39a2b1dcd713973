mod metadata;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{config::Config, projector::ExternalResult, resolver::Resolver};

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    pub client: reqwest::Client,
    pub oembed_endpoint: Arc<str>,
    pub cobalt_configured: bool,
}

impl AppState {
    pub fn new(resolver: Resolver, client: reqwest::Client, cobalt_configured: bool) -> Self {
        Self {
            resolver: Arc::new(resolver),
            client,
            oembed_endpoint: Arc::from(metadata::YOUTUBE_OEMBED_URL),
            cobalt_configured,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/video-info", post(routes::video_info))
        .route("/api/download", get(routes::download))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(%addr, "Listening for requests");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(?e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

impl IntoResponse for ExternalResult {
    fn into_response(self) -> Response {
        match self {
            Self::Redirect(url) => (StatusCode::FOUND, [(header::LOCATION, url)]).into_response(),

            Self::Payload(body) => Json(body).into_response(),

            Self::Error {
                status,
                message,
                detail,
            } => (
                status,
                Json(serde_json::json!({ "error": message, "debug": detail })),
            )
                .into_response(),
        }
    }
}
