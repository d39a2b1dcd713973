use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{debug, trace, warn};
use url::Url;

use super::{metadata, AppState};
use crate::{
    projector::{Delivery, ExternalResult, OutcomeProjector},
    resolver::outcome::ResolutionRequest,
};

const SERVICE_NAME: &str = "linkgrab";

#[derive(Debug, Deserialize)]
pub struct VideoInfoBody {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    url: Option<String>,
    quality: Option<String>,
    mode: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "service": SERVICE_NAME,
        "providers": state.resolver.provider_ids(),
        "cobaltConfigured": state.cobalt_configured,
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

#[tracing::instrument(skip_all)]
pub async fn video_info(State(state): State<AppState>, body: Option<Json<VideoInfoBody>>) -> Response {
    let url = body
        .and_then(|Json(b)| b.url)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());

    let Some(url) = url else {
        trace!("Video info requested without URL");
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "success": false, "error": "URL required" })),
        )
            .into_response();
    };

    Json(metadata::video_info(&state.client, &state.oembed_endpoint, &url).await).into_response()
}

#[tracing::instrument(skip_all, fields(url = ?params.url, quality = ?params.quality))]
pub async fn download(State(state): State<AppState>, Query(params): Query<DownloadParams>) -> ExternalResult {
    let raw_url = params.url.as_deref().map(str::trim).unwrap_or_default();

    if raw_url.is_empty() {
        return OutcomeProjector::invalid_input(
            "url query param is required",
            serde_json::Value::Null,
        );
    }

    let source_url = match Url::parse(raw_url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => u,
        Ok(u) => {
            return OutcomeProjector::invalid_input(
                "The provided URL is not valid.",
                serde_json::json!({ "url": raw_url, "message": format!("unsupported scheme {}", u.scheme()) }),
            );
        }
        Err(e) => {
            trace!(?e, "Could not parse URL");
            return OutcomeProjector::invalid_input(
                "The provided URL is not valid.",
                serde_json::json!({ "url": raw_url, "message": e.to_string() }),
            );
        }
    };

    let request = ResolutionRequest::new(source_url, params.quality.as_deref());
    let delivery = match params.mode.as_deref() {
        Some("pick") => Delivery::Choose,
        _ => Delivery::Download,
    };

    let resolution = state.resolver.resolve(&request).await;
    let result = OutcomeProjector::project(&resolution, delivery);

    match &result {
        ExternalResult::Error { status, message, .. } => {
            warn!(%status, ?message, attempts = resolution.attempts.len(), "Download link not resolved");
        }
        ExternalResult::Redirect(_) | ExternalResult::Payload(_) => {
            debug!(attempts = resolution.attempts.len(), "Download link resolved");
        }
    }

    result
}
