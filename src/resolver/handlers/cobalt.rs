use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{body_value, send_with_retry, transport_failure, Handler};
use crate::{
    config::ProviderConfig,
    resolver::{
        outcome::{Candidate, ErrorKind, ResolutionOutcome, ResolutionRequest},
        quality::QualitySet,
    },
};

const DOWNLOAD_MODE: &str = "auto";
const YOUTUBE_VIDEO_CODEC: &str = "h264";
const YOUTUBE_VIDEO_CONTAINER: &str = "auto";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CobaltRequest<'a> {
    url: &'a str,
    video_quality: &'a str,
    download_mode: &'a str,
    youtube_video_codec: &'a str,
    youtube_video_container: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
enum CobaltResponse {
    Redirect {
        url: Option<String>,
    },
    Tunnel {
        url: Option<String>,
    },
    Picker {
        #[serde(default)]
        picker: Vec<PickerItem>,
    },
    LocalProcessing {
        #[serde(rename = "type")]
        kind: Option<String>,
        output: Option<LocalOutput>,
    },
    Error {
        error: Option<CobaltError>,
    },
}

#[derive(Debug, Deserialize)]
struct PickerItem {
    #[serde(rename = "type")]
    kind: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocalOutput {
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CobaltError {
    code: Option<String>,
}

/// Cobalt instance (`POST /` API, v10+ request schema)
#[derive(Debug)]
pub struct CobaltProvider {
    id: String,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    retries: u32,
    qualities: QualitySet,
    client: reqwest::Client,
}

#[async_trait::async_trait]
impl Handler for CobaltProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn qualities(&self) -> &QualitySet {
        &self.qualities
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[tracing::instrument(skip_all, fields(provider = %self.id, url = ?request.source_url().as_str()))]
    async fn resolve(&self, request: &ResolutionRequest) -> ResolutionOutcome {
        debug!("Requesting download link from cobalt");

        let payload = CobaltRequest {
            url: request.source_url().as_str(),
            video_quality: request.requested_quality().as_str(),
            download_mode: DOWNLOAD_MODE,
            youtube_video_codec: YOUTUBE_VIDEO_CODEC,
            youtube_video_container: YOUTUBE_VIDEO_CONTAINER,
        };
        let sent = serde_json::to_value(&payload).unwrap_or_default();

        trace!(?payload, "Sending request to cobalt");

        let resp = send_with_retry(
            || {
                let req = self
                    .client
                    .post(&self.endpoint)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .json(&payload)
                    .timeout(self.timeout);

                match &self.api_key {
                    Some(key) => req.header(reqwest::header::AUTHORIZATION, format!("Api-Key {key}")),
                    None => req,
                }
            },
            self.retries,
        )
        .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => return transport_failure(&self.id, &e, sent),
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => return transport_failure(&self.id, &e, sent),
        };

        trace!(%status, ?body, "Response received from cobalt");

        self.translate(status, &body, sent)
    }
}

impl CobaltProvider {
    pub fn new(id: String, config: &ProviderConfig, retries: u32, client: reqwest::Client) -> Self {
        Self {
            id,
            endpoint: format!("{}/", config.base_url),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            retries,
            qualities: QualitySet::all(),
            client,
        }
    }

    fn translate(
        &self,
        status: reqwest::StatusCode,
        body: &str,
        sent: serde_json::Value,
    ) -> ResolutionOutcome {
        let debug = |body: serde_json::Value| {
            serde_json::json!({
                "provider": self.id,
                "endpoint": self.endpoint,
                "status": status.as_u16(),
                "sentBody": sent,
                "body": body,
            })
        };

        if !status.is_success() {
            warn!(%status, "Cobalt returned an error status");
            return ResolutionOutcome::failure(ErrorKind::UpstreamRejected, debug(body_value(body)));
        }

        let Ok(raw) = serde_json::from_str::<serde_json::Value>(body) else {
            warn!("Cobalt response is not JSON");
            return ResolutionOutcome::failure(
                ErrorKind::UnexpectedResponseShape,
                debug(serde_json::Value::String(body.to_string())),
            );
        };

        let parsed = match serde_json::from_value::<CobaltResponse>(raw.clone()) {
            Ok(p) => p,
            Err(e) => {
                warn!(?e, "Unrecognized cobalt response");
                return ResolutionOutcome::failure(ErrorKind::UnexpectedResponseShape, debug(raw));
            }
        };

        match parsed {
            CobaltResponse::Redirect { url: Some(url) } | CobaltResponse::Tunnel { url: Some(url) } => {
                ResolutionOutcome::direct(url)
            }

            CobaltResponse::Redirect { url: None } | CobaltResponse::Tunnel { url: None } => {
                ResolutionOutcome::failure(ErrorKind::UnexpectedResponseShape, debug(raw))
            }

            CobaltResponse::Picker { picker } => {
                let items = picker
                    .into_iter()
                    .filter_map(|item| item.url.map(|url| (url, item.kind)))
                    .enumerate()
                    .map(|(i, (url, kind))| {
                        let kind = kind.unwrap_or_else(|| "item".to_string());
                        Candidate::new(url, format!("{kind}-{}", i + 1))
                    })
                    .collect::<Vec<_>>();

                ResolutionOutcome::from_candidates(items).unwrap_or_else(|| {
                    ResolutionOutcome::failure(ErrorKind::UnexpectedResponseShape, debug(raw))
                })
            }

            CobaltResponse::LocalProcessing { kind, output } => {
                let kind = kind.unwrap_or_else(|| "unknown".to_string());
                let reason = match output.and_then(|o| o.filename) {
                    Some(filename) => {
                        format!("cobalt requires local {kind} processing to produce {filename}")
                    }
                    None => format!("cobalt requires local {kind} processing"),
                };

                ResolutionOutcome::DeferredProcessing { reason }
            }

            CobaltResponse::Error { error } => {
                let code = error.and_then(|e| e.code);
                warn!(?code, "Cobalt rejected the request");
                ResolutionOutcome::failure(ErrorKind::UpstreamRejected, debug(raw))
            }
        }
    }
}
