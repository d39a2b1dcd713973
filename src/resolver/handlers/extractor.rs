use std::{collections::HashSet, time::Duration};

use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::{body_value, send_with_retry, transport_failure, Handler};
use crate::{
    config::ProviderConfig,
    resolver::{
        outcome::{Candidate, ErrorKind, ResolutionOutcome, ResolutionRequest},
        quality::{nearest_by_height, Quality, QualitySet},
    },
};

const INFO_PATH: &str = "/api/info";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InfoResponse {
    Formats { formats: Vec<FormatEntry> },
    Error { error: String },
}

#[derive(Debug, Clone, Deserialize)]
struct FormatEntry {
    url: Option<String>,
    label: Option<String>,
    format_note: Option<String>,
    height: Option<u32>,
    tbr: Option<f64>,
}

impl FormatEntry {
    /// `label`, then `format_note`, ignoring blank values
    fn raw_label(&self) -> Option<&str> {
        [&self.label, &self.format_note]
            .into_iter()
            .filter_map(|l| l.as_deref().map(str::trim))
            .find(|l| !l.is_empty())
    }

    fn label(&self) -> String {
        match (self.raw_label(), self.height) {
            (Some(label), _) => label.to_string(),
            (None, Some(height)) => format!("{height}p"),
            (None, None) => "unknown".to_string(),
        }
    }

    /// Height from the field, or the leading digits of the label ("720p60")
    fn resolved_height(&self) -> Option<u32> {
        self.height.or_else(|| {
            let label = self.raw_label()?;
            let end = label
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(label.len());
            label[..end].parse().ok()
        })
    }
}

/// Metadata-extraction service returning a list of format descriptors
/// (`GET /api/info?url=`).
#[derive(Debug)]
pub struct ExtractorProvider {
    id: String,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    retries: u32,
    qualities: QualitySet,
    client: reqwest::Client,
}

#[async_trait::async_trait]
impl Handler for ExtractorProvider {
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
        debug!("Requesting format list from extractor");

        let sent = serde_json::json!({ "url": request.source_url().as_str() });

        let resp = send_with_retry(
            || {
                let req = self
                    .client
                    .get(&self.endpoint)
                    .query(&[("url", request.source_url().as_str())])
                    .header(reqwest::header::ACCEPT, "application/json")
                    .timeout(self.timeout);

                match &self.api_key {
                    Some(key) => req.bearer_auth(key),
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

        trace!(%status, body_len = body.len(), "Response received from extractor");

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
            warn!(%status, "Extractor returned an error status");
            return ResolutionOutcome::failure(ErrorKind::UpstreamRejected, debug(body_value(&body)));
        }

        match serde_json::from_str::<InfoResponse>(&body) {
            Ok(InfoResponse::Formats { formats }) => {
                let items = rank_formats(formats, request.requested_quality());
                debug!(count = items.len(), "Formats ranked");

                ResolutionOutcome::from_candidates(items).unwrap_or_else(|| {
                    ResolutionOutcome::failure(ErrorKind::UnexpectedResponseShape, debug(body_value(&body)))
                })
            }

            Ok(InfoResponse::Error { error }) => {
                warn!(?error, "Extractor rejected the request");
                ResolutionOutcome::failure(ErrorKind::UpstreamRejected, debug(body_value(&body)))
            }

            Err(e) => {
                warn!(?e, "Unrecognized extractor response");
                ResolutionOutcome::failure(ErrorKind::UnexpectedResponseShape, debug(body_value(&body)))
            }
        }
    }
}

impl ExtractorProvider {
    pub fn new(id: String, config: &ProviderConfig, retries: u32, client: reqwest::Client) -> Self {
        Self {
            id,
            endpoint: format!("{}{INFO_PATH}", config.base_url),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            retries,
            qualities: QualitySet::numeric(),
            client,
        }
    }
}

/// Drop unusable entries, keep the highest bitrate per label and move the
/// entry closest to `requested` to the front.
fn rank_formats(mut formats: Vec<FormatEntry>, requested: Quality) -> Vec<Candidate> {
    formats.retain(|f| f.url.as_deref().is_some_and(|u| !u.trim().is_empty()));
    formats.sort_by(|a, b| {
        let a = a.tbr.unwrap_or(f64::NEG_INFINITY);
        let b = b.tbr.unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
    });

    let mut seen = HashSet::new();
    let mut ranked = formats
        .into_iter()
        .filter_map(|f| {
            let label = f.label();
            if !seen.insert(label.clone()) {
                return None;
            }
            let height = f.resolved_height();
            f.url.map(|url| (Candidate::new(url, label), height))
        })
        .collect::<Vec<_>>();

    let best = nearest_by_height(
        requested.target_height(),
        ranked
            .iter()
            .enumerate()
            .filter_map(|(i, (_, height))| height.map(|h| (h, i))),
    );

    if let Some(i) = best {
        let picked = ranked.remove(i);
        ranked.insert(0, picked);
    }

    ranked.into_iter().map(|(candidate, _)| candidate).collect()
}

#[cfg(test)]
mod tests {
    use url::Url;
    use wiremock::{
        matchers::{header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::resolver::handlers::ProviderKind;

    fn entry(url: &str, label: &str, height: Option<u32>, tbr: Option<f64>) -> FormatEntry {
        FormatEntry {
            url: Some(url.to_string()),
            label: Some(label.to_string()),
            format_note: None,
            height,
            tbr,
        }
    }

    fn provider(base_url: &str) -> ExtractorProvider {
        let config = ProviderConfig {
            kind: ProviderKind::Extractor,
            base_url: base_url.to_string(),
            api_key: Some("token".to_string()),
            timeout: Duration::from_secs(5),
        };

        ExtractorProvider::new("extractor@test".to_string(), &config, 0, reqwest::Client::new())
    }

    fn request(quality: &str) -> ResolutionRequest {
        ResolutionRequest::new(
            Url::parse("https://www.instagram.com/reel/C1xyz/").unwrap(),
            Some(quality),
        )
    }

    #[test]
    fn closest_label_is_moved_first() {
        let ranked = rank_formats(
            vec![
                entry("https://cdn/1080", "1080p", Some(1080), Some(4000.0)),
                entry("https://cdn/720", "720p", Some(720), Some(2500.0)),
                entry("https://cdn/360", "360p", Some(360), Some(700.0)),
            ],
            Quality::P720,
        );

        let urls = ranked.iter().map(|c| c.url.as_str()).collect::<Vec<_>>();
        assert_eq!(urls, vec!["https://cdn/720", "https://cdn/1080", "https://cdn/360"]);
    }

    #[test]
    fn tie_goes_to_higher_resolution() {
        let ranked = rank_formats(
            vec![
                entry("https://cdn/240", "240p", Some(240), None),
                entry("https://cdn/480", "480p", Some(480), None),
            ],
            Quality::P360,
        );
        assert_eq!(ranked[0].url, "https://cdn/480");
    }

    #[test]
    fn duplicate_labels_keep_highest_bitrate() {
        let ranked = rank_formats(
            vec![
                entry("https://cdn/720-low", "720p", Some(720), Some(1000.0)),
                entry("https://cdn/720-high", "720p", Some(720), Some(3000.0)),
                entry("https://cdn/480", "480p", Some(480), Some(800.0)),
            ],
            Quality::P720,
        );

        assert_eq!(
            ranked,
            vec![
                Candidate::new("https://cdn/720-high", "720p"),
                Candidate::new("https://cdn/480", "480p"),
            ]
        );
    }

    #[test]
    fn height_from_label_and_missing_urls() {
        let mut no_url = entry("", "1080p", Some(1080), Some(9000.0));
        no_url.url = None;

        let ranked = rank_formats(
            vec![
                no_url,
                entry("https://cdn/a", "1080p60", None, Some(5000.0)),
                entry("https://cdn/b", "audio only", None, Some(128.0)),
                entry("https://cdn/c", "480p", None, Some(900.0)),
            ],
            Quality::P1080,
        );

        assert_eq!(ranked[0], Candidate::new("https://cdn/a", "1080p60"));
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn max_picks_highest() {
        let ranked = rank_formats(
            vec![
                entry("https://cdn/720", "720p", Some(720), None),
                entry("https://cdn/2160", "2160p", Some(2160), None),
            ],
            Quality::Max,
        );
        assert_eq!(ranked[0].url, "https://cdn/2160");
    }

    #[test]
    fn entries_may_carry_label_and_format_note() {
        let parsed: InfoResponse = serde_json::from_str(
            r#"{"formats":[
                {"url":"https://cdn/720","format_note":"HD","label":"720p","height":720,"tbr":1.0},
                {"url":"https://cdn/480","format_note":"480p","tbr":0.5}
            ]}"#,
        )
        .unwrap();

        let InfoResponse::Formats { formats } = parsed else {
            panic!("expected a format list");
        };
        let ranked = rank_formats(formats, Quality::P480);

        assert_eq!(
            ranked,
            vec![
                Candidate::new("https://cdn/480", "480p"),
                Candidate::new("https://cdn/720", "720p"),
            ]
        );
    }

    #[tokio::test]
    async fn resolves_format_list_into_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/info"))
            .and(query_param("url", "https://www.instagram.com/reel/C1xyz/"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "formats": [
                    { "url": "https://cdn/1080", "format_note": "1080p", "height": 1080, "tbr": 4000.0 },
                    { "url": "https://cdn/480", "format_note": "480p", "height": 480, "tbr": 900.0 },
                ],
            })))
            .expect(1)
            .mount(&server)
            .await;

        // "max" is not accepted by the extractor; it is narrowed to 4320 first
        let handler = crate::resolver::handlers::ProviderHandler::new(provider(&server.uri()));
        let outcome = handler.resolve(&request("max")).await;

        assert_eq!(
            outcome,
            ResolutionOutcome::Candidates {
                items: vec![
                    Candidate::new("https://cdn/1080", "1080p"),
                    Candidate::new("https://cdn/480", "480p"),
                ],
            }
        );
    }

    #[tokio::test]
    async fn single_format_is_direct() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "formats": [{ "url": "https://cdn/only", "label": "720p" }],
            })))
            .mount(&server)
            .await;

        let outcome = provider(&server.uri()).resolve(&request("480")).await;

        assert_eq!(outcome, ResolutionOutcome::direct("https://cdn/only"));
    }

    #[tokio::test]
    async fn error_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "error": "Unsupported URL" })),
            )
            .mount(&server)
            .await;

        let outcome = provider(&server.uri()).resolve(&request("480")).await;

        let ResolutionOutcome::Failure { kind, detail } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(kind, ErrorKind::UpstreamRejected);
        assert_eq!(detail["body"]["error"], "Unsupported URL");
    }

    #[tokio::test]
    async fn empty_format_list_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "formats": [] })),
            )
            .mount(&server)
            .await;

        let outcome = provider(&server.uri()).resolve(&request("480")).await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::UnexpectedResponseShape));
    }

    #[tokio::test]
    async fn server_error_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let outcome = provider(&server.uri()).resolve(&request("480")).await;

        let ResolutionOutcome::Failure { kind, detail } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(kind, ErrorKind::UpstreamRejected);
        assert_eq!(detail["status"], 503);
        assert_eq!(detail["body"], "maintenance");
    }
}
