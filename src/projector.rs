use axum::http::StatusCode;

use crate::resolver::{
    outcome::{ErrorKind, ResolutionOutcome},
    Resolution,
};

pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate download link. Please try again.";

/// How the caller wants multiple candidates delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Go straight to the first (best) link
    #[default]
    Download,
    /// List every link so the caller can choose
    Choose,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExternalResult {
    Redirect(String),
    Payload(serde_json::Value),
    Error {
        status: StatusCode,
        message: String,
        detail: serde_json::Value,
    },
}

pub struct OutcomeProjector;
impl OutcomeProjector {
    pub fn project(resolution: &Resolution, delivery: Delivery) -> ExternalResult {
        match &resolution.outcome {
            ResolutionOutcome::Direct { url } => ExternalResult::Redirect(url.clone()),

            ResolutionOutcome::Candidates { items } => match (delivery, items.first()) {
                (Delivery::Download, Some(first)) => ExternalResult::Redirect(first.url.clone()),
                _ => ExternalResult::Payload(serde_json::json!({
                    "success": true,
                    "status": "picker",
                    "items": items,
                })),
            },

            ResolutionOutcome::DeferredProcessing { reason } => ExternalResult::Error {
                status: StatusCode::CONFLICT,
                message: "This media needs local processing (such as merging separate audio and \
                          video streams), which this server does not perform."
                    .to_string(),
                detail: serde_json::json!({
                    "reason": reason,
                    "providersTried": Self::providers_tried(resolution),
                }),
            },

            ResolutionOutcome::Failure { kind, detail } => ExternalResult::Error {
                status: Self::status_for(*kind),
                message: Self::message_for(*kind).to_string(),
                detail: serde_json::json!({
                    "kind": kind,
                    "detail": detail,
                    "providersTried": Self::providers_tried(resolution),
                }),
            },
        }
    }

    /// Error for input rejected before any provider ran
    pub fn invalid_input(message: impl Into<String>, detail: serde_json::Value) -> ExternalResult {
        ExternalResult::Error {
            status: Self::status_for(ErrorKind::InvalidInput),
            message: message.into(),
            detail: serde_json::json!({
                "kind": ErrorKind::InvalidInput,
                "detail": detail,
            }),
        }
    }

    pub const fn status_for(kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unsupported => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::UpstreamRejected
            | ErrorKind::TransportFailure
            | ErrorKind::UnexpectedResponseShape
            | ErrorKind::AllProvidersExhausted => StatusCode::BAD_GATEWAY,
        }
    }

    const fn message_for(kind: ErrorKind) -> &'static str {
        match kind {
            ErrorKind::InvalidInput => "The provided URL is not valid.",
            ErrorKind::Unsupported => "Downloads from this platform are not supported.",
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }

    fn providers_tried(resolution: &Resolution) -> Vec<&str> {
        resolution
            .attempts
            .iter()
            .map(|a| a.provider_id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::resolver::outcome::{Candidate, ProviderAttempt};

    fn resolution(outcome: ResolutionOutcome) -> Resolution {
        Resolution {
            attempts: vec![ProviderAttempt {
                provider_id: "cobalt@a".to_string(),
                outcome: outcome.clone(),
                elapsed: Duration::from_millis(5),
            }],
            outcome,
        }
    }

    fn candidates() -> ResolutionOutcome {
        ResolutionOutcome::Candidates {
            items: vec![
                Candidate::new("https://cdn/1.mp4", "video-1"),
                Candidate::new("https://cdn/2.jpg", "photo-2"),
            ],
        }
    }

    #[test]
    fn direct_redirects() {
        let result = OutcomeProjector::project(
            &resolution(ResolutionOutcome::direct("https://cdn/v.mp4")),
            Delivery::Choose,
        );

        assert_eq!(result, ExternalResult::Redirect("https://cdn/v.mp4".to_string()));
    }

    #[test]
    fn candidates_follow_delivery() {
        let download = OutcomeProjector::project(&resolution(candidates()), Delivery::Download);
        assert_eq!(download, ExternalResult::Redirect("https://cdn/1.mp4".to_string()));

        let choose = OutcomeProjector::project(&resolution(candidates()), Delivery::Choose);
        let ExternalResult::Payload(body) = choose else {
            panic!("expected payload");
        };
        assert_eq!(body["items"][1]["label"], "photo-2");
        assert_eq!(body["status"], "picker");
    }

    #[test]
    fn deferred_is_conflict() {
        let result = OutcomeProjector::project(
            &resolution(ResolutionOutcome::DeferredProcessing {
                reason: "merge".to_string(),
            }),
            Delivery::Download,
        );

        let ExternalResult::Error { status, detail, .. } = result else {
            panic!("expected error");
        };
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(detail["reason"], "merge");
    }

    #[test]
    fn failure_keeps_detail_and_maps_status() {
        let result = OutcomeProjector::project(
            &resolution(ResolutionOutcome::failure(
                ErrorKind::AllProvidersExhausted,
                serde_json::json!({ "attempts": ["raw"] }),
            )),
            Delivery::Download,
        );

        let ExternalResult::Error {
            status,
            message,
            detail,
        } = result
        else {
            panic!("expected error");
        };
        assert!(status.is_server_error());
        assert_eq!(message, GENERIC_FAILURE_MESSAGE);
        assert_eq!(detail["kind"], "all_providers_exhausted");
        assert_eq!(detail["detail"]["attempts"][0], "raw");
        assert_eq!(detail["providersTried"][0], "cobalt@a");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            OutcomeProjector::status_for(ErrorKind::Unsupported),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            OutcomeProjector::status_for(ErrorKind::Timeout),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            OutcomeProjector::status_for(ErrorKind::InvalidInput),
            StatusCode::BAD_REQUEST
        );
    }
}
