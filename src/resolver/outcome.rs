use std::{fmt::Display, time::Duration};

use serde::Serialize;
use url::Url;

use super::{
    platform::Platform,
    quality::{self, Quality, QualitySet},
};

/// One incoming resolution call. Built once and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    source_url: Url,
    platform: Platform,
    requested_quality: Quality,
}

impl ResolutionRequest {
    pub fn new(source_url: Url, requested_quality: Option<&str>) -> Self {
        let platform = Platform::detect_url(&source_url);
        let requested_quality = quality::normalize(requested_quality, &QualitySet::all());

        Self {
            source_url,
            platform,
            requested_quality,
        }
    }

    pub const fn source_url(&self) -> &Url {
        &self.source_url
    }

    pub const fn platform(&self) -> Platform {
        self.platform
    }

    pub const fn requested_quality(&self) -> Quality {
        self.requested_quality
    }

    /// The same request with its quality moved into what a provider accepts
    pub fn for_provider(&self, allowed: &QualitySet) -> Self {
        Self {
            requested_quality: quality::normalize(Some(self.requested_quality.as_str()), allowed),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Unsupported,
    UpstreamRejected,
    Timeout,
    TransportFailure,
    UnexpectedResponseShape,
    AllProvidersExhausted,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput => f.write_str("invalid input"),
            Self::Unsupported => f.write_str("unsupported"),
            Self::UpstreamRejected => f.write_str("upstream rejected the request"),
            Self::Timeout => f.write_str("timeout"),
            Self::TransportFailure => f.write_str("transport failure"),
            Self::UnexpectedResponseShape => f.write_str("unexpected response shape"),
            Self::AllProvidersExhausted => f.write_str("all providers exhausted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub url: String,
    pub label: String,
}

impl Candidate {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    Direct { url: String },
    /// Never empty; the first item is the default pick
    Candidates { items: Vec<Candidate> },
    DeferredProcessing { reason: String },
    Failure {
        kind: ErrorKind,
        detail: serde_json::Value,
    },
}

impl ResolutionOutcome {
    pub fn direct(url: impl Into<String>) -> Self {
        Self::Direct { url: url.into() }
    }

    pub fn failure(kind: ErrorKind, detail: serde_json::Value) -> Self {
        Self::Failure { kind, detail }
    }

    /// `Candidates` with a single item collapses into `Direct`; an empty list
    /// is not a valid success.
    pub fn from_candidates(mut items: Vec<Candidate>) -> Option<Self> {
        match items.len() {
            0 => None,
            1 => items.pop().map(|c| Self::Direct { url: c.url }),
            _ => Some(Self::Candidates { items }),
        }
    }

    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::Candidates { .. } => "candidates",
            Self::DeferredProcessing { .. } => "deferred_processing",
            Self::Failure { .. } => "failure",
        }
    }
}

/// Diagnostic record of one provider call
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderAttempt {
    pub provider_id: String,
    pub outcome: ResolutionOutcome,
    pub elapsed: Duration,
}

impl ProviderAttempt {
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn to_debug_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "provider": self.provider_id,
            "outcome": self.outcome.label(),
            "elapsedMs": self.elapsed_ms(),
        });

        match &self.outcome {
            ResolutionOutcome::Failure { kind, detail } => {
                value["kind"] = serde_json::json!(kind);
                value["detail"] = detail.clone();
            }
            ResolutionOutcome::DeferredProcessing { reason } => {
                value["reason"] = serde_json::json!(reason);
            }
            ResolutionOutcome::Direct { .. } | ResolutionOutcome::Candidates { .. } => {}
        }

        value
    }
}
