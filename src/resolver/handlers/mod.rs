pub(super) mod cobalt;
pub(super) mod extractor;

use std::{fmt::Display, str::FromStr, time::Duration};

use reqwest::{RequestBuilder, Response};
use tracing::{debug, warn};
use tryhard::RetryPolicy;

pub use cobalt::CobaltProvider;
pub use extractor::ExtractorProvider;

use super::{
    outcome::{ErrorKind, ResolutionOutcome, ResolutionRequest},
    quality::QualitySet,
};

const CONNECT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Cobalt,
    Extractor,
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cobalt => f.write_str("cobalt"),
            Self::Extractor => f.write_str("extractor"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cobalt" => Ok(Self::Cobalt),
            "extractor" => Ok(Self::Extractor),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct ProviderHandler {
    provider: Box<dyn Handler>,
}
impl ProviderHandler {
    pub fn new<T>(provider: T) -> Self
    where
        T: Handler + 'static,
    {
        Self {
            provider: Box::new(provider),
        }
    }

    pub fn id(&self) -> &str {
        self.provider.id()
    }

    /// Run the provider with the quality narrowed to what it accepts. The
    /// call is cut off after the provider's timeout.
    pub async fn resolve(&self, request: &ResolutionRequest) -> ResolutionOutcome {
        let request = request.for_provider(self.provider.qualities());
        let timeout = self.provider.timeout();

        match tokio::time::timeout(timeout, self.provider.resolve(&request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(provider = self.id(), ?timeout, "Provider call timed out");
                ResolutionOutcome::failure(
                    ErrorKind::Timeout,
                    serde_json::json!({
                        "provider": self.id(),
                        "message": "Provider did not answer in time",
                        "timeoutMs": u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    }),
                )
            }
        }
    }
}

/// One upstream resolver. Ordinary upstream failures come back as
/// `ResolutionOutcome::Failure`, never as panics or errors.
#[async_trait::async_trait]
pub trait Handler: std::fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    fn qualities(&self) -> &QualitySet;

    fn timeout(&self) -> Duration;

    async fn resolve(&self, request: &ResolutionRequest) -> ResolutionOutcome;
}

/// Send a request, retrying only when the connection itself could not be
/// established.
pub(super) async fn send_with_retry<F>(build: F, retries: u32) -> Result<Response, reqwest::Error>
where
    F: Fn() -> RequestBuilder,
{
    tryhard::retry_fn(|| build().send())
        .retries(retries)
        .custom_backoff(|_attempt, err: &reqwest::Error| {
            if err.is_connect() {
                RetryPolicy::Delay(CONNECT_RETRY_BACKOFF)
            } else {
                RetryPolicy::Break
            }
        })
        .on_retry(|attempt, _next_delay, err: &reqwest::Error| {
            let e = err.to_string();

            async move {
                debug!(attempt, ?e, "Retrying provider request");
            }
        })
        .await
}

pub(super) fn transport_failure(
    provider_id: &str,
    err: &reqwest::Error,
    sent: serde_json::Value,
) -> ResolutionOutcome {
    let kind = if err.is_timeout() {
        ErrorKind::Timeout
    } else {
        ErrorKind::TransportFailure
    };

    warn!(provider = provider_id, %kind, ?err, "Provider request failed");

    ResolutionOutcome::failure(
        kind,
        serde_json::json!({
            "provider": provider_id,
            "message": err.to_string(),
            "sentBody": sent,
        }),
    )
}

/// Body as JSON when it parses, as a plain string otherwise
pub(super) fn body_value(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::Value::String(body.to_string()))
}
