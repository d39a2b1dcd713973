pub mod handlers;
pub mod outcome;
pub mod platform;
pub mod quality;

use std::{collections::HashMap, sync::Arc, time::Instant};

use tracing::{debug, info, warn};

use crate::config::Config;
use handlers::{CobaltProvider, ExtractorProvider, ProviderHandler, ProviderKind};
use outcome::{ErrorKind, ProviderAttempt, ResolutionOutcome, ResolutionRequest};
use platform::Platform;

/// Final outcome plus every provider call made to reach it
#[derive(Debug, Clone)]
pub struct Resolution {
    pub outcome: ResolutionOutcome,
    pub attempts: Vec<ProviderAttempt>,
}

/// Ordered provider chains per platform. Providers in a chain are tried one
/// after another; the first usable answer ends the search.
#[derive(Debug, Default)]
pub struct Resolver {
    chains: HashMap<Platform, Vec<Arc<ProviderHandler>>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config, client: &reqwest::Client) -> Self {
        let mut by_kind: HashMap<ProviderKind, Vec<Arc<ProviderHandler>>> = HashMap::new();

        for provider in &config.providers {
            let id = provider.id();
            let handler = match provider.kind {
                ProviderKind::Cobalt => ProviderHandler::new(CobaltProvider::new(
                    id,
                    provider,
                    config.connect_retries,
                    client.clone(),
                )),
                ProviderKind::Extractor => ProviderHandler::new(ExtractorProvider::new(
                    id,
                    provider,
                    config.connect_retries,
                    client.clone(),
                )),
            };

            by_kind.entry(provider.kind).or_default().push(Arc::new(handler));
        }

        config
            .chains
            .iter()
            .fold(Self::new(), |resolver, (platform, kinds)| {
                let chain = kinds
                    .iter()
                    .flat_map(|kind| by_kind.get(kind).into_iter().flatten().cloned())
                    .collect();
                resolver.with_chain(*platform, chain)
            })
    }

    pub fn with_chain(mut self, platform: Platform, chain: Vec<Arc<ProviderHandler>>) -> Self {
        self.set_chain(platform, chain);
        self
    }

    pub fn set_chain(&mut self, platform: Platform, chain: Vec<Arc<ProviderHandler>>) {
        self.chains.insert(platform, chain);
    }

    pub fn chain(&self, platform: Platform) -> &[Arc<ProviderHandler>] {
        self.chains.get(&platform).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every distinct provider id, in first-seen order over known platforms
    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        for platform in Platform::KNOWN.into_iter().chain([Platform::Unknown]) {
            for handler in self.chain(platform) {
                if !ids.contains(&handler.id()) {
                    ids.push(handler.id());
                }
            }
        }
        ids
    }

    #[tracing::instrument(skip_all, fields(url = ?request.source_url().as_str(), platform = %request.platform(), quality = %request.requested_quality()))]
    pub async fn resolve(&self, request: &ResolutionRequest) -> Resolution {
        let chain = self.chain(request.platform());
        let mut attempts = Vec::with_capacity(chain.len());

        if chain.is_empty() {
            warn!("No providers configured for platform");
            return Resolution {
                outcome: ResolutionOutcome::failure(
                    ErrorKind::Unsupported,
                    serde_json::json!({
                        "platform": request.platform(),
                        "message": "No providers configured for this platform",
                    }),
                ),
                attempts,
            };
        }

        info!(count = chain.len(), "Resolving download link");

        for handler in chain {
            debug!(provider = handler.id(), "Trying provider");

            let start = Instant::now();
            let outcome = handler.resolve(request).await;
            let elapsed = start.elapsed();

            attempts.push(ProviderAttempt {
                provider_id: handler.id().to_string(),
                outcome: outcome.clone(),
                elapsed,
            });

            match &outcome {
                ResolutionOutcome::Direct { .. } | ResolutionOutcome::Candidates { .. } => {
                    info!(provider = handler.id(), ?elapsed, "Provider resolved link");
                    return Resolution { outcome, attempts };
                }

                ResolutionOutcome::DeferredProcessing { reason } => {
                    info!(provider = handler.id(), ?reason, "Provider needs local processing");
                    return Resolution { outcome, attempts };
                }

                ResolutionOutcome::Failure { kind, .. } => {
                    warn!(provider = handler.id(), %kind, ?elapsed, "Provider failed");
                }
            }
        }

        warn!(tried = attempts.len(), "All providers failed");

        let outcome = ResolutionOutcome::failure(
            ErrorKind::AllProvidersExhausted,
            serde_json::json!({
                "attempts": attempts.iter().map(ProviderAttempt::to_debug_json).collect::<Vec<_>>(),
            }),
        );

        Resolution { outcome, attempts }
    }
}
