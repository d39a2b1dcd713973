mod config;
mod helpers;
mod projector;
mod resolver;
mod server;

use anyhow::Context;
use config::Config;
use resolver::{handlers::ProviderKind, Resolver};
use server::AppState;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{filter::Builder as TracingFilterBuilder, util::SubscriberInitExt};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match dotenvy::dotenv() {
        Err(e) if e.not_found() => {}
        Ok(_) => {}
        Err(e) => {
            return Err(e).context("Failed to load .env file");
        }
    }

    init_log();

    info!("Starting link resolver...");

    let config = Config::from_env().context("Invalid configuration")?;

    if config.providers.is_empty() {
        warn!("No providers configured. Set COBALT_BASE_URL and/or EXTRACTOR_BASE_URL.");
    }

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;

    let resolver = Resolver::from_config(&config, &client);
    info!(providers = ?resolver.provider_ids(), "Providers ready");

    let state = AppState::new(resolver, client, config.is_configured(ProviderKind::Cobalt));

    server::serve(&config, state).await
}

fn init_log() {
    tracing_subscriber::fmt()
        .with_ansi(true)
        .with_env_filter(
            TracingFilterBuilder::default()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .finish()
        .init();
}
