use std::{collections::HashMap, time::Duration};

use thiserror::Error;
use url::Url;

use crate::resolver::{handlers::ProviderKind, platform::Platform};

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_BIND_HOST: &str = "0.0.0.0";
const DEFAULT_COBALT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_EXTRACTOR_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_RETRIES: u32 = 1;
const DEFAULT_CHAIN: [ProviderKind; 2] = [ProviderKind::Cobalt, ProviderKind::Extractor];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown provider {name:?} in {key}")]
    UnknownProvider { key: String, name: String },

    #[error("{key} lists provider {kind}, but no {kind} instance is configured")]
    MissingProvider { key: String, kind: ProviderKind },
}

/// One upstream instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Validated http(s) base URL without a trailing slash
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ProviderConfig {
    /// `kind@host[:port]`
    pub fn id(&self) -> String {
        let host = Url::parse(&self.base_url)
            .ok()
            .and_then(|u| {
                let host = u.host_str()?.to_string();
                Some(match u.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host,
                })
            })
            .unwrap_or_else(|| self.base_url.clone());

        format!("{}@{host}", self.kind)
    }
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_host: String,
    pub port: u16,
    pub providers: Vec<ProviderConfig>,
    pub connect_retries: u32,
    pub chains: HashMap<Platform, Vec<ProviderKind>>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = parse_number(&get, "PORT", DEFAULT_PORT)?;
        let bind_host = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_HOST.to_string());
        let connect_retries = parse_number(&get, "PROVIDER_CONNECT_RETRIES", DEFAULT_CONNECT_RETRIES)?;

        let mut providers = Vec::new();
        for (kind, prefix, default_timeout) in [
            (ProviderKind::Cobalt, "COBALT", DEFAULT_COBALT_TIMEOUT_SECS),
            (ProviderKind::Extractor, "EXTRACTOR", DEFAULT_EXTRACTOR_TIMEOUT_SECS),
        ] {
            let url_key = format!("{prefix}_BASE_URL");
            let timeout_key = format!("{prefix}_TIMEOUT_SECS");
            let api_key = get(&format!("{prefix}_API_KEY"));
            let timeout = Duration::from_secs(parse_number(&get, &timeout_key, default_timeout)?);

            for base_url in get(&url_key).iter().flat_map(|v| v.split(',')) {
                let base_url = base_url.trim();
                if base_url.is_empty() {
                    continue;
                }

                providers.push(ProviderConfig {
                    kind,
                    base_url: parse_base_url(&url_key, base_url)?,
                    api_key: api_key.clone(),
                    timeout,
                });
            }
        }

        let configured = |kind: ProviderKind| providers.iter().any(|p| p.kind == kind);

        let default_chain = match lookup("RESOLVER_CHAIN") {
            Some(value) => parse_chain("RESOLVER_CHAIN", &value)?,
            None => DEFAULT_CHAIN
                .into_iter()
                .filter(|kind| configured(*kind))
                .collect(),
        };

        let mut chains = HashMap::new();
        for platform in Platform::KNOWN.into_iter().chain([Platform::Unknown]) {
            let key = format!("RESOLVER_CHAIN_{}", platform.env_key());
            let chain = match lookup(&key) {
                Some(value) => parse_chain(&key, &value)?,
                None if platform == Platform::Unknown => Vec::new(),
                None => default_chain.clone(),
            };

            if let Some(kind) = chain.iter().find(|kind| !configured(**kind)) {
                return Err(ConfigError::MissingProvider { key, kind: *kind });
            }

            chains.insert(platform, chain);
        }

        Ok(Self {
            bind_host,
            port,
            providers,
            connect_retries,
            chains,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.providers.iter().any(|p| p.kind == kind)
    }
}

fn parse_number<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_base_url(key: &str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim_end_matches('/');
    let invalid = |reason: String| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    };

    let url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("expected an http(s) URL".to_string()));
    }

    Ok(trimmed.to_string())
}

fn parse_chain(key: &str, value: &str) -> Result<Vec<ProviderKind>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<ProviderKind>()
                .map_err(|name| ConfigError::UnknownProvider {
                    key: key.to_string(),
                    name,
                })
        })
        .collect()
}
