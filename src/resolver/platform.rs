use std::fmt::Display;

use serde::Serialize;
use url::Url;

use crate::helpers::domain::DomainParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Platform {
    YouTube,
    Instagram,
    Facebook,
    TikTok,
    #[serde(rename = "Twitter/X")]
    TwitterX,
    Unknown,
}

#[derive(Debug, Clone, Copy)]
enum HostRule {
    /// Host name contains the fragment anywhere
    Contains(&'static str),
    /// Registrable root domain equals the value
    Root(&'static str),
}

const HOST_TABLE: &[(HostRule, Platform)] = &[
    (HostRule::Contains("youtube"), Platform::YouTube),
    (HostRule::Root("youtu.be"), Platform::YouTube),
    (HostRule::Root("instagram.com"), Platform::Instagram),
    (HostRule::Root("facebook.com"), Platform::Facebook),
    (HostRule::Root("fb.watch"), Platform::Facebook),
    (HostRule::Root("tiktok.com"), Platform::TikTok),
    (HostRule::Root("twitter.com"), Platform::TwitterX),
    (HostRule::Root("x.com"), Platform::TwitterX),
];

impl Platform {
    pub const KNOWN: [Self; 5] = [
        Self::YouTube,
        Self::Instagram,
        Self::Facebook,
        Self::TikTok,
        Self::TwitterX,
    ];

    /// Classify a URL by its host name. Anything that does not parse as an
    /// absolute URL is `Unknown`.
    pub fn detect(url: &str) -> Self {
        let Ok(url) = Url::parse(url.trim()) else {
            return Self::Unknown;
        };

        Self::detect_url(&url)
    }

    pub fn detect_url(url: &Url) -> Self {
        let Some(host) = DomainParser::get_host(url) else {
            return Self::Unknown;
        };
        let root = DomainParser::get_domain_root(url);

        HOST_TABLE
            .iter()
            .find(|(rule, _)| match rule {
                HostRule::Contains(fragment) => host.contains(fragment),
                HostRule::Root(expected) => root == Some(*expected),
            })
            .map_or(Self::Unknown, |(_, platform)| *platform)
    }

    /// Key used in `RESOLVER_CHAIN_<KEY>` environment variables
    pub const fn env_key(self) -> &'static str {
        match self {
            Self::YouTube => "YOUTUBE",
            Self::Instagram => "INSTAGRAM",
            Self::Facebook => "FACEBOOK",
            Self::TikTok => "TIKTOK",
            Self::TwitterX => "TWITTER",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::YouTube => f.write_str("YouTube"),
            Self::Instagram => f.write_str("Instagram"),
            Self::Facebook => f.write_str("Facebook"),
            Self::TikTok => f.write_str("TikTok"),
            Self::TwitterX => f.write_str("Twitter/X"),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}
