use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{helpers::youtube, resolver::platform::Platform};

pub const YOUTUBE_OEMBED_URL: &str = "https://www.youtube.com/oembed";
const OEMBED_TIMEOUT: Duration = Duration::from_secs(15);
const PLACEHOLDER_THUMBNAIL: &str = "https://via.placeholder.com/480x270/667eea/ffffff?text=Video";
const OFFERED_QUALITIES: [&str; 4] = ["1080", "720", "480", "360"];

/// Same escaping as JavaScript's `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: Option<String>,
    author_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityLink {
    pub quality: String,
    pub format: &'static str,
    pub url: String,
    pub direct_download: bool,
}

#[derive(Debug, Serialize)]
pub struct VideoInfo {
    pub success: bool,
    pub platform: Platform,
    pub title: String,
    pub thumbnail: String,
    pub duration: &'static str,
    pub author: String,
    pub qualities: Vec<QualityLink>,
    pub note: String,
}

/// Best-effort metadata. Only YouTube has a metadata source (oEmbed); a
/// failure there only adds a note.
#[tracing::instrument(skip(client, oembed_endpoint))]
pub async fn video_info(client: &reqwest::Client, oembed_endpoint: &str, url: &str) -> VideoInfo {
    let platform = Platform::detect(url);

    let mut title = "Video".to_string();
    let mut author = String::new();
    let mut thumbnail = None;
    let note;

    match youtube::video_id(url).filter(|_| platform == Platform::YouTube) {
        Some(id) => {
            thumbnail = Some(youtube::thumbnail_url(id));

            match fetch_oembed(client, oembed_endpoint, url).await {
                Ok(oembed) => {
                    title = oembed.title.unwrap_or(title);
                    author = oembed.author_name.unwrap_or(author);
                    note = String::new();
                }
                Err(e) => {
                    warn!(?e, "Could not fetch oEmbed metadata");
                    note = "Could not fetch full metadata, but download may still work.".to_string();
                }
            }
        }
        None => {
            title = format!("{platform} Video");
            note = "Metadata may be limited for this platform, but download can still work."
                .to_string();
        }
    }

    VideoInfo {
        success: true,
        platform,
        title,
        thumbnail: thumbnail.unwrap_or_else(|| PLACEHOLDER_THUMBNAIL.to_string()),
        duration: "Available",
        author,
        qualities: quality_links(url),
        note,
    }
}

pub fn quality_links(url: &str) -> Vec<QualityLink> {
    let encoded = utf8_percent_encode(url, URI_COMPONENT).to_string();

    OFFERED_QUALITIES
        .iter()
        .map(|q| QualityLink {
            quality: format!("{q}p"),
            format: "mp4",
            url: format!("/api/download?url={encoded}&quality={q}"),
            direct_download: true,
        })
        .collect()
}

async fn fetch_oembed(
    client: &reqwest::Client,
    oembed_endpoint: &str,
    url: &str,
) -> anyhow::Result<OEmbedResponse> {
    debug!("Fetching oEmbed metadata");

    let resp = client
        .get(oembed_endpoint)
        .query(&[("url", url), ("format", "json")])
        .timeout(OEMBED_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .json::<OEmbedResponse>()
        .await?;

    Ok(resp)
}
