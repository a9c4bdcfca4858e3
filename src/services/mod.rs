//! Outbound service clients and the publisher seam

use async_trait::async_trait;

use crate::models::{ArticleMeta, FormattedPost, Platform};

pub mod linkedin;
pub mod nip19;
pub mod relay;
pub mod twitter;

/// Extra context a publisher may need beyond the rendered segments
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishContext<'a> {
    /// Long-form metadata when the source is a kind-30023 article
    pub article: Option<&'a ArticleMeta>,
    /// Canonical link back to the source note
    pub source_url: Option<&'a str>,
}

/// Result of a successful publish
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub post_id: String,
    pub url: Option<String>,
}

#[derive(Debug)]
pub enum PublishError {
    Http(reqwest::Error),
    Api(String),
}

impl From<reqwest::Error> for PublishError {
    fn from(e: reqwest::Error) -> Self {
        PublishError::Http(e)
    }
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Http(e) => write!(f, "HTTP error: {}", e),
            PublishError::Api(s) => write!(f, "API error: {}", s),
        }
    }
}

impl std::error::Error for PublishError {}

/// Pluggable outbound publisher, one per destination platform
#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> Platform;

    async fn publish(
        &self,
        post: &FormattedPost,
        context: PublishContext<'_>,
    ) -> Result<PublishOutcome, PublishError>;
}

/// Download a media file so it can be re-uploaded to the destination
/// platform. Returns the bytes and a content type.
pub async fn download_media(
    http: &reqwest::Client,
    url: &str,
) -> Result<(Vec<u8>, String), PublishError> {
    let resp = http.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(PublishError::Api(format!(
            "media download failed with status {} for {}",
            resp.status(),
            url
        )));
    }

    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| guess_content_type(url).to_string());

    let bytes = resp.bytes().await?;
    Ok((bytes.to_vec(), content_type))
}

fn guess_content_type(url: &str) -> &'static str {
    let path = url.split('?').next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}
