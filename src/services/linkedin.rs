//! LinkedIn REST client and publisher

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use super::{PublishContext, PublishError, PublishOutcome, Publisher, download_media};
use crate::config::LinkedinCredentials;
use crate::models::{FormattedPost, Platform};

const UGC_POSTS_URL: &str = "https://api.linkedin.com/v2/ugcPosts";
const ASSETS_URL: &str = "https://api.linkedin.com/v2/assets?action=registerUpload";

#[derive(Clone)]
pub struct LinkedinClient {
    http: Client,
}

impl LinkedinClient {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }

    /// Create a text or image share. `media_asset` is an asset URN from
    /// `upload_image`.
    pub async fn create_post(
        &self,
        access_token: &str,
        author_urn: &str,
        commentary: &str,
        media_asset: Option<&str>,
    ) -> Result<String, LinkedinError> {
        let media_category = if media_asset.is_some() { "IMAGE" } else { "NONE" };

        let mut share = serde_json::json!({
            "shareCommentary": { "text": commentary },
            "shareMediaCategory": media_category,
        });

        if let Some(asset) = media_asset {
            share["media"] = serde_json::json!([{
                "status": "READY",
                "media": asset,
            }]);
        }

        self.send_ugc_post(access_token, author_urn, share).await
    }

    /// Create an article share pointing at the canonical source URL
    pub async fn create_article_post(
        &self,
        access_token: &str,
        author_urn: &str,
        commentary: &str,
        title: &str,
        description: &str,
        article_url: &str,
    ) -> Result<String, LinkedinError> {
        let share = serde_json::json!({
            "shareCommentary": { "text": commentary },
            "shareMediaCategory": "ARTICLE",
            "media": [{
                "status": "READY",
                "originalUrl": article_url,
                "title": { "text": title },
                "description": { "text": description },
            }],
        });

        self.send_ugc_post(access_token, author_urn, share).await
    }

    async fn send_ugc_post(
        &self,
        access_token: &str,
        author_urn: &str,
        share_content: serde_json::Value,
    ) -> Result<String, LinkedinError> {
        let body = serde_json::json!({
            "author": author_urn,
            "lifecycleState": "PUBLISHED",
            "specificContent": { "com.linkedin.ugc.ShareContent": share_content },
            "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" },
        });

        let resp = self
            .http
            .post(UGC_POSTS_URL)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let restli_id = resp
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(LinkedinError::Api(format!("Status {}: {}", status, text)));
        }

        // Post URN comes back in the X-RestLi-Id header, with the body id
        // as a fallback
        if let Some(id) = restli_id {
            return Ok(id);
        }
        let parsed: UgcPostResponse = serde_json::from_str(&text)
            .map_err(|e| LinkedinError::Api(format!("Failed to parse response: {}", e)))?;
        Ok(parsed.id)
    }

    /// Register and upload an image, returning its asset URN
    pub async fn upload_image(
        &self,
        access_token: &str,
        author_urn: &str,
        data: &[u8],
    ) -> Result<String, LinkedinError> {
        let body = serde_json::json!({
            "registerUploadRequest": {
                "recipes": ["urn:li:digitalmediaRecipe:feedshare-image"],
                "owner": author_urn,
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent",
                }],
            }
        });

        let resp = self
            .http
            .post(ASSETS_URL)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(LinkedinError::Api(format!("Status {}: {}", status, text)));
        }

        let registered: RegisterUploadResponse = serde_json::from_str(&text)
            .map_err(|e| LinkedinError::Api(format!("Failed to parse response: {}", e)))?;
        let upload_url = registered
            .value
            .upload_mechanism
            .media_upload
            .upload_url
            .clone();

        let resp = self
            .http
            .put(&upload_url)
            .header("Authorization", format!("Bearer {}", access_token))
            .body(data.to_vec())
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(LinkedinError::Api(format!(
                "Upload failed - Status {}: {}",
                status, text
            )));
        }

        Ok(registered.value.asset)
    }
}

#[derive(Debug, Deserialize)]
struct UgcPostResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RegisterUploadResponse {
    value: RegisterUploadValue,
}

#[derive(Debug, Deserialize)]
struct RegisterUploadValue {
    asset: String,
    #[serde(rename = "uploadMechanism")]
    upload_mechanism: UploadMechanism,
}

#[derive(Debug, Deserialize)]
struct UploadMechanism {
    #[serde(rename = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest")]
    media_upload: MediaUploadRequest,
}

#[derive(Debug, Deserialize)]
struct MediaUploadRequest {
    #[serde(rename = "uploadUrl")]
    upload_url: String,
}

#[derive(Debug)]
pub enum LinkedinError {
    Http(reqwest::Error),
    Api(String),
}

impl From<reqwest::Error> for LinkedinError {
    fn from(e: reqwest::Error) -> Self {
        LinkedinError::Http(e)
    }
}

impl std::fmt::Display for LinkedinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkedinError::Http(e) => write!(f, "HTTP error: {}", e),
            LinkedinError::Api(s) => write!(f, "LinkedIn API error: {}", s),
        }
    }
}

impl std::error::Error for LinkedinError {}

impl From<LinkedinError> for PublishError {
    fn from(e: LinkedinError) -> Self {
        match e {
            LinkedinError::Http(e) => PublishError::Http(e),
            LinkedinError::Api(s) => PublishError::Api(s),
        }
    }
}

/// `Publisher` for LinkedIn: one single-segment share per note, with
/// article metadata or a re-hosted image when the source carries one.
pub struct LinkedinPublisher {
    client: LinkedinClient,
    http: Client,
    access_token: String,
    author_urn: String,
}

impl LinkedinPublisher {
    pub fn new(creds: &LinkedinCredentials) -> Self {
        LinkedinPublisher {
            client: LinkedinClient::new(),
            http: Client::new(),
            access_token: creds.access_token.clone(),
            author_urn: creds.author_urn.clone(),
        }
    }
}

#[async_trait]
impl Publisher for LinkedinPublisher {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    async fn publish(
        &self,
        post: &FormattedPost,
        context: PublishContext<'_>,
    ) -> Result<PublishOutcome, PublishError> {
        let commentary = post
            .segments
            .first()
            .ok_or_else(|| PublishError::Api("nothing to publish".into()))?;

        let post_id = if let (Some(article), Some(url)) = (context.article, context.source_url) {
            let title = article.title.as_deref().unwrap_or("Untitled");
            let description = article.summary.as_deref().unwrap_or("");
            self.client
                .create_article_post(
                    &self.access_token,
                    &self.author_urn,
                    commentary,
                    title,
                    description,
                    url,
                )
                .await?
        } else if let Some(image_url) = post.media.first() {
            let (bytes, _content_type) = download_media(&self.http, image_url).await?;
            let asset = self
                .client
                .upload_image(&self.access_token, &self.author_urn, &bytes)
                .await?;
            debug!("uploaded LinkedIn asset {}", asset);
            self.client
                .create_post(&self.access_token, &self.author_urn, commentary, Some(&asset))
                .await?
        } else {
            self.client
                .create_post(&self.access_token, &self.author_urn, commentary, None)
                .await?
        };

        let url = format!("https://www.linkedin.com/feed/update/{}/", post_id);
        Ok(PublishOutcome {
            post_id,
            url: Some(url),
        })
    }
}
