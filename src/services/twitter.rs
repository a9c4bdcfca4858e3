//! X API v2 client and publisher

use async_trait::async_trait;
use base64::Engine;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{PublishContext, PublishError, PublishOutcome, Publisher, download_media};
use crate::config::TwitterCredentials;
use crate::models::{FormattedPost, Platform};

/// Max images attachable to a single tweet
const MAX_TWEET_MEDIA: usize = 4;

#[derive(Clone)]
pub struct TwitterClient {
    client_id: String,
    client_secret: String,
    http: Client,
}

impl TwitterClient {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            http: Client::new(),
        }
    }

    /// Build Basic auth header for OAuth token requests
    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    /// Refresh an access token
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, TwitterError> {
        let url = "https://api.x.com/2/oauth2/token";

        let params = [
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let resp = self
            .http
            .post(url)
            .header("Authorization", self.basic_auth_header())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&params)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(TwitterError::Api(text));
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token)
    }

    /// Post a tweet.
    ///
    /// `in_reply_to` chains the tweet onto a previous one when posting a
    /// thread; `media_ids` come from `upload_media`.
    pub async fn post_tweet(
        &self,
        access_token: &str,
        text: &str,
        in_reply_to: Option<&str>,
        media_ids: Option<&[String]>,
    ) -> Result<TweetResponse, TwitterError> {
        let url = "https://api.x.com/2/tweets";

        let mut body = serde_json::json!({ "text": text });

        if let Some(parent_id) = in_reply_to {
            body["reply"] = serde_json::json!({
                "in_reply_to_tweet_id": parent_id
            });
        }

        if let Some(ids) = media_ids {
            if !ids.is_empty() {
                body["media"] = serde_json::json!({
                    "media_ids": ids
                });
            }
        }

        let resp = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(TwitterError::Api(text));
        }

        let wrapper: TweetResponseWrapper = resp.json().await?;
        Ok(wrapper.data)
    }

    /// Upload an image via the v2 media endpoint, returning its media id
    pub async fn upload_media(
        &self,
        access_token: &str,
        data: &[u8],
        media_type: &str,
    ) -> Result<String, TwitterError> {
        let url = "https://api.x.com/2/media/upload";

        let media_category = if media_type == "image/gif" {
            "tweet_gif"
        } else {
            "tweet_image"
        };

        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .mime_str(media_type)
            .map_err(|e| TwitterError::Api(format!("Invalid mime type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .text("media_category", media_category.to_string())
            .text("media_type", media_type.to_string())
            .part("media", part);

        let resp = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", access_token))
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(TwitterError::Api(format!("Status {}: {}", status, text)));
        }

        let wrapper: MediaUploadResponse = serde_json::from_str(&text).map_err(|e| {
            TwitterError::Api(format!("Failed to parse response: {} - body: {}", e, text))
        })?;
        Ok(wrapper.data.id)
    }
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    data: MediaUploadData,
}

#[derive(Debug, Deserialize)]
struct MediaUploadData {
    id: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub scope: String,
}

#[derive(Debug, Deserialize)]
struct TweetResponseWrapper {
    data: TweetResponse,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TweetResponse {
    pub id: String,
    pub text: String,
}

#[derive(Debug)]
pub enum TwitterError {
    Http(reqwest::Error),
    Api(String),
}

impl From<reqwest::Error> for TwitterError {
    fn from(e: reqwest::Error) -> Self {
        TwitterError::Http(e)
    }
}

impl std::fmt::Display for TwitterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TwitterError::Http(e) => write!(f, "HTTP error: {}", e),
            TwitterError::Api(s) => write!(f, "Twitter API error: {}", s),
        }
    }
}

impl std::error::Error for TwitterError {}

impl From<TwitterError> for PublishError {
    fn from(e: TwitterError) -> Self {
        match e {
            TwitterError::Http(e) => PublishError::Http(e),
            TwitterError::Api(s) => PublishError::Api(s),
        }
    }
}

struct TokenState {
    access_token: String,
    refresh_token: Option<String>,
    refreshed: bool,
}

/// `Publisher` for X: posts a single tweet or a reply-chained thread,
/// re-hosting image media first.
pub struct TwitterPublisher {
    client: TwitterClient,
    http: Client,
    token: Mutex<TokenState>,
}

impl TwitterPublisher {
    pub fn new(creds: &TwitterCredentials) -> Self {
        TwitterPublisher {
            client: TwitterClient::new(&creds.client_id, &creds.client_secret),
            http: Client::new(),
            token: Mutex::new(TokenState {
                access_token: creds.access_token.clone(),
                refresh_token: creds.refresh_token.clone(),
                refreshed: false,
            }),
        }
    }

    /// Refresh the access token once per run when a refresh token is
    /// available. A failed refresh keeps the existing token; the publish
    /// call will surface any auth problem.
    async fn access_token(&self) -> String {
        let mut state = self.token.lock().await;
        if !state.refreshed {
            state.refreshed = true;
            if let Some(refresh) = state.refresh_token.clone() {
                match self.client.refresh_token(&refresh).await {
                    Ok(token) => {
                        debug!("refreshed X access token");
                        state.access_token = token.access_token;
                        if token.refresh_token.is_some() {
                            state.refresh_token = token.refresh_token;
                        }
                    }
                    Err(e) => warn!("X token refresh failed, keeping current token: {}", e),
                }
            }
        }
        state.access_token.clone()
    }

    async fn upload_all_media(
        &self,
        access_token: &str,
        urls: &[String],
    ) -> Result<Vec<String>, PublishError> {
        let mut ids = Vec::new();
        for url in urls.iter().take(MAX_TWEET_MEDIA) {
            let (bytes, content_type) = download_media(&self.http, url).await?;
            let id = self
                .client
                .upload_media(access_token, &bytes, &content_type)
                .await?;
            ids.push(id);
        }
        Ok(ids)
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn publish(
        &self,
        post: &FormattedPost,
        _context: PublishContext<'_>,
    ) -> Result<PublishOutcome, PublishError> {
        let access_token = self.access_token().await;

        let media_ids = self.upload_all_media(&access_token, &post.media).await?;

        let mut first_id: Option<String> = None;
        let mut previous_tweet_id: Option<String> = None;

        for (i, segment) in post.segments.iter().enumerate() {
            // Media rides on the first tweet of the chain only
            let media: Option<&[String]> = if i == 0 && !media_ids.is_empty() {
                Some(&media_ids)
            } else {
                None
            };

            let tweet = self
                .client
                .post_tweet(&access_token, segment, previous_tweet_id.as_deref(), media)
                .await?;

            if first_id.is_none() {
                first_id = Some(tweet.id.clone());
            }
            previous_tweet_id = Some(tweet.id);
        }

        let post_id = first_id.ok_or_else(|| PublishError::Api("nothing to publish".into()))?;
        let url = format!("https://x.com/i/web/status/{}", post_id);
        Ok(PublishOutcome {
            post_id,
            url: Some(url),
        })
    }
}
