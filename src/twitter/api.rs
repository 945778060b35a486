//! Twitter API v2 client: single lookup, recent conversation search and
//! bulk lookup by id.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::models::{Author, Media, Post, PostBatch, ReferencedPost};
use crate::config::Config;
use crate::constants::{INGEST_USER_AGENT, MAX_IDS_PER_LOOKUP};

const EXPANSIONS: &str = "author_id,attachments.media_keys,referenced_tweets.id";
const TWEET_FIELDS: &str = "attachments,author_id,conversation_id,created_at,referenced_tweets,text";
const USER_FIELDS: &str = "name,username,profile_image_url";
const MEDIA_FIELDS: &str = "media_key,preview_image_url,type,url";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("TWITTER_BEARER_TOKEN is not configured")]
    AuthenticationMissing,
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },
    #[error("post {0} not found")]
    NotFound(String),
}

impl FetchError {
    /// Configuration failures are fatal and must not be retried.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::AuthenticationMissing)
    }
}

/// Source of post data keyed by id or conversation.
#[async_trait]
pub trait TweetSource: Send + Sync {
    /// Fetch a single post with its author and media.
    async fn lookup(&self, post_id: &str) -> Result<PostBatch, FetchError>;

    /// Posts by `handle` in the conversation, newest first, at most one page.
    /// Only covers the search API's recency window.
    async fn search_recent(
        &self,
        conversation_id: &str,
        handle: &str,
    ) -> Result<PostBatch, FetchError>;

    /// Resolve ids to posts. Unknown ids are silently absent from the result.
    async fn lookup_many(&self, ids: &[String]) -> Result<PostBatch, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
    #[serde(default)]
    includes: Includes,
    meta: Option<Meta>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<RawUser>,
    #[serde(default)]
    media: Vec<RawMedia>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    result_count: u32,
}

#[derive(Debug, Deserialize)]
struct RawTweet {
    id: String,
    text: String,
    author_id: String,
    created_at: DateTime<Utc>,
    conversation_id: Option<String>,
    #[serde(default)]
    referenced_tweets: Vec<ReferencedPost>,
    attachments: Option<RawAttachments>,
}

#[derive(Debug, Deserialize)]
struct RawAttachments {
    #[serde(default)]
    media_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    name: String,
    username: String,
    profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    media_key: String,
    #[serde(rename = "type")]
    kind: String,
    preview_image_url: Option<String>,
    url: Option<String>,
}

impl From<RawTweet> for Post {
    fn from(raw: RawTweet) -> Self {
        Self {
            conversation_id: raw.conversation_id.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            author_id: raw.author_id,
            text: raw.text,
            created_at: raw.created_at,
            referenced_posts: raw.referenced_tweets,
            attachment_media_keys: raw.attachments.map(|a| a.media_keys).unwrap_or_default(),
        }
    }
}

impl From<RawUser> for Author {
    fn from(raw: RawUser) -> Self {
        Self {
            id: raw.id,
            display_name: raw.name,
            handle: raw.username,
            avatar_url: raw.profile_image_url,
        }
    }
}

impl From<RawMedia> for Media {
    fn from(raw: RawMedia) -> Self {
        // Photos only carry `url`; videos and GIFs carry a preview image.
        let preview_url = raw
            .preview_image_url
            .or_else(|| raw.url.clone())
            .unwrap_or_default();
        Self {
            key: raw.media_key,
            kind: raw.kind,
            preview_url,
            url: raw.url,
        }
    }
}

fn into_batch(posts: Vec<RawTweet>, includes: Includes) -> PostBatch {
    PostBatch {
        posts: posts.into_iter().map(Post::from).collect(),
        authors: includes.users.into_iter().map(Author::from).collect(),
        media: includes.media.into_iter().map(Media::from).collect(),
    }
}

/// HTTP client for the Twitter API.
pub struct TwitterApiClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    page_size: u32,
}

impl TwitterApiClient {
    /// Build a client from configuration. A missing token is not an error
    /// here; every call reports it instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(INGEST_USER_AGENT)
            .timeout(config.http_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.twitter_api_base_url.trim_end_matches('/').to_string(),
            bearer_token: config.twitter_bearer_token.clone(),
            page_size: config.search_page_size,
        })
    }

    fn token(&self) -> Result<&str, FetchError> {
        self.bearer_token
            .as_deref()
            .ok_or(FetchError::AuthenticationMissing)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<T>, FetchError> {
        let token = self.token()?;
        let url = format!("{}{endpoint}", self.base_url);

        let transport = |source: reqwest::Error| FetchError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .query(&[
                ("expansions", EXPANSIONS),
                ("tweet.fields", TWEET_FIELDS),
                ("user.fields", USER_FIELDS),
                ("media.fields", MEDIA_FIELDS),
            ])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|source: reqwest::Error| {
            if source.is_decode() {
                FetchError::Decode {
                    endpoint: endpoint.to_string(),
                    source,
                }
            } else {
                transport(source)
            }
        })
    }
}

#[async_trait]
impl TweetSource for TwitterApiClient {
    async fn lookup(&self, post_id: &str) -> Result<PostBatch, FetchError> {
        let endpoint = format!("/2/tweets/{post_id}");
        let response: ApiResponse<RawTweet> = self.get(&endpoint, &[]).await?;

        let tweet = response
            .data
            .ok_or_else(|| FetchError::NotFound(post_id.to_string()))?;
        Ok(into_batch(vec![tweet], response.includes))
    }

    async fn search_recent(
        &self,
        conversation_id: &str,
        handle: &str,
    ) -> Result<PostBatch, FetchError> {
        let query = format!("conversation_id:{conversation_id} from:{handle}");
        let max_results = self.page_size.to_string();

        let response: ApiResponse<Vec<RawTweet>> = self
            .get(
                "/2/tweets/search/recent",
                &[("query", query.as_str()), ("max_results", max_results.as_str())],
            )
            .await?;

        let result_count = response.meta.as_ref().map_or(0, |m| m.result_count);
        debug!(conversation_id, handle, result_count, "Recent search finished");

        match response.data {
            Some(tweets) if result_count > 0 => Ok(into_batch(tweets, response.includes)),
            _ => Ok(PostBatch::default()),
        }
    }

    async fn lookup_many(&self, ids: &[String]) -> Result<PostBatch, FetchError> {
        self.token()?;

        let mut batch = PostBatch::default();
        for chunk in ids.chunks(MAX_IDS_PER_LOOKUP) {
            let joined = chunk.join(",");
            let response: ApiResponse<Vec<RawTweet>> =
                self.get("/2/tweets", &[("ids", joined.as_str())]).await?;
            if let Some(tweets) = response.data {
                batch.extend(into_batch(tweets, response.includes));
            }
        }

        debug!(requested = ids.len(), resolved = batch.posts.len(), "Bulk lookup finished");
        Ok(batch)
    }
}
