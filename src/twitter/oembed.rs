//! oEmbed client and parsing of the returned blockquote fragment.

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::constants::INGEST_USER_AGENT;

static PARAGRAPH_SELECTOR: std::sync::LazyLock<Selector> =
    std::sync::LazyLock::new(|| Selector::parse("blockquote p").unwrap());

static LINK_SELECTOR: std::sync::LazyLock<Selector> =
    std::sync::LazyLock::new(|| Selector::parse("blockquote > a").unwrap());

/// Subset of the oEmbed response we use.
#[derive(Debug, Clone, Deserialize)]
pub struct OembedResponse {
    pub html: String,
    pub author_name: String,
    /// Profile page of the author, linked from the document head.
    #[serde(default)]
    pub author_url: Option<String>,
}

/// Text pulled out of the embed fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedContent {
    /// Post body, from the first paragraph of the blockquote.
    pub body_text: String,
    /// Text of the trailing permalink, e.g. `January 2, 2024`.
    pub published_text: Option<String>,
}

/// Parse the blockquote fragment returned by the oEmbed endpoint.
#[must_use]
pub fn parse_embed_fragment(html: &str) -> EmbedContent {
    let fragment = Html::parse_fragment(html);

    let body_text = fragment
        .select(&PARAGRAPH_SELECTOR)
        .next()
        .map(|p| p.text().collect::<String>())
        .unwrap_or_default();

    let published_text = fragment
        .select(&LINK_SELECTOR)
        .last()
        .map(|a| a.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty());

    EmbedContent {
        body_text,
        published_text,
    }
}

pub struct OembedClient {
    client: reqwest::Client,
    endpoint: String,
}

impl OembedClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(INGEST_USER_AGENT)
            .timeout(config.http_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.twitter_oembed_url.clone(),
        })
    }

    /// Fetch the embed for a status URL. No credential is required.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status or an
    /// undecodable body.
    pub async fn fetch(&self, status_url: &str) -> Result<OembedResponse> {
        debug!(url = %status_url, "Fetching oEmbed");

        let response: OembedResponse = self
            .client
            .get(&self.endpoint)
            .query(&[("url", status_url), ("omit_script", "true")])
            .send()
            .await
            .context("Failed to fetch oEmbed")?
            .error_for_status()
            .context("oEmbed returned error")?
            .json()
            .await
            .context("Failed to parse oEmbed response")?;

        Ok(response)
    }
}
