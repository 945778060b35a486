use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};

use super::traits::{ContentHandler, PreHandleResult};
use crate::browser::BrowserService;
use crate::config::Config;
use crate::constants::TWITTER_SITE_NAME;
use crate::text::{parse_embed_date, synthesize_title, to_iso8601};
use crate::twitter::document::{render_document, DocumentMeta};
use crate::twitter::oembed::parse_embed_fragment;
use crate::twitter::{
    BrowserReplyScraper, ConversationId, OembedClient, Thread, ThreadLoader, TwitterApiClient,
    STATUS_URL_PATTERN,
};

static PATTERNS: std::sync::LazyLock<Vec<Regex>> =
    std::sync::LazyLock::new(|| vec![STATUS_URL_PATTERN.clone()]);

/// Turns a tweet status URL into an oEmbed-seeded document, annotated with
/// the author's reconstructed thread when one can be recovered.
pub struct TwitterHandler {
    oembed: OembedClient,
    threads: Option<ThreadLoader>,
    web_base_url: String,
}

impl TwitterHandler {
    #[must_use]
    pub fn new(oembed: OembedClient, threads: Option<ThreadLoader>, web_base_url: &str) -> Self {
        Self {
            oembed,
            threads,
            web_base_url: web_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Wire the handler to the real API client and browser scraper.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn from_config(config: &Config, browser: Arc<BrowserService>) -> Result<Self> {
        let oembed = OembedClient::new(config)?;
        let api = TwitterApiClient::new(config)?;
        let scraper = BrowserReplyScraper::new(browser, config);

        if config.twitter_bearer_token.is_none() {
            warn!("TWITTER_BEARER_TOKEN not set; tweets will be ingested without their threads");
        }

        let threads = ThreadLoader::new(Arc::new(api), Arc::new(scraper), config.recency_window);
        Ok(Self::new(oembed, Some(threads), &config.twitter_web_base_url))
    }

    /// Best-effort thread reconstruction; failures become an empty thread.
    async fn load_thread(&self, conversation: &ConversationId) -> Thread {
        let Some(loader) = &self.threads else {
            return Thread::empty();
        };

        match loader.load(conversation, Utc::now()).await {
            Ok(thread) => thread,
            Err(e) if e.is_configuration() => {
                debug!(error = %e, "Thread reconstruction unavailable");
                Thread::empty()
            }
            Err(e) => {
                warn!(
                    post_id = %conversation.post_id,
                    error = %e,
                    "Failed to reconstruct thread, using embed only"
                );
                Thread::empty()
            }
        }
    }
}

#[async_trait]
impl ContentHandler for TwitterHandler {
    fn handler_id(&self) -> &'static str {
        "twitter"
    }

    fn url_patterns(&self) -> &[Regex] {
        &PATTERNS
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn pre_handle(&self, url: &str) -> Result<PreHandleResult> {
        let conversation = ConversationId::from_url(url).context("Not a tweet status URL")?;
        let canonical_url = conversation.status_url(&self.web_base_url);

        debug!(url = %url, canonical = %canonical_url, "Handling tweet");

        let embed = self
            .oembed
            .fetch(&canonical_url)
            .await
            .with_context(|| format!("Failed to fetch embed for {canonical_url}"))?;

        let content = parse_embed_fragment(&embed.html);
        let title = synthesize_title(&embed.author_name, TWITTER_SITE_NAME, &content.body_text);
        let published_time = content
            .published_text
            .as_deref()
            .map(|text| parse_embed_date(text).map_or_else(|| text.to_string(), to_iso8601));

        let thread = self.load_thread(&conversation).await;
        info!(url = %url, thread_posts = thread.len(), "Tweet document assembled");

        let document = render_document(
            &DocumentMeta {
                title: &title,
                creator: &embed.author_name,
                creator_url: embed.author_url.as_deref(),
                description: &content.body_text,
                published_time: published_time.as_deref(),
            },
            &embed.html,
            &thread,
            &self.web_base_url,
        );

        Ok(PreHandleResult {
            url: url.to_string(),
            title: Some(title),
            content: Some(document),
            content_type: Some("text/html".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> TwitterHandler {
        let config = Config::for_testing();
        TwitterHandler::new(
            OembedClient::new(&config).unwrap(),
            None,
            &config.twitter_web_base_url,
        )
    }

    #[test]
    fn test_should_pre_handle() {
        let handler = handler();

        assert!(handler.should_pre_handle("https://twitter.com/user/status/123"));
        assert!(handler.should_pre_handle("https://www.twitter.com/user/status/123"));
        assert!(handler.should_pre_handle("https://mobile.twitter.com/user/status/123"));
        assert!(handler.should_pre_handle("https://x.com/user/status/123"));
        assert!(handler.should_pre_handle("https://twitter.com/user/statuses/123"));
        assert!(handler.should_pre_handle("https://twitter.com/#!/user/status/123"));
        assert!(handler.should_pre_handle("https://twitter.com/user/status/123/photo/1"));

        assert!(!handler.should_pre_handle("https://twitter.com/user"));
        assert!(!handler.should_pre_handle("https://twitter.com/"));
        assert!(!handler.should_pre_handle("https://example.com/user/status/123"));
        assert!(!handler.should_pre_handle("https://youtube.com/"));
    }

    #[test]
    fn test_handler_id_and_priority() {
        let handler = handler();
        assert_eq!(handler.handler_id(), "twitter");
        assert_eq!(handler.priority(), 100);
    }

    #[tokio::test]
    async fn test_pre_handle_rejects_non_status_url() {
        let err = handler()
            .pre_handle("https://twitter.com/user")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Not a tweet status URL"));
    }
}
