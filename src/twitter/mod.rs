//! Tweet thread reconstruction.
//!
//! Recent conversations are read from the search API; older ones are
//! recovered by scraping the live thread page for the author's own replies
//! and resolving the ids in bulk. Both paths feed the reconciler, which
//! produces a deduplicated, chronologically ordered [`Thread`].

pub mod api;
pub mod document;
pub mod models;
pub mod oembed;
pub mod reconcile;
pub mod scrape;
pub mod thread;

use regex::Regex;

pub use api::{FetchError, TweetSource, TwitterApiClient};
pub use models::{Author, Media, Post, PostBatch, ReferencedPost, Thread, ThreadPost};
pub use oembed::{EmbedContent, OembedClient, OembedResponse};
pub use scrape::{BrowserReplyScraper, ReplyScraper};
pub use thread::{FetchStrategy, ThreadLoader};

/// Conversation-status URLs: `twitter.com/(#!/)?{handle}/status(es)?/{id}(/...)?`.
pub static STATUS_URL_PATTERN: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:www\.|mobile\.)?(?:twitter|x)\.com/(?:#!/)?(\w+)/status(?:es)?/(\d+)(?:[/?#].*)?$",
    )
    .unwrap()
});

/// Identifies the conversation a status URL points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId {
    pub handle: String,
    pub post_id: String,
}

impl ConversationId {
    /// Extract the author handle and post id from a status URL.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let caps = STATUS_URL_PATTERN.captures(url)?;
        Some(Self {
            handle: caps.get(1)?.as_str().to_string(),
            post_id: caps.get(2)?.as_str().to_string(),
        })
    }

    /// Canonical status URL under `web_base`, without tracking parameters.
    #[must_use]
    pub fn status_url(&self, web_base: &str) -> String {
        status_url(web_base, &self.handle, &self.post_id)
    }
}

#[must_use]
pub fn status_url(web_base: &str, handle: &str, post_id: &str) -> String {
    format!("{}/{handle}/status/{post_id}", web_base.trim_end_matches('/'))
}
