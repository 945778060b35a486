use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;

/// Normalized document produced by a content handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreHandleResult {
    /// The original URL, echoed back.
    pub url: String,
    /// Human-readable title.
    pub title: Option<String>,
    /// Self-contained HTML document.
    pub content: Option<String>,
    /// MIME type of `content`.
    pub content_type: Option<String>,
}

/// Trait for site-specific content handlers.
#[async_trait]
pub trait ContentHandler: Send + Sync {
    /// Unique identifier for this handler.
    fn handler_id(&self) -> &'static str;

    /// URL patterns this handler is authoritative for.
    fn url_patterns(&self) -> &[Regex];

    /// Check if this handler applies to the given URL. Must not do I/O.
    fn should_pre_handle(&self, url: &str) -> bool {
        self.url_patterns().iter().any(|p| p.is_match(url))
    }

    /// Priority for handler selection (higher = preferred).
    fn priority(&self) -> i32 {
        0
    }

    /// Produce the normalized document for a URL this handler matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary content fetch fails. Optional
    /// enrichment failures must not surface here.
    async fn pre_handle(&self, url: &str) -> Result<PreHandleResult>;
}
