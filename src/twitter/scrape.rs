//! Recover the ids of an author's own replies from the live thread page.
//!
//! Used for conversations older than the search API's recency window. The
//! result is ids only, in page order; the caller resolves them in bulk.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::Page;
use regex::Regex;
use tracing::{debug, info, warn};

use super::status_url;
use crate::browser::BrowserService;
use crate::config::Config;

/// Clicks the first "Show replies" / "Show more replies" control, if any.
const EXPAND_REPLIES_SCRIPT: &str = r#"(() => {
    const controls = Array.from(document.querySelectorAll('div[role="button"], button'));
    const target = controls.find((el) => /show (more )?replies/i.test(el.textContent || ''));
    if (!target) {
        return false;
    }
    target.click();
    return true;
})()"#;

/// Hrefs of the permalink wrapping each rendered post timestamp.
const STATUS_LINKS_SCRIPT: &str = r#"(() => Array.from(document.querySelectorAll('article time'))
    .map((time) => time.closest('a'))
    .filter((link) => link && link.href)
    .map((link) => link.href))()"#;

static STATUS_LINK: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"/(\w+)/status(?:es)?/(\d+)").unwrap());

/// Best-effort source of reply ids. Never fails: problems yield an empty list.
#[async_trait]
pub trait ReplyScraper: Send + Sync {
    async fn scrape_reply_ids(&self, handle: &str, conversation_id: &str) -> Vec<String>;
}

/// Keep ids of status links authored by `handle`, first occurrence only,
/// in input order.
#[must_use]
pub fn filter_author_status_ids(hrefs: &[String], handle: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    hrefs
        .iter()
        .filter_map(|href| STATUS_LINK.captures(href))
        .filter(|caps| caps[1].eq_ignore_ascii_case(handle))
        .map(|caps| caps[2].to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

pub struct BrowserReplyScraper {
    browser: Arc<BrowserService>,
    web_base_url: String,
    navigation_timeout: Duration,
    settle_delay: Duration,
    enabled: bool,
}

impl BrowserReplyScraper {
    #[must_use]
    pub fn new(browser: Arc<BrowserService>, config: &Config) -> Self {
        Self {
            browser,
            web_base_url: config.twitter_web_base_url.clone(),
            navigation_timeout: config.navigation_timeout,
            settle_delay: config.scrape_settle_delay,
            enabled: config.thread_scrape_enabled,
        }
    }

    async fn collect_status_links(&self, page: &Page, url: &str) -> Result<Vec<String>> {
        tokio::time::timeout(self.navigation_timeout, async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        })
        .await
        .context("Navigation timed out")?
        .context("Navigation failed")?;

        match page.evaluate(EXPAND_REPLIES_SCRIPT).await {
            Ok(result) => debug!(expanded = ?result.into_value::<bool>().ok(), "Reply expansion attempted"),
            Err(e) => debug!("Reply expansion failed: {e}"),
        }

        tokio::time::sleep(self.settle_delay).await;

        let hrefs: Vec<String> = tokio::time::timeout(self.navigation_timeout, page.evaluate(STATUS_LINKS_SCRIPT))
            .await
            .context("Status link extraction timed out")?
            .context("Status link extraction failed")?
            .into_value()
            .context("Status link extraction returned unexpected data")?;

        Ok(hrefs)
    }
}

#[async_trait]
impl ReplyScraper for BrowserReplyScraper {
    async fn scrape_reply_ids(&self, handle: &str, conversation_id: &str) -> Vec<String> {
        if !self.enabled {
            debug!(conversation_id, "Thread scraping disabled");
            return Vec::new();
        }

        let url = status_url(&self.web_base_url, handle, conversation_id);

        let session = match self.browser.acquire_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(url = %url, error = %e, "Could not open browser session for thread scrape");
                return Vec::new();
            }
        };

        let outcome = self.collect_status_links(session.page(), &url).await;
        session.release().await;

        match outcome {
            Ok(hrefs) => {
                let ids = filter_author_status_ids(&hrefs, handle);
                info!(url = %url, links = hrefs.len(), ids = ids.len(), "Scraped thread page");
                ids
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Thread scrape failed");
                Vec::new()
            }
        }
    }
}
