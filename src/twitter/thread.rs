use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::api::{FetchError, TweetSource};
use super::models::Thread;
use super::reconcile::{from_newest_first, reconcile, retain_author};
use super::scrape::ReplyScraper;
use super::ConversationId;

/// Which source a conversation is reconstructed from. Exactly one per lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Conversation root is inside the search API's recency window.
    RecentSearch,
    /// Older conversation: scrape reply ids, then resolve them in bulk.
    ScrapeAndResolve,
}

/// Pick the strategy for a conversation whose root was posted at `root_created_at`.
#[must_use]
pub fn select_strategy(
    root_created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    recency_window: Duration,
) -> FetchStrategy {
    // A negative age (root timestamp ahead of our clock) counts as recent.
    let within_window = now
        .signed_duration_since(root_created_at)
        .to_std()
        .map_or(true, |age| age <= recency_window);
    if within_window {
        FetchStrategy::RecentSearch
    } else {
        FetchStrategy::ScrapeAndResolve
    }
}

/// Reconstructs the author's own continuation thread for a conversation.
pub struct ThreadLoader {
    source: Arc<dyn TweetSource>,
    scraper: Arc<dyn ReplyScraper>,
    recency_window: Duration,
}

impl ThreadLoader {
    #[must_use]
    pub fn new(
        source: Arc<dyn TweetSource>,
        scraper: Arc<dyn ReplyScraper>,
        recency_window: Duration,
    ) -> Self {
        Self {
            source,
            scraper,
            recency_window,
        }
    }

    /// Load the thread rooted at `conversation.post_id`.
    ///
    /// Returns an empty thread when the post is itself a reply, or when the
    /// chosen strategy finds no continuation. Otherwise the thread holds the
    /// root followed by the author's replies, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates source failures (missing credential, transport, not found).
    /// Scrape failures never surface; they yield an empty thread.
    pub async fn load(
        &self,
        conversation: &ConversationId,
        now: DateTime<Utc>,
    ) -> Result<Thread, FetchError> {
        let root_batch = self.source.lookup(&conversation.post_id).await?;
        let Some(root) = root_batch.posts.first() else {
            return Ok(Thread::empty());
        };

        if !root.is_conversation_root() {
            debug!(
                post_id = %root.id,
                conversation_id = %root.conversation_id,
                "Post is a reply, not reconstructing thread"
            );
            return Ok(Thread::empty());
        }

        let root_id = root.id.clone();
        let handle = root_batch
            .author(&root.author_id)
            .map_or_else(|| conversation.handle.clone(), |a| a.handle.clone());
        let strategy = select_strategy(root.created_at, now, self.recency_window);

        info!(conversation_id = %root_id, handle = %handle, ?strategy, "Reconstructing thread");

        match strategy {
            FetchStrategy::RecentSearch => {
                let recent = self.source.search_recent(&root_id, &handle).await?;
                if recent.is_empty() {
                    return Ok(Thread::empty());
                }
                Ok(reconcile(&root_id, vec![root_batch, from_newest_first(recent)]))
            }
            FetchStrategy::ScrapeAndResolve => {
                let mut ids = self.scraper.scrape_reply_ids(&handle, &root_id).await;
                ids.retain(|id| *id != root_id);
                if ids.is_empty() {
                    return Ok(Thread::empty());
                }
                let resolved = self.source.lookup_many(&ids).await?;
                if resolved.is_empty() {
                    return Ok(Thread::empty());
                }
                let thread = reconcile(&root_id, vec![root_batch, resolved]);
                Ok(retain_author(thread, &handle))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::twitter::models::{Author, Post, PostBatch};

    const WEEK: Duration = Duration::from_secs(7 * 86_400);

    #[test]
    fn test_select_strategy_recent() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let root = now - chrono::Duration::days(2);
        assert_eq!(select_strategy(root, now, WEEK), FetchStrategy::RecentSearch);
    }

    #[test]
    fn test_select_strategy_old() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let root = now - chrono::Duration::days(30);
        assert_eq!(select_strategy(root, now, WEEK), FetchStrategy::ScrapeAndResolve);
    }

    #[test]
    fn test_select_strategy_window_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let exactly = now - chrono::Duration::days(7);
        assert_eq!(select_strategy(exactly, now, WEEK), FetchStrategy::RecentSearch);
        let just_over = exactly - chrono::Duration::seconds(1);
        assert_eq!(select_strategy(just_over, now, WEEK), FetchStrategy::ScrapeAndResolve);
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn post(id: &str, author_id: &str, conversation_id: &str, minutes: i64) -> Post {
        Post {
            id: id.to_string(),
            author_id: author_id.to_string(),
            text: format!("post {id}"),
            created_at: now() - chrono::Duration::days(30) + chrono::Duration::minutes(minutes),
            conversation_id: conversation_id.to_string(),
            referenced_posts: Vec::new(),
            attachment_media_keys: Vec::new(),
        }
    }

    fn author(id: &str, handle: &str) -> Author {
        Author {
            id: id.to_string(),
            display_name: handle.to_string(),
            handle: handle.to_string(),
            avatar_url: None,
        }
    }

    /// Serves a fixed root and bulk result; records the ids it was asked for.
    struct StubSource {
        root: Post,
        bulk: Result<PostBatch, u16>,
        requested: Mutex<Vec<String>>,
    }

    impl StubSource {
        fn new(root: Post, bulk: Result<PostBatch, u16>) -> Self {
            Self {
                root,
                bulk,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TweetSource for StubSource {
        async fn lookup(&self, _post_id: &str) -> Result<PostBatch, FetchError> {
            Ok(PostBatch {
                posts: vec![self.root.clone()],
                authors: vec![author("1", "jane")],
                media: Vec::new(),
            })
        }

        async fn search_recent(
            &self,
            _conversation_id: &str,
            _handle: &str,
        ) -> Result<PostBatch, FetchError> {
            panic!("recent search must not run for an old conversation");
        }

        async fn lookup_many(&self, ids: &[String]) -> Result<PostBatch, FetchError> {
            self.requested.lock().unwrap().extend(ids.iter().cloned());
            self.bulk.clone().map_err(|status| FetchError::Status {
                endpoint: "/2/tweets".to_string(),
                status,
            })
        }
    }

    struct StubScraper(Vec<&'static str>);

    #[async_trait]
    impl ReplyScraper for StubScraper {
        async fn scrape_reply_ids(&self, _handle: &str, _conversation_id: &str) -> Vec<String> {
            self.0.iter().map(|id| (*id).to_string()).collect()
        }
    }

    fn loader(source: &Arc<StubSource>, scraped: Vec<&'static str>) -> ThreadLoader {
        let source: Arc<dyn TweetSource> = source.clone();
        ThreadLoader::new(source, Arc::new(StubScraper(scraped)), WEEK)
    }

    fn conversation() -> ConversationId {
        ConversationId {
            handle: "jane".to_string(),
            post_id: "1000".to_string(),
        }
    }

    #[tokio::test]
    async fn test_load_reply_post_yields_empty_thread() {
        let source = Arc::new(StubSource::new(
            post("1005", "1", "1000", 5),
            Ok(PostBatch::default()),
        ));
        let thread = loader(&source, vec!["1006"])
            .load(&conversation(), now())
            .await
            .unwrap();
        assert!(thread.is_empty());
        assert!(source.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_scrape_path_drops_other_authors() {
        let bulk = PostBatch {
            posts: vec![post("1001", "1", "1000", 1), post("1002", "2", "1000", 2)],
            authors: vec![author("1", "jane"), author("2", "mallory")],
            media: Vec::new(),
        };
        let source = Arc::new(StubSource::new(post("1000", "1", "1000", 0), Ok(bulk)));
        let thread = loader(&source, vec!["1001", "1002"])
            .load(&conversation(), now())
            .await
            .unwrap();

        assert_eq!(thread.ids().collect::<Vec<_>>(), vec!["1000", "1001"]);
        assert_eq!(thread.authors.keys().collect::<Vec<_>>(), vec!["1"]);
    }

    #[tokio::test]
    async fn test_load_does_not_resolve_scraped_root() {
        let bulk = PostBatch {
            posts: vec![post("1001", "1", "1000", 1)],
            authors: vec![author("1", "jane")],
            media: Vec::new(),
        };
        let source = Arc::new(StubSource::new(post("1000", "1", "1000", 0), Ok(bulk)));
        let thread = loader(&source, vec!["1000", "1001"])
            .load(&conversation(), now())
            .await
            .unwrap();

        assert_eq!(*source.requested.lock().unwrap(), vec!["1001".to_string()]);
        assert_eq!(thread.ids().collect::<Vec<_>>(), vec!["1000", "1001"]);
    }

    #[tokio::test]
    async fn test_load_only_root_scraped_yields_empty_thread() {
        let source = Arc::new(StubSource::new(
            post("1000", "1", "1000", 0),
            Ok(PostBatch::default()),
        ));
        let thread = loader(&source, vec!["1000"])
            .load(&conversation(), now())
            .await
            .unwrap();
        assert!(thread.is_empty());
        assert!(source.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_propagates_bulk_lookup_error() {
        let source = Arc::new(StubSource::new(post("1000", "1", "1000", 0), Err(503)));
        let err = loader(&source, vec!["1001"])
            .load(&conversation(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }
}
