//! Shared constants used across the application.

/// User agent string used for outbound HTTP requests.
pub const INGEST_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Site name written into produced documents and synthesized titles.
pub const TWITTER_SITE_NAME: &str = "Twitter";

/// Maximum number of ids the bulk lookup endpoint accepts per request.
pub const MAX_IDS_PER_LOOKUP: usize = 100;
