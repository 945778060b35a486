//! Tweet ingest library.
//!
//! Content handlers that turn externally authored URLs into normalized HTML
//! documents for a storage pipeline. The Twitter handler seeds its document
//! from oEmbed and annotates it with the author's reconstructed thread,
//! recovered from the search API for recent conversations and from a headless
//! browser scrape for older ones.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod browser;
pub mod config;
pub mod constants;
pub mod handlers;
pub mod text;
pub mod twitter;
pub mod unsubscribe;
