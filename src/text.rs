//! Small text helpers shared by content handlers: title synthesis,
//! URL stripping and timestamp formatting.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::Regex;

static URL_PATTERN: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// Remove the first URL found in `text`.
///
/// Only the first occurrence is removed; later URLs are left untouched.
#[must_use]
pub fn strip_first_url(text: &str) -> String {
    URL_PATTERN.replace(text, "").into_owned()
}

/// Build a human-readable title: `"{author} on {platform}: {body}"`, with the
/// first URL in `body` removed.
#[must_use]
pub fn synthesize_title(author: &str, platform: &str, body: &str) -> String {
    format!("{author} on {platform}: {}", strip_first_url(body))
}

/// Format a post timestamp the way it is shown under a post on the site,
/// e.g. `3:04 PM · Jan 2, 2024`.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%-I:%M %p · %b %-d, %Y").to_string()
}

/// RFC 3339 with millisecond precision, as used in `<meta>` and `<time>` tags.
#[must_use]
pub fn to_iso8601(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse the date text of an embed permalink (`January 2, 2024`).
#[must_use]
pub fn parse_embed_date(text: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(text.trim(), "%B %d, %Y")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
