//! Newsletter unsubscribe delivery.
//!
//! A subscription may advertise a `mailto:`-style address, an HTTP URL, or
//! both. Delivery is best-effort: callers get a boolean per subscription and
//! a summary for bulk runs, never an error.

use std::borrow::Cow;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::constants::INGEST_USER_AGENT;

/// Subject used when the address does not carry one.
pub const DEFAULT_UNSUBSCRIBE_SUBJECT: &str = "Unsubscribe";

/// Body of every unsubscribe email.
pub const UNSUBSCRIBE_MAIL_BODY: &str =
    "This message was automatically generated to unsubscribe from this mailing list.";

#[derive(Debug, Error)]
pub enum UnsubscribeError {
    #[error("invalid unsubscribe address: {0}")]
    InvalidMailTo(String),
    #[error("invalid unsubscribe URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to send unsubscribe email: {0:#}")]
    Mail(anyhow::Error),
    #[error("unsubscribe request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Destination parsed from an unsubscribe address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeMail {
    pub to: String,
    pub subject: String,
}

/// Parse `address[?subject=...]`, with an optional `mailto:` prefix.
///
/// # Errors
///
/// Returns [`UnsubscribeError::InvalidMailTo`] if the address has no `@`.
pub fn parse_unsubscribe_mail_to(raw: &str) -> Result<UnsubscribeMail, UnsubscribeError> {
    let trimmed = raw.trim();
    let without_scheme = trimmed.strip_prefix("mailto:").unwrap_or(trimmed);
    let (address, query) = match without_scheme.split_once('?') {
        Some((address, query)) => (address, Some(query)),
        None => (without_scheme, None),
    };

    if address.is_empty() || !address.contains('@') {
        return Err(UnsubscribeError::InvalidMailTo(raw.to_string()));
    }

    let subject = query
        .and_then(|q| {
            q.split('&').find_map(|pair| {
                pair.split_once('=')
                    .filter(|(key, _)| key.eq_ignore_ascii_case("subject"))
                    .map(|(_, value)| value)
            })
        })
        .map(|value| urlencoding::decode(value).map_or_else(|_| value.to_string(), Cow::into_owned))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_UNSUBSCRIBE_SUBJECT.to_string());

    Ok(UnsubscribeMail {
        to: address.to_string(),
        subject,
    })
}

/// Message handed to the outbound mail transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Outbound email transport.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()>;
}

/// The parts of a subscription record needed to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub name: String,
    pub unsubscribe_mail_to: Option<String>,
    pub unsubscribe_http_url: Option<String>,
}

/// Result of unsubscribing one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeOutcome {
    pub subscription_id: String,
    pub unsubscribed: bool,
}

/// Per-item results of a bulk unsubscribe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnsubscribeSummary {
    pub outcomes: Vec<UnsubscribeOutcome>,
}

impl UnsubscribeSummary {
    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.unsubscribed)
            .map(|o| o.subscription_id.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| !o.unsubscribed)
            .map(|o| o.subscription_id.as_str())
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.unsubscribed)
    }
}

pub struct Unsubscriber {
    client: reqwest::Client,
    mail: Arc<dyn MailSender>,
}

impl Unsubscriber {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config, mail: Arc<dyn MailSender>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(INGEST_USER_AGENT)
            .timeout(config.unsubscribe_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, mail })
    }

    /// Send the unsubscribe email for an address string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is malformed or sending fails.
    pub async fn unsubscribe_by_mail(&self, mail_to: &str) -> Result<(), UnsubscribeError> {
        let UnsubscribeMail { to, subject } = parse_unsubscribe_mail_to(mail_to)?;
        self.mail
            .send(OutgoingMail {
                to,
                subject,
                text: UNSUBSCRIBE_MAIL_BODY.to_string(),
            })
            .await
            .map_err(UnsubscribeError::Mail)
    }

    /// Hit an unsubscribe URL. Success means no network or HTTP error.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the request fails or times
    /// out, or the server answers with an error status.
    pub async fn unsubscribe_by_http(&self, url: &str) -> Result<(), UnsubscribeError> {
        let parsed = url::Url::parse(url).map_err(|source| UnsubscribeError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let http = |source: reqwest::Error| UnsubscribeError::Http {
            url: url.to_string(),
            source,
        };

        self.client
            .get(parsed)
            .send()
            .await
            .map_err(http)?
            .error_for_status()
            .map_err(http)?;
        Ok(())
    }

    async fn try_unsubscribe(&self, subscription: &Subscription) -> Result<bool, UnsubscribeError> {
        let mut attempted = false;
        if let Some(mail_to) = &subscription.unsubscribe_mail_to {
            self.unsubscribe_by_mail(mail_to).await?;
            attempted = true;
        }
        if let Some(url) = &subscription.unsubscribe_http_url {
            self.unsubscribe_by_http(url).await?;
            attempted = true;
        }
        Ok(attempted)
    }

    /// Unsubscribe through every channel the subscription advertises.
    ///
    /// Returns false if there is no channel or any channel fails.
    pub async fn unsubscribe(&self, subscription: &Subscription) -> bool {
        match self.try_unsubscribe(subscription).await {
            Ok(true) => {
                info!(subscription = %subscription.id, name = %subscription.name, "Unsubscribed");
                true
            }
            Ok(false) => {
                warn!(subscription = %subscription.id, "No unsubscribe method available");
                false
            }
            Err(e) => {
                warn!(subscription = %subscription.id, error = %e, "Failed to unsubscribe");
                false
            }
        }
    }

    /// Unsubscribe from each subscription in turn; one failure does not stop
    /// the rest.
    pub async fn unsubscribe_all(&self, subscriptions: &[Subscription]) -> UnsubscribeSummary {
        let mut summary = UnsubscribeSummary::default();
        for subscription in subscriptions {
            let unsubscribed = self.unsubscribe(subscription).await;
            summary.outcomes.push(UnsubscribeOutcome {
                subscription_id: subscription.id.clone(),
                unsubscribed,
            });
        }
        info!(
            total = summary.outcomes.len(),
            failed = summary.failed().count(),
            "Bulk unsubscribe finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_subject() {
        assert_eq!(
            parse_unsubscribe_mail_to("list@example.com?subject=Stop").unwrap(),
            UnsubscribeMail {
                to: "list@example.com".to_string(),
                subject: "Stop".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_without_query_uses_default_subject() {
        assert_eq!(
            parse_unsubscribe_mail_to("list@example.com").unwrap(),
            UnsubscribeMail {
                to: "list@example.com".to_string(),
                subject: "Unsubscribe".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_keeps_plus_and_percent_in_local_part() {
        let mail = parse_unsubscribe_mail_to("unsub+subject=Please%20Remove@example.com").unwrap();
        assert_eq!(mail.to, "unsub+subject=Please%20Remove@example.com");
        assert_eq!(mail.subject, "Unsubscribe");
    }

    #[test]
    fn test_parse_decodes_subject_and_strips_scheme() {
        let mail = parse_unsubscribe_mail_to("mailto:list@example.com?body=x&Subject=Please%20Remove").unwrap();
        assert_eq!(mail.to, "list@example.com");
        assert_eq!(mail.subject, "Please Remove");
    }

    #[test]
    fn test_parse_empty_subject_falls_back() {
        let mail = parse_unsubscribe_mail_to("list@example.com?subject=").unwrap();
        assert_eq!(mail.subject, "Unsubscribe");
    }

    #[test]
    fn test_parse_rejects_address_without_at() {
        assert!(matches!(
            parse_unsubscribe_mail_to("not-an-address?subject=Stop"),
            Err(UnsubscribeError::InvalidMailTo(_))
        ));
        assert!(parse_unsubscribe_mail_to("").is_err());
        assert!(parse_unsubscribe_mail_to("?subject=a@b").is_err());
    }

    #[test]
    fn test_summary_partitions() {
        let summary = UnsubscribeSummary {
            outcomes: vec![
                UnsubscribeOutcome {
                    subscription_id: "a".to_string(),
                    unsubscribed: true,
                },
                UnsubscribeOutcome {
                    subscription_id: "b".to_string(),
                    unsubscribed: false,
                },
            ],
        };
        assert_eq!(summary.succeeded().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(summary.failed().collect::<Vec<_>>(), vec!["b"]);
        assert!(!summary.all_succeeded());
    }
}
