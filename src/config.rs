use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Twitter API
    pub twitter_bearer_token: Option<String>,
    pub twitter_api_base_url: String,
    pub twitter_web_base_url: String,
    pub twitter_oembed_url: String,
    pub search_page_size: u32,
    pub http_timeout: Duration,

    // Thread reconstruction
    pub recency_window: Duration,
    pub thread_scrape_enabled: bool,
    pub navigation_timeout: Duration,
    pub scrape_settle_delay: Duration,
    pub chrome_path: Option<PathBuf>,

    // Unsubscribe
    pub unsubscribe_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Twitter API
            twitter_bearer_token: optional_env("TWITTER_BEARER_TOKEN"),
            twitter_api_base_url: env_or_default("TWITTER_API_BASE_URL", "https://api.twitter.com"),
            twitter_web_base_url: env_or_default("TWITTER_WEB_BASE_URL", "https://twitter.com"),
            twitter_oembed_url: env_or_default(
                "TWITTER_OEMBED_URL",
                "https://publish.twitter.com/oembed",
            ),
            search_page_size: parse_env_u32("SEARCH_PAGE_SIZE", 100)?,
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 30)?),

            // Thread reconstruction
            recency_window: days_to_duration("RECENCY_WINDOW_DAYS", parse_env_u64("RECENCY_WINDOW_DAYS", 7)?)?,
            thread_scrape_enabled: parse_env_bool("THREAD_SCRAPE_ENABLED", true)?,
            navigation_timeout: Duration::from_secs(parse_env_u64("NAVIGATION_TIMEOUT_SECS", 60)?),
            scrape_settle_delay: Duration::from_millis(parse_env_u64("SCRAPE_SETTLE_MS", 2000)?),
            chrome_path: optional_env("CHROME_PATH").map(PathBuf::from),

            // Unsubscribe
            unsubscribe_timeout: Duration::from_secs(parse_env_u64("UNSUBSCRIBE_TIMEOUT_SECS", 5)?),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// A missing bearer token is not a validation failure: the search client
    /// reports it per call so that embed-only ingestion keeps working.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(10..=100).contains(&self.search_page_size) {
            return Err(ConfigError::InvalidValue {
                name: "SEARCH_PAGE_SIZE".to_string(),
                message: format!("must be between 10 and 100, got {}", self.search_page_size),
            });
        }
        if self.recency_window.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "RECENCY_WINDOW_DAYS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        for (name, value) in [
            ("TWITTER_API_BASE_URL", &self.twitter_api_base_url),
            ("TWITTER_WEB_BASE_URL", &self.twitter_web_base_url),
            ("TWITTER_OEMBED_URL", &self.twitter_oembed_url),
        ] {
            if url::Url::parse(value).is_err() {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: format!("not a valid URL: '{value}'"),
                });
            }
        }
        Ok(())
    }

    /// Configuration for tests: real defaults, no credential, no browser.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            twitter_bearer_token: None,
            twitter_api_base_url: "http://127.0.0.1:9".to_string(),
            twitter_web_base_url: "https://twitter.com".to_string(),
            twitter_oembed_url: "http://127.0.0.1:9/oembed".to_string(),
            search_page_size: 100,
            http_timeout: Duration::from_secs(5),
            recency_window: Duration::from_secs(7 * 86_400),
            thread_scrape_enabled: false,
            navigation_timeout: Duration::from_secs(60),
            scrape_settle_delay: Duration::from_millis(0),
            chrome_path: None,
            unsubscribe_timeout: Duration::from_secs(5),
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn days_to_duration(name: &str, days: u64) -> Result<Duration, ConfigError> {
    days.checked_mul(86_400)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("{days} days is out of range"),
        })
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_env_bool("NONEXISTENT_VAR", true).unwrap());
        assert!(!parse_env_bool("NONEXISTENT_VAR", false).unwrap());
    }

    #[test]
    fn test_testing_config_is_valid() {
        assert!(Config::for_testing().validate().is_ok());
    }

    #[test]
    fn test_validate_page_size_bounds() {
        let config = Config {
            search_page_size: 500,
            ..Config::for_testing()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref name, .. }) if name == "SEARCH_PAGE_SIZE"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = Config {
            twitter_oembed_url: "not a url".to_string(),
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_days_to_duration() {
        assert_eq!(
            days_to_duration("RECENCY_WINDOW_DAYS", 7).unwrap(),
            Duration::from_secs(7 * 86_400)
        );
        assert!(matches!(
            days_to_duration("RECENCY_WINDOW_DAYS", u64::MAX),
            Err(ConfigError::InvalidValue { ref name, .. }) if name == "RECENCY_WINDOW_DAYS"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = Config {
            recency_window: Duration::ZERO,
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }
}
