use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tweet_ingest::browser::{BrowserService, BrowserSettings};
use tweet_ingest::config::Config;
use tweet_ingest::handlers::build_registry;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let url = std::env::args()
        .nth(1)
        .context("Usage: tweet-ingest <url>")?;

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let browser = Arc::new(BrowserService::new(BrowserSettings::from_config(&config)));
    let registry = build_registry(&config, Arc::clone(&browser)).context("Failed to build handlers")?;

    let outcome = registry.pre_handle(&url).await;
    browser.shutdown().await;

    match outcome? {
        Some(result) => {
            info!(url = %result.url, title = ?result.title, "Document produced");
            let json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
            println!("{json}");
            Ok(())
        }
        None => anyhow::bail!("No content handler for {url}"),
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tweet_ingest=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // Logs go to stderr so stdout carries only the JSON document
    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
