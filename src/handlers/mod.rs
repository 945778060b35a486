mod registry;
mod traits;

// Site handlers
mod twitter;

use std::sync::Arc;

use anyhow::Result;

pub use registry::HandlerRegistry;
pub use traits::{ContentHandler, PreHandleResult};
pub use twitter::TwitterHandler;

use crate::browser::BrowserService;
use crate::config::Config;

/// Build the registry with every site handler wired to its collaborators.
///
/// # Errors
///
/// Returns an error if a handler cannot be constructed.
pub fn build_registry(config: &Config, browser: Arc<BrowserService>) -> Result<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(TwitterHandler::from_config(config, browser)?));
    Ok(registry)
}
