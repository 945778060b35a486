use std::cmp::Reverse;

use anyhow::Result;
use tracing::debug;

use super::traits::{ContentHandler, PreHandleResult};

/// Registry of content handlers, ordered by priority.
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn ContentHandler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler.
    pub fn register(&mut self, handler: Box<dyn ContentHandler>) {
        self.handlers.push(handler);
        // Stable: equal priorities keep registration order
        self.handlers.sort_by_key(|h| Reverse(h.priority()));
    }

    /// Find the first handler whose predicate accepts the URL.
    #[must_use]
    pub fn find_handler(&self, url: &str) -> Option<&dyn ContentHandler> {
        self.handlers
            .iter()
            .find(|h| h.should_pre_handle(url))
            .map(AsRef::as_ref)
    }

    /// Run the matching handler, if any.
    ///
    /// # Errors
    ///
    /// Returns the handler's error when a handler matched and failed.
    pub async fn pre_handle(&self, url: &str) -> Result<Option<PreHandleResult>> {
        let Some(handler) = self.find_handler(url) else {
            debug!(url = %url, "No content handler matched");
            return Ok(None);
        };
        debug!(url = %url, handler = handler.handler_id(), "Content handler matched");
        handler.pre_handle(url).await.map(Some)
    }

    /// Get all registered handlers.
    #[must_use]
    pub fn handlers(&self) -> &[Box<dyn ContentHandler>] {
        &self.handlers
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
