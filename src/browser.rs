//! Shared headless Chrome/Chromium instance with isolated per-lookup sessions.
//!
//! The browser is launched lazily on first use and shared by every lookup.
//! Each lookup gets its own browser context (separate cookies, storage and
//! cache), which must be handed back with [`BrowserSession::release`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::constants::INGEST_USER_AGENT;

/// Default viewport width in pixels.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

/// Default viewport height in pixels.
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 2000;

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// CDP request timeout.
    pub request_timeout: Duration,
    /// Path to Chrome/Chromium executable (None for auto-detection).
    pub chrome_path: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            request_timeout: Duration::from_secs(60),
            chrome_path: None,
        }
    }
}

impl BrowserSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            request_timeout: config.navigation_timeout,
            chrome_path: config.chrome_path.clone(),
            ..Self::default()
        }
    }
}

/// Long-lived browser shared across lookups.
pub struct BrowserService {
    settings: BrowserSettings,
    browser: Mutex<Option<Arc<Browser>>>,
}

impl BrowserService {
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            browser: Mutex::new(None),
        }
    }

    /// Launch the browser if it is not already running.
    async fn ensure_browser(&self) -> Result<Arc<Browser>> {
        let mut browser_guard = self.browser.lock().await;
        if let Some(browser) = browser_guard.as_ref() {
            return Ok(Arc::clone(browser));
        }

        info!("Launching headless browser for thread scraping");

        let mut config_builder = BrowserConfig::builder()
            .window_size(self.settings.viewport_width, self.settings.viewport_height)
            .request_timeout(self.settings.request_timeout)
            .no_sandbox()
            .disable_default_args()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-extensions")
            .arg("--disable-sync")
            .arg("--mute-audio")
            .arg(format!("--user-agent={INGEST_USER_AGENT}"));

        if let Some(ref chrome_path) = self.settings.chrome_path {
            config_builder = config_builder.chrome_executable(chrome_path);
        }

        let browser_config = config_builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        let browser = Arc::new(browser);
        *browser_guard = Some(Arc::clone(&browser));
        info!("Headless browser launched");

        Ok(browser)
    }

    /// Open a fresh, isolated browser context with one blank page.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser cannot be launched or the context
    /// cannot be created. Nothing needs releasing in that case.
    pub async fn acquire_session(&self) -> Result<BrowserSession> {
        let browser = self.ensure_browser().await?;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("Failed to create browser context")?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build target params: {e}"))?;

        match browser.new_page(target).await {
            Ok(page) => {
                debug!(context = ?context_id, "Browser session acquired");
                let guard = ContextGuard::new({
                    let browser = Arc::clone(&browser);
                    let context_id = context_id.clone();
                    move || spawn_dispose(browser, context_id)
                });
                Ok(BrowserSession {
                    browser,
                    context_id,
                    page,
                    guard,
                })
            }
            Err(e) => {
                dispose_context(&browser, context_id).await;
                Err(anyhow::Error::new(e).context("Failed to open page in browser context"))
            }
        }
    }

    /// Close the browser gracefully.
    pub async fn shutdown(&self) {
        let mut browser_guard = self.browser.lock().await;
        if let Some(browser) = browser_guard.take() {
            match Arc::try_unwrap(browser) {
                Ok(mut browser) => {
                    if let Err(e) = browser.close().await {
                        error!("Failed to close browser: {e}");
                    } else {
                        info!("Browser shutdown complete");
                    }
                }
                Err(_) => warn!("Browser still in use at shutdown; dropping handle"),
            }
        }
    }
}

/// One isolated browser context plus its page.
///
/// Dropping a session without [`release`](Self::release) (e.g. when the
/// owning future is cancelled) still disposes the context in the background.
pub struct BrowserSession {
    browser: Arc<Browser>,
    context_id: BrowserContextId,
    page: Page,
    guard: ContextGuard,
}

impl BrowserSession {
    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Close the page and dispose of the context. Failures are logged only.
    pub async fn release(self) {
        let Self {
            browser,
            context_id,
            page,
            guard,
        } = self;

        if let Err(e) = page.close().await {
            warn!("Failed to close page: {e}");
        }
        dispose_context(&browser, context_id).await;
        guard.disarm();
    }
}

/// Runs a disposal action on drop unless disarmed.
struct ContextGuard {
    dispose: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ContextGuard {
    fn new(dispose: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    fn disarm(mut self) {
        self.dispose = None;
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

fn spawn_dispose(browser: Arc<Browser>, context_id: BrowserContextId) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            warn!(context = ?context_id, "Browser session dropped without release");
            handle.spawn(async move {
                dispose_context(&browser, context_id).await;
            });
        }
        Err(_) => warn!(context = ?context_id, "No runtime to dispose leaked browser context"),
    }
}

async fn dispose_context(browser: &Browser, context_id: BrowserContextId) {
    debug!(context = ?context_id, "Disposing browser context");
    if let Err(e) = browser
        .execute(DisposeBrowserContextParams::new(context_id))
        .await
    {
        warn!("Failed to dispose browser context: {e}");
    }
}
