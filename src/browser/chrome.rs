//! Headless Chrome/Chromium pages via `chromiumoxide`.
//!
//! Every [`ChromeLauncher::open_page`] call starts its own browser process,
//! so concurrent reports never share cookies or tabs.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EventRequestWillBeSent, EventResponseReceived};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, NavigateParams, Viewport};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{wait_until, BrowserError, Clip, LoadState, PageDriver, PageFactory, WaitOptions};
use crate::constants::{is_telegram_url, BROWSER_USER_AGENT};

/// Default viewport width in pixels.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

/// Default viewport height in pixels.
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 800;

/// Default CDP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

const READY_STATE_SCRIPT: &str =
    r#"document.readyState !== "loading" && location.href !== "about:blank""#;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Browser launch configuration.
#[derive(Debug, Clone)]
pub struct ChromeSettings {
    /// Viewport width in pixels.
    pub viewport_width: u32,
    /// Viewport height in pixels.
    pub viewport_height: u32,
    /// Timeout for individual CDP requests.
    pub request_timeout: Duration,
    /// Path to Chrome/Chromium executable (None for auto-detection).
    pub chrome_path: Option<String>,
    /// Run without a visible window.
    pub headless: bool,
    pub user_agent: String,
}

impl Default for ChromeSettings {
    fn default() -> Self {
        Self {
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            chrome_path: None,
            headless: true,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

/// Launches one headless browser per page.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    settings: ChromeSettings,
}

impl ChromeLauncher {
    #[must_use]
    pub fn new(settings: ChromeSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl PageFactory for ChromeLauncher {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        let page = ChromePage::launch(&self.settings).await?;
        Ok(Box::new(page))
    }
}

/// A tab together with the browser process that owns it.
pub struct ChromePage {
    browser: Mutex<Browser>,
    page: Page,
    tasks: Vec<JoinHandle<()>>,
}

impl ChromePage {
    /// Start a browser and open a blank tab with network logging attached.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser cannot be started or the tab cannot be
    /// prepared.
    pub async fn launch(settings: &ChromeSettings) -> Result<Self, BrowserError> {
        info!(headless = settings.headless, "Launching headless browser");

        let mut config_builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .request_timeout(settings.request_timeout)
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-features=VizDisplayCompositor")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-renderer-backgrounding")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio")
            .arg("--hide-scrollbars");

        if !settings.headless {
            config_builder = config_builder.with_head();
        }

        if let Some(ref chrome_path) = settings.chrome_path {
            config_builder = config_builder.chrome_executable(chrome_path);
        }

        let browser_config = config_builder
            .build()
            .map_err(|e| BrowserError::Launch(format!("failed to build browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // Spawn handler in background
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler_task.abort();
                return Err(BrowserError::Launch(format!("failed to open tab: {e}")));
            }
        };

        if let Err(e) = page.set_user_agent(settings.user_agent.as_str()).await {
            warn!("Failed to set user agent: {e}");
        }

        let mut tasks = vec![handler_task];
        tasks.extend(spawn_network_logging(&page).await);

        debug!("Headless browser ready");

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            tasks,
        })
    }

    async fn navigate_dom_ready(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| navigation_error(url, &e))?;

        wait_until(WaitOptions::new(timeout, READY_POLL_INTERVAL), || async move {
            matches!(self.evaluate_json(READY_STATE_SCRIPT).await, Ok(Value::Bool(true)))
        })
        .await
        .map_err(|e| BrowserError::Timeout {
            what: format!("document of {url}"),
            after: e.0,
        })
    }
}

/// Log Telegram requests and responses seen by the tab.
async fn spawn_network_logging(page: &Page) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    match page.event_listener::<EventRequestWillBeSent>().await {
        Ok(mut requests) => tasks.push(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                if is_telegram_url(&event.request.url) {
                    debug!(method = %event.request.method, url = %event.request.url, "Network request");
                }
            }
        })),
        Err(e) => warn!("Failed to subscribe to network requests: {e}"),
    }

    match page.event_listener::<EventResponseReceived>().await {
        Ok(mut responses) => tasks.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if is_telegram_url(&event.response.url) {
                    debug!(status = event.response.status, url = %event.response.url, "Network response");
                }
            }
        })),
        Err(e) => warn!("Failed to subscribe to network responses: {e}"),
    }

    tasks
}

fn navigation_error(url: &str, err: &impl std::fmt::Display) -> BrowserError {
    BrowserError::Navigation {
        url: url.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(
        &self,
        url: &str,
        load: LoadState,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let navigation = async {
            match load {
                LoadState::Load => self
                    .page
                    .goto(url)
                    .await
                    .map(|_| ())
                    .map_err(|e| navigation_error(url, &e)),
                LoadState::DomReady => self.navigate_dom_ready(url, timeout).await,
            }
        };

        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| BrowserError::Timeout {
                what: format!("navigation to {url}"),
                after: timeout,
            })?
    }

    async fn evaluate_json(&self, script: &str) -> Result<Value, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))
    }

    async fn screenshot(&self, clip: Option<Clip>) -> Result<Vec<u8>, BrowserError> {
        let mut params = ScreenshotParams::builder().format(CaptureScreenshotFormat::Png);
        if let Some(clip) = clip {
            params = params.capture_beyond_viewport(true).clip(Viewport {
                x: clip.x,
                y: clip.y,
                width: clip.width,
                height: clip.height,
                scale: 1.0,
            });
        }

        self.page
            .screenshot(params.build())
            .await
            .map_err(|e| BrowserError::Screenshot(e.to_string()))
    }

    async fn title(&self) -> Result<Option<String>, BrowserError> {
        self.page
            .get_title()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))
    }

    async fn current_url(&self) -> Result<Option<String>, BrowserError> {
        self.page
            .url()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))
    }

    async fn close(&self) {
        if let Err(e) = self.page.clone().close().await {
            warn!("Failed to close page: {e}");
        }

        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            error!("Failed to close browser: {e}");
        } else {
            let _ = browser.wait().await;
            info!("Browser shutdown complete");
        }

        for task in &self.tasks {
            task.abort();
        }
    }
}
