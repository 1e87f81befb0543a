//! Browser automation using chromiumoxide.
//!
//! The scraping pipeline only talks to [`PageSession`]; [`ChromiumLauncher`]
//! is the production implementation and tests substitute a scripted one.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as ChromeBrowser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, Headers, ResourceType, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::BrowserConfig;

/// Sub-resource categories that can be refused during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Image,
    Stylesheet,
    Font,
    Media,
}

impl ResourceKind {
    /// Heavy resources that listing extraction never needs
    pub const HEAVY: [ResourceKind; 4] = [
        ResourceKind::Image,
        ResourceKind::Stylesheet,
        ResourceKind::Font,
        ResourceKind::Media,
    ];

    fn from_cdp(resource_type: &ResourceType) -> Option<Self> {
        match resource_type {
            ResourceType::Image => Some(ResourceKind::Image),
            ResourceType::Stylesheet => Some(ResourceKind::Stylesheet),
            ResourceType::Font => Some(ResourceKind::Font),
            ResourceType::Media => Some(ResourceKind::Media),
            _ => None,
        }
    }
}

/// One live, remotely rendered document.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate and wait until the document has loaded.
    async fn navigate(&self, url: &str) -> Result<()>;
    /// Wait up to `timeout` for `selector` to match; `false` on timeout.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool>;
    /// Evaluate a read-only expression against the live document.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;
    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String>;
    /// Abort every subsequent request of the given kinds.
    async fn block_resources(&self, kinds: &[ResourceKind]) -> Result<()>;
    /// Tear the session down.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Hands out fresh, independent sessions
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageSession>>;
}

/// Interval between selector checks
const SELECTOR_POLL: Duration = Duration::from_millis(100);

/// Replaces the geolocation API with callbacks that never fire
const GEOLOCATION_STUB: &str = r#"
Object.defineProperty(navigator, "geolocation", {
    value: {
        getCurrentPosition: () => {},
        watchPosition: () => {},
        clearWatch: () => {}
    }
});
"#;

/// Launches one headless Chromium per session
pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self) -> Result<ChromeConfig> {
        let mut builder = ChromeConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-geolocation")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio")
            .window_size(self.config.window_width, self.config.window_height)
            .request_timeout(self.config.navigation_timeout());

        if let Some(path) = &self.config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn PageSession>> {
        let (browser, mut handler) = ChromeBrowser::launch(self.browser_config()?)
            .await
            .context("Failed to launch browser")?;

        // Handler must keep running for the browser to work
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {}", e);
                }
            }
        });

        let mut session = ChromiumSession {
            browser,
            page: None,
            handler_task,
            intercept_task: std::sync::Mutex::new(None),
            navigation_timeout: self.config.navigation_timeout(),
        };

        // Close the browser again if page setup fails
        match session.open_page(&self.config).await {
            Ok(page) => {
                session.page = Some(page);
                Ok(Box::new(session))
            }
            Err(e) => {
                let _ = Box::new(session).close().await;
                Err(e)
            }
        }
    }
}

/// Re-run `probe` until it yields `true` or `timeout` passes. A probe that
/// stalls is cut off at the deadline.
async fn poll_until_true<F, Fut>(timeout: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<serde_json::Value>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if let Ok(Ok(serde_json::Value::Bool(true))) =
            tokio::time::timeout(remaining, probe()).await
        {
            return true;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        tokio::time::sleep(SELECTOR_POLL.min(remaining)).await;
    }
}

/// A browser process with its single working tab
pub struct ChromiumSession {
    browser: ChromeBrowser,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
    intercept_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    navigation_timeout: Duration,
}

impl ChromiumSession {
    async fn open_page(&self, config: &BrowserConfig) -> Result<Page> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("Failed to create new page")?;

        page.execute(SetUserAgentOverrideParams::new(config.user_agent.clone()))
            .await
            .context("Failed to set user agent")?;

        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            serde_json::json!({ "X-Geo": "0 0" }),
        )))
        .await
        .context("Failed to set extra headers")?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(GEOLOCATION_STUB))
            .await
            .context("Failed to install geolocation stub")?;

        Ok(page)
    }

    fn page(&self) -> Result<&Page> {
        self.page.as_ref().context("Browser session has no open page")
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.page()?;
        match tokio::time::timeout(self.navigation_timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(anyhow::anyhow!("Navigation to {} failed: {}", url, e)),
            Err(_) => Err(anyhow::anyhow!(
                "Navigation to {} timed out after {:?}",
                url,
                self.navigation_timeout
            )),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let script = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(selector)?
        );
        let script = script.as_str();
        Ok(poll_until_true(timeout, move || self.evaluate(script)).await)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .context("Script evaluation failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("Failed to convert script result: {:?}", e))
    }

    async fn content(&self) -> Result<String> {
        self.page()?
            .content()
            .await
            .context("Failed to get page content")
    }

    async fn block_resources(&self, kinds: &[ResourceKind]) -> Result<()> {
        let page = self.page()?.clone();
        let blocked = kinds.to_vec();

        // Listener first so no paused request is missed once Fetch is enabled
        let mut events = page
            .event_listener::<EventRequestPaused>()
            .await
            .context("Failed to subscribe to paused requests")?;

        let intercept_page = page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let block = ResourceKind::from_cdp(&event.resource_type)
                    .is_some_and(|kind| blocked.contains(&kind));

                let outcome = if block {
                    intercept_page
                        .execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ())
                } else {
                    intercept_page
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                };

                if let Err(e) = outcome {
                    debug!("Failed to resolve intercepted request: {}", e);
                }
            }
        });

        if let Ok(mut slot) = self.intercept_task.lock() {
            if let Some(previous) = slot.replace(task) {
                previous.abort();
            }
        }

        page.execute(
            EnableParams::builder()
                .pattern(
                    RequestPattern::builder()
                        .url_pattern("*")
                        .request_stage(RequestStage::Request)
                        .build(),
                )
                .build(),
        )
        .await
        .context("Failed to enable request interception")?;

        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        if let Ok(mut slot) = this.intercept_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
        if let Some(page) = this.page.take() {
            let _ = page.close().await;
        }
        if let Err(e) = this.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        let _ = this.browser.wait().await;
        this.handler_task.abort();
        Ok(())
    }
}
