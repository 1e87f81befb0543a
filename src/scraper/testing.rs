//! Scripted page sessions for tests.
//!
//! A [`MockPage`] describes a fake site: feed frames revealed one scroll at a
//! time, detail pages by URL, and URLs that fail to load. Sessions launched
//! from it share its counters so tests can inspect what the pipeline did.

use anyhow::Result;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::browser::{PageSession, ResourceKind, SessionLauncher};

/// What the feed shows before one scroll
#[derive(Debug, Clone)]
pub struct FeedFrame {
    pub anchors: Vec<String>,
    pub extent: u64,
}

impl FeedFrame {
    pub fn new(anchors: &[&str], extent: u64) -> Self {
        Self {
            anchors: anchors.iter().map(|a| a.to_string()).collect(),
            extent,
        }
    }
}

#[derive(Default)]
struct Counters {
    scrolls: AtomicUsize,
    launches: AtomicUsize,
    closes: AtomicUsize,
    navigations: Mutex<Vec<String>>,
    blocked: Mutex<Vec<ResourceKind>>,
}

/// Fake site shared by every session launched from it
#[derive(Clone, Default)]
pub struct MockPage {
    feed: Arc<Vec<FeedFrame>>,
    details: Arc<HashMap<String, String>>,
    failing: Arc<HashSet<String>>,
    fail_launch: bool,
    counters: Arc<Counters>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, frames: Vec<FeedFrame>) -> Self {
        self.feed = Arc::new(frames);
        self
    }

    pub fn with_detail(mut self, url: &str, html: &str) -> Self {
        Arc::make_mut(&mut self.details).insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_failing(mut self, url: &str) -> Self {
        Arc::make_mut(&mut self.failing).insert(url.to_string());
        self
    }

    pub fn with_failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn session(&self) -> MockSession {
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        MockSession {
            site: self.clone(),
            frame: AtomicUsize::new(0),
            current: Mutex::new(String::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn launcher(&self) -> Arc<dyn SessionLauncher> {
        Arc::new(self.clone())
    }

    pub fn scroll_count(&self) -> usize {
        self.counters.scrolls.load(Ordering::SeqCst)
    }

    pub fn launch_count(&self) -> usize {
        self.counters.launches.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.counters.navigations.lock().unwrap().clone()
    }

    pub fn blocked(&self) -> Vec<ResourceKind> {
        self.counters.blocked.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionLauncher for MockPage {
    async fn launch(&self) -> Result<Box<dyn PageSession>> {
        if self.fail_launch {
            anyhow::bail!("browser executable not found");
        }
        Ok(Box::new(self.session()))
    }
}

/// One session over a [`MockPage`]
pub struct MockSession {
    site: MockPage,
    frame: AtomicUsize,
    current: Mutex<String>,
    closed: AtomicBool,
}

impl MockSession {
    fn current_frame(&self) -> Option<&FeedFrame> {
        let feed = &self.site.feed;
        if feed.is_empty() {
            return None;
        }
        let index = self.frame.load(Ordering::SeqCst).min(feed.len() - 1);
        feed.get(index)
    }

    fn current_html(&self) -> String {
        let url = self.current.lock().unwrap().clone();
        self.site
            .details
            .get(&url)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string())
    }
}

#[async_trait]
impl PageSession for MockSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        anyhow::ensure!(!self.closed.load(Ordering::SeqCst), "session closed");
        self.site
            .counters
            .navigations
            .lock()
            .unwrap()
            .push(url.to_string());
        if self.site.failing.contains(url) {
            anyhow::bail!("Navigation to {} timed out after 60s", url);
        }
        *self.current.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<bool> {
        let selector = Selector::parse(selector)
            .map_err(|e| anyhow::anyhow!("bad selector: {:?}", e))?;
        let document = Html::parse_document(&self.current_html());
        let found = document.select(&selector).next().is_some();
        Ok(found)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        if script.contains("scrollBy") {
            self.site.counters.scrolls.fetch_add(1, Ordering::SeqCst);
            let extent = self.current_frame().map(|f| f.extent).unwrap_or(0);
            self.frame.fetch_add(1, Ordering::SeqCst);
            return Ok(serde_json::json!(extent));
        }
        if script.contains("querySelectorAll") {
            let anchors = self
                .current_frame()
                .map(|f| f.anchors.clone())
                .unwrap_or_default();
            return Ok(serde_json::json!(anchors));
        }
        Ok(serde_json::Value::Null)
    }

    async fn content(&self) -> Result<String> {
        Ok(self.current_html())
    }

    async fn block_resources(&self, kinds: &[ResourceKind]) -> Result<()> {
        self.site
            .counters
            .blocked
            .lock()
            .unwrap()
            .extend_from_slice(kinds);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.site.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
