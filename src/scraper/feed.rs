//! Feed scrolling and listing identifier collection.
//!
//! The result feed is virtualized and never reports a total, so the only
//! exhaustion signal is its scroll height failing to grow.

use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, info};

use super::browser::PageSession;
use super::pacing::{self, Pace};
use super::{FEED_SELECTOR, LISTING_ANCHOR_SELECTOR};
use crate::config::ScrapeConfig;

/// Bounded-retry policy of the scroll loop
#[derive(Debug, Clone, Copy)]
pub struct ScrollPolicy {
    /// Consecutive non-growing iterations before giving up
    pub max_stagnation: u32,
    /// Pixels scrolled per iteration
    pub scroll_step: u32,
    /// Wait after each scroll for lazy content to render
    pub poll: Pace,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            max_stagnation: 50,
            scroll_step: 1000,
            poll: Pace::from_millis(1000, 400),
        }
    }
}

impl From<&ScrapeConfig> for ScrollPolicy {
    fn from(config: &ScrapeConfig) -> Self {
        Self {
            max_stagnation: config.max_stagnation,
            scroll_step: config.scroll_step,
            poll: Pace::from_millis(config.scroll_interval_ms, config.scroll_jitter_ms),
        }
    }
}

/// State of one collection pass. Owned by the pass and dropped with it.
#[derive(Debug, Default)]
pub struct CollectionState {
    seen: HashSet<String>,
    order: Vec<String>,
    previous_extent: u64,
    stagnation: u32,
}

impl CollectionState {
    /// Add anchors in discovery order; returns how many were new
    pub fn record_anchors<I>(&mut self, anchors: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.order.len();
        for anchor in anchors {
            let anchor = anchor.trim();
            if anchor.is_empty() || self.seen.contains(anchor) {
                continue;
            }
            self.seen.insert(anchor.to_string());
            self.order.push(anchor.to_string());
        }
        self.order.len() - before
    }

    /// Compare the extent read this iteration against the previous one
    pub fn observe_extent(&mut self, extent: u64) {
        if extent == self.previous_extent {
            self.stagnation += 1;
        } else {
            self.stagnation = 0;
        }
        self.previous_extent = extent;
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn stagnation(&self) -> u32 {
        self.stagnation
    }

    /// First `limit` identifiers in discovery order
    pub fn into_identifiers(mut self, limit: usize) -> Vec<String> {
        self.order.truncate(limit);
        self.order
    }
}

/// Drives the feed and collects unique listing identifiers
#[derive(Debug, Clone)]
pub struct FeedCollector {
    policy: ScrollPolicy,
    feed_selector: String,
    anchor_selector: String,
}

impl FeedCollector {
    pub fn new(policy: ScrollPolicy) -> Self {
        Self {
            policy,
            feed_selector: FEED_SELECTOR.to_string(),
            anchor_selector: LISTING_ANCHOR_SELECTOR.to_string(),
        }
    }

    fn anchors_script(&self) -> String {
        format!(
            "Array.from(document.querySelectorAll({})).map(e => e.href)",
            js_string(&self.anchor_selector)
        )
    }

    /// Reads the feed's scroll height, then scrolls it. 0 when the feed is absent.
    fn scroll_script(&self) -> String {
        format!(
            r#"(() => {{
                const feed = document.querySelector({});
                if (!feed) return 0;
                const height = feed.scrollHeight;
                feed.scrollBy(0, {});
                return height;
            }})()"#,
            js_string(&self.feed_selector),
            self.policy.scroll_step
        )
    }

    /// Collect at most `limit` identifiers in first-seen order.
    ///
    /// Stops once `limit` unique identifiers are seen or the feed height has
    /// not changed for `max_stagnation` consecutive iterations. A missing feed
    /// reads as height 0 and simply exhausts the stagnation budget.
    pub async fn collect(&self, session: &dyn PageSession, limit: usize) -> Result<Vec<String>> {
        let mut state = CollectionState::default();
        let anchors_script = self.anchors_script();
        let scroll_script = self.scroll_script();
        let mut iterations = 0u32;

        while state.len() < limit && state.stagnation() < self.policy.max_stagnation {
            iterations += 1;

            let anchors = session
                .evaluate(&anchors_script)
                .await
                .context("Failed to read feed anchors")?;
            let added = state.record_anchors(string_list(&anchors));

            let extent = session
                .evaluate(&scroll_script)
                .await
                .context("Failed to scroll feed")?;
            state.observe_extent(extent.as_f64().unwrap_or(0.0).max(0.0) as u64);

            debug!(
                "Feed iteration {}: +{} anchors ({} total), stagnation {}",
                iterations,
                added,
                state.len(),
                state.stagnation()
            );

            pacing::delay(self.policy.poll).await;
        }

        let exhausted = state.len() < limit;
        let identifiers = state.into_identifiers(limit);
        info!(
            "Collected {} listing(s) in {} iteration(s){}",
            identifiers.len(),
            iterations,
            if exhausted { " (feed stopped growing)" } else { "" }
        );

        Ok(identifiers)
    }
}

impl Default for FeedCollector {
    fn default() -> Self {
        Self::new(ScrollPolicy::default())
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn string_list(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Zero-wait policy for fixtures
#[cfg(test)]
pub(crate) fn instant_policy(max_stagnation: u32) -> ScrollPolicy {
    ScrollPolicy {
        max_stagnation,
        scroll_step: 1000,
        poll: Pace::fixed(tokio::time::Duration::ZERO),
    }
}
