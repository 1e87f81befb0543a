//! Scrape orchestration: one browser session per run, listings visited in
//! discovery order.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use super::browser::{PageSession, ResourceKind, SessionLauncher};
use super::extractor::ListingExtractor;
use super::feed::{FeedCollector, ScrollPolicy};
use super::pacing::{self, Pace, PacingPlan};
use super::search_url;
use crate::config::ScrapeConfig;
use crate::types::ListingRecord;

/// Runs complete scrapes. Holds no per-run state, so concurrent runs only
/// share the launcher.
pub struct Scraper {
    launcher: Arc<dyn SessionLauncher>,
    collector: FeedCollector,
    extractor: ListingExtractor,
    pacing: PacingPlan,
}

impl Scraper {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        collector: FeedCollector,
        extractor: ListingExtractor,
        pacing: PacingPlan,
    ) -> Self {
        Self {
            launcher,
            collector,
            extractor,
            pacing,
        }
    }

    pub fn from_config(launcher: Arc<dyn SessionLauncher>, config: &ScrapeConfig) -> Self {
        let pacing = PacingPlan {
            initial: Pace::from_millis(config.initial_delay_ms, 0),
            listing: Pace::from_millis(config.listing_delay_ms, config.listing_jitter_ms),
        };

        Self::new(
            launcher,
            FeedCollector::new(ScrollPolicy::from(config)),
            ListingExtractor::from(config),
            pacing,
        )
    }

    /// Scrape up to `limit` listings for `query`.
    ///
    /// Fails only when the session cannot be started or the search page
    /// cannot be loaded. Listings that fail individually are logged and left
    /// out. The session is closed on every path.
    pub async fn run(&self, query: &str, limit: usize) -> Result<Vec<ListingRecord>> {
        let session = self
            .launcher
            .launch()
            .await
            .context("Failed to start browser session")?;

        let outcome = self.run_in_session(session.as_ref(), query, limit).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {:#}", e);
        }

        outcome
    }

    async fn run_in_session(
        &self,
        session: &dyn PageSession,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ListingRecord>> {
        session
            .block_resources(&ResourceKind::HEAVY)
            .await
            .context("Failed to set up request interception")?;

        let url = search_url(query);
        info!("Searching \"{}\" (limit {}): {}", query, limit, url);
        session
            .navigate(&url)
            .await
            .context("Failed to load search results")?;
        pacing::delay(self.pacing.initial).await;

        let links = self.collector.collect(session, limit).await?;

        let mut results = Vec::with_capacity(links.len());
        for (i, link) in links.iter().enumerate() {
            pacing::delay(self.pacing.listing).await;
            info!("Scraping item {}/{}: {}", i + 1, links.len(), link);

            match self.extractor.extract(session, link).await {
                Ok(fields) => results.push(fields.into_record(query, link)),
                Err(e) => warn!("Error scraping item {}: {:#}", link, e),
            }
        }

        info!(
            "Scraped {}/{} listing(s) for \"{}\"",
            results.len(),
            links.len(),
            query
        );
        Ok(results)
    }
}
