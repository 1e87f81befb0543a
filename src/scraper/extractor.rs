//! Per-listing detail extraction.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::debug;

use super::browser::PageSession;
use super::parsers::{ListingParser, HEADING_SELECTOR};
use crate::config::ScrapeConfig;
use crate::types::ListingFields;

/// Visits a listing's detail view and resolves its fields
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    heading_timeout: Duration,
}

impl ListingExtractor {
    pub fn new(heading_timeout: Duration) -> Self {
        Self { heading_timeout }
    }

    /// Extract one listing.
    ///
    /// Only navigation or snapshot failures are errors. Missing fields come
    /// back as `None`, and a heading that never appears does not block
    /// extraction.
    pub async fn extract(&self, session: &dyn PageSession, url: &str) -> Result<ListingFields> {
        session
            .navigate(url)
            .await
            .with_context(|| format!("Failed to open listing {}", url))?;

        let ready = session
            .wait_for_selector(HEADING_SELECTOR, self.heading_timeout)
            .await
            .unwrap_or(false);
        if !ready {
            debug!("Heading not found within {:?}: {}", self.heading_timeout, url);
        }

        let html = session
            .content()
            .await
            .with_context(|| format!("Failed to read listing page {}", url))?;

        Ok(ListingParser::parse(&html, url))
    }
}

impl Default for ListingExtractor {
    fn default() -> Self {
        Self::new(Duration::from_millis(4000))
    }
}

impl From<&ScrapeConfig> for ListingExtractor {
    fn from(config: &ScrapeConfig) -> Self {
        Self::new(Duration::from_millis(config.heading_timeout_ms))
    }
}
