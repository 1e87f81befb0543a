//! Map search scraper.
//!
//! Provides browser automation, feed collection, listing extraction and the
//! orchestrator tying them together.

pub mod browser;
pub mod extractor;
pub mod feed;
pub mod orchestrator;
pub mod pacing;
pub mod parsers;

#[cfg(test)]
pub mod testing;

pub use browser::ChromiumLauncher;
pub use orchestrator::Scraper;

/// Base URL for map searches
pub const SEARCH_URL: &str = "https://www.google.com/maps/search";

/// Scrollable container of the result feed
pub const FEED_SELECTOR: &str = r#"div[role="feed"]"#;

/// Anchor of one result in the feed; its href is the listing identifier
pub const LISTING_ANCHOR_SELECTOR: &str = "a.hfpxzc";

/// Build the search results URL for a free-text query
pub fn search_url(query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!(
        "{}/{}?ucbcb=1&hl=en&authuser=0",
        SEARCH_URL,
        encoded.replace('+', "%20")
    )
}
