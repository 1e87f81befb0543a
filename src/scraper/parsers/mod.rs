//! HTML parsers for listing detail pages.

pub mod listing;
pub mod patterns;

pub use listing::{ListingParser, HEADING_SELECTOR};
