//! Listing records and request/response types for the places API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scraped listing.
///
/// Every field other than `query`, `maps_url` and `scraped_at` is best-effort:
/// `None` means no extraction strategy found a value on the detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub query: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<String>,
    pub reviews: Option<String>,
    pub maps_url: String,
    pub scraped_at: DateTime<Utc>,
}

impl ListingRecord {
    /// Upsert key: the maps URL, or the name when the URL is empty
    pub fn storage_key(&self) -> Option<&str> {
        if !self.maps_url.trim().is_empty() {
            Some(self.maps_url.as_str())
        } else {
            self.name.as_deref().filter(|n| !n.trim().is_empty())
        }
    }
}

/// Fields resolved from a listing detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFields {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<String>,
    pub reviews: Option<String>,
}

impl ListingFields {
    /// Tag the fields with their query and identifier
    pub fn into_record(self, query: &str, maps_url: &str) -> ListingRecord {
        ListingRecord {
            query: query.to_string(),
            name: self.name,
            address: self.address,
            phone: self.phone,
            website: self.website,
            rating: self.rating,
            reviews: self.reviews,
            maps_url: maps_url.to_string(),
            scraped_at: Utc::now(),
        }
    }
}

/// Query string of `GET /scrape`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeParams {
    pub query: Option<String>,
    /// Kept raw so non-numeric values fall back to the default instead of 400
    pub limit: Option<String>,
}

/// Response of `GET /scrape`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<ListingRecord>,
}

/// Query string of `GET /listings`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingsParams {
    pub query: Option<String>,
    pub limit: Option<String>,
}

/// Query parameters of `GET /listing`
#[derive(Debug, Clone, Deserialize)]
pub struct ListingParams {
    /// Maps URL, or the name for listings stored without one
    pub key: Option<String>,
}

/// Response of `GET /listings`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingsResponse {
    pub count: usize,
    pub results: Vec<ListingRecord>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
