//! SQLite storage for scraped listings
//!
//! Records are upserted by listing key, so repeated scrapes of the same
//! listing replace the stored row instead of duplicating it.

pub mod repository;
pub mod schema;

pub use repository::ListingRepository;
