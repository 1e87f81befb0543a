//! SQLite repository for scraped listings

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use super::schema::create_tables;
use crate::types::ListingRecord;

const LISTING_COLUMNS: &str = "query, name, address, phone, website, rating, reviews, maps_url, scraped_at";

/// Repository for listing records
pub struct ListingRepository {
    conn: Connection,
}

impl ListingRepository {
    /// Open (or create) the database at `db_path`
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(db_path).context("Failed to open database")?;
        create_tables(&conn).context("Failed to create tables")?;

        Ok(Self { conn })
    }

    /// Create an in-memory repository (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    // ==================== Write Operations ====================

    /// Upsert a batch of records in one transaction, replacing every field of
    /// an existing row. Returns how many rows were written; records with
    /// neither a maps URL nor a name are skipped.
    pub fn upsert_listings(&self, records: &[ListingRecord]) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let mut written = 0;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO listings (listing_key, {}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                LISTING_COLUMNS
            ))?;

            for record in records {
                let Some(key) = record.storage_key() else {
                    continue;
                };
                stmt.execute(params![
                    key,
                    record.query,
                    record.name,
                    record.address,
                    record.phone,
                    record.website,
                    record.rating,
                    record.reviews,
                    record.maps_url,
                    record.scraped_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                ])?;
                written += 1;
            }
        }

        tx.commit().context("Failed to commit listings")?;
        Ok(written)
    }

    // ==================== Query Operations ====================

    /// Look up one listing by its key
    pub fn get_listing(&self, key: &str) -> Result<Option<ListingRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM listings WHERE listing_key = ?1", LISTING_COLUMNS),
                [key],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Most recently scraped listings, optionally restricted to one query
    pub fn list_listings(&self, query: Option<&str>, limit: usize) -> Result<Vec<ListingRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM listings \
             WHERE (?1 IS NULL OR query = ?1) \
             ORDER BY scraped_at DESC, listing_key \
             LIMIT ?2",
            LISTING_COLUMNS
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![query, limit], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Total stored listings
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<ListingRecord> {
    let scraped_at: String = row.get(8)?;
    let scraped_at = DateTime::parse_from_rfc3339(&scraped_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

    Ok(ListingRecord {
        query: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        phone: row.get(3)?,
        website: row.get(4)?,
        rating: row.get(5)?,
        reviews: row.get(6)?,
        maps_url: row.get(7)?,
        scraped_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::types::ListingFields;

    fn create_test_record(maps_url: &str, name: &str) -> ListingRecord {
        ListingFields {
            name: Some(name.to_string()),
            phone: Some("+44 20 7946 0958".to_string()),
            rating: Some("4.5".to_string()),
            ..Default::default()
        }
        .into_record("coffee london", maps_url)
    }

    #[test]
    fn test_insert_and_get_listing() {
        let repo = ListingRepository::in_memory().unwrap();
        let record = create_test_record("https://maps/a", "Cafe A");

        assert_eq!(repo.upsert_listings(&[record.clone()]).unwrap(), 1);

        let stored = repo.get_listing("https://maps/a").unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Cafe A"));
        assert_eq!(stored.address, None);
        assert_eq!(stored.maps_url, record.maps_url);
        assert_eq!(
            stored.scraped_at.timestamp_millis(),
            record.scraped_at.timestamp_millis()
        );
    }

    #[test]
    fn test_upsert_replaces_all_fields() {
        let repo = ListingRepository::in_memory().unwrap();
        let first = create_test_record("https://maps/a", "Cafe A");
        repo.upsert_listings(&[first]).unwrap();

        let mut second = create_test_record("https://maps/a", "Cafe A (renamed)");
        second.phone = None;
        second.website = Some("cafe-a.example".to_string());
        repo.upsert_listings(&[second]).unwrap();

        assert_eq!(repo.count().unwrap(), 1);
        let stored = repo.get_listing("https://maps/a").unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Cafe A (renamed)"));
        assert_eq!(stored.phone, None);
        assert_eq!(stored.website.as_deref(), Some("cafe-a.example"));
    }

    #[test]
    fn test_name_is_fallback_key() {
        let repo = ListingRepository::in_memory().unwrap();
        let record = create_test_record("", "Nameless URL Cafe");
        let mut keyless = create_test_record("", "x");
        keyless.name = None;

        assert_eq!(repo.upsert_listings(&[record, keyless]).unwrap(), 1);
        assert!(repo.get_listing("Nameless URL Cafe").unwrap().is_some());
    }

    #[test]
    fn test_list_listings_filters_and_orders() {
        let repo = ListingRepository::in_memory().unwrap();
        let mut older = create_test_record("https://maps/old", "Old");
        older.scraped_at = older.scraped_at - Duration::hours(1);
        let newer = create_test_record("https://maps/new", "New");
        let mut other = create_test_record("https://maps/tea", "Tea");
        other.query = "tea".to_string();

        repo.upsert_listings(&[older, newer, other]).unwrap();

        let coffee = repo.list_listings(Some("coffee london"), 10).unwrap();
        let names: Vec<_> = coffee.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, vec!["New", "Old"]);

        assert_eq!(repo.list_listings(None, 10).unwrap().len(), 3);
        assert_eq!(repo.list_listings(None, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_listing() {
        let repo = ListingRepository::in_memory().unwrap();
        assert!(repo.get_listing("https://maps/none").unwrap().is_none());
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_file_backed_repository() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("places.db");

        let repo = ListingRepository::new(&path).unwrap();
        repo.upsert_listings(&[create_test_record("https://maps/a", "A")])
            .unwrap();
        drop(repo);

        let reopened = ListingRepository::new(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
