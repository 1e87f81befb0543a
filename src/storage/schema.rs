//! SQLite schema for scraped listings
//!
//! Tables:
//! - listings: one row per listing, keyed by maps URL (name as fallback)

use rusqlite::{Connection, Result};

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS listings (
            listing_key TEXT PRIMARY KEY,
            query TEXT NOT NULL,
            name TEXT,
            address TEXT,
            phone TEXT,
            website TEXT,
            rating TEXT,
            reviews TEXT,
            maps_url TEXT NOT NULL,
            scraped_at TEXT NOT NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_listings_query ON listings(query)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_listings_scraped_at ON listings(scraped_at)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = 'listings'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_create_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }
}
