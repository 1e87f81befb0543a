//! CLI commands for places-scraper.
//!
//! Supports API server mode, one-off scrapes and CSV export of stored
//! listings.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::export::write_csv;
use crate::scraper::{ChromiumLauncher, Scraper};
use crate::storage::ListingRepository;
use crate::types::ListingRecord;

#[derive(Parser)]
#[command(name = "places-scraper")]
#[command(version, about = "Map search listing scraper: HTTP API and CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one scrape and print the listings
    Scrape {
        /// Search query, e.g. "coffee shop London"
        #[arg(value_name = "QUERY")]
        query: String,

        /// Maximum listings to collect
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Do not store the results
        #[arg(long)]
        no_save: bool,
    },

    /// Export stored listings as CSV
    Export {
        /// Only listings scraped for this query
        #[arg(short, long)]
        query: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum rows
        #[arg(long, default_value_t = 10_000)]
        limit: usize,
    },
}

/// Run a single scrape from the terminal.
pub async fn run_scrape(
    query: String,
    limit: Option<usize>,
    format: String,
    no_save: bool,
) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let limit = config
        .scrape
        .resolve_limit(limit.map(|l| l.to_string()).as_deref());

    let launcher = Arc::new(ChromiumLauncher::new(config.browser.clone()));
    let scraper = Scraper::from_config(launcher, &config.scrape);

    eprintln!("Scraping \"{}\" (limit {})", query, limit);
    let results = scraper.run(&query, limit).await?;
    eprintln!("Scraped {} listing(s)", results.len());

    if !no_save && !results.is_empty() {
        let repo = ListingRepository::new(Path::new(&config.storage.path))?;
        let written = repo.upsert_listings(&results)?;
        eprintln!(
            "Stored {} listing(s) in {} ({} total)",
            written,
            config.storage.path,
            repo.count()?
        );
    }

    match format.as_str() {
        "table" => print_table(&results),
        "json" => println!("{}", serde_json::to_string_pretty(&results)?),
        _ => {
            eprintln!("Unknown format: {}. Using JSON.", format);
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}

/// Print listings in table format.
fn print_table(results: &[ListingRecord]) {
    println!(
        "{:<32} {:<18} {:>6} {:>8}  {}",
        "Name", "Phone", "Rating", "Reviews", "Website"
    );
    for r in results {
        println!(
            "{:<32} {:<18} {:>6} {:>8}  {}",
            truncate(r.name.as_deref().unwrap_or("-"), 32),
            r.phone.as_deref().unwrap_or("-"),
            r.rating.as_deref().unwrap_or("-"),
            r.reviews.as_deref().unwrap_or("-"),
            r.website.as_deref().unwrap_or("-"),
        );
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Export stored listings as CSV.
pub fn run_export(query: Option<String>, output: Option<PathBuf>, limit: usize) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let repo = ListingRepository::new(Path::new(&config.storage.path))?;
    let records = repo.list_listings(query.as_deref(), limit)?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(std::io::BufWriter::new(file), &records)?;
            eprintln!("Wrote {} listing(s) to {}", records.len(), path.display());
        }
        None => write_csv(std::io::stdout().lock(), &records)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scrape_command() {
        let cli = Cli::parse_from(["places-scraper", "scrape", "coffee london", "-l", "5"]);
        match cli.command {
            Commands::Scrape {
                query,
                limit,
                format,
                no_save,
            } => {
                assert_eq!(query, "coffee london");
                assert_eq!(limit, Some(5));
                assert_eq!(format, "json");
                assert!(!no_save);
            }
            _ => panic!("expected scrape command"),
        }
    }

    #[test]
    fn test_parse_serve_defaults_to_config() {
        let cli = Cli::parse_from(["places-scraper", "serve"]);
        assert!(matches!(
            cli.command,
            Commands::Serve {
                host: None,
                port: None
            }
        ));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
