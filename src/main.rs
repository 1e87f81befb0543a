//! Places Scraper
//!
//! HTTP API and CLI that collect business listings from map search results.

mod cli;
mod config;
mod export;
mod routes;
mod scraper;
mod storage;
mod types;

use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::routes::AppState;
use crate::scraper::{ChromiumLauncher, Scraper};
use crate::storage::ListingRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `scrape` output on stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "places_scraper=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => run_server(host, port).await,
        Commands::Scrape {
            query,
            limit,
            format,
            no_save,
        } => cli::run_scrape(query, limit, format, no_save).await,
        Commands::Export {
            query,
            output,
            limit,
        } => cli::run_export(query, output, limit),
    }
}

/// Run the API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("Database path: {}", config.storage.path);

    let repository = ListingRepository::new(Path::new(&config.storage.path))?;
    let launcher = Arc::new(ChromiumLauncher::new(config.browser.clone()));
    let scraper = Scraper::from_config(launcher, &config.scrape);

    let static_dir = config.server.static_dir.clone();
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let state = Arc::new(AppState::new(scraper, repository, config));

    let app = routes::router(state, Some(&static_dir));

    tracing::info!("Starting server on {}", addr);
    tracing::info!("Viewer served from {}/", static_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
