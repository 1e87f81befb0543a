//! Configuration for the places scraper.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding the browser-side viewer
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> String {
    "public".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// Browser session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Explicit Chrome/Chromium executable; autodetected when unset
    #[serde(default)]
    pub chrome_path: Option<String>,
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

fn default_headless() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36".to_string()
}

fn default_navigation_timeout_ms() -> u64 {
    60_000
}

fn default_window_width() -> u32 {
    1200
}

fn default_window_height() -> u32 {
    900
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            user_agent: default_user_agent(),
            chrome_path: None,
            navigation_timeout_ms: default_navigation_timeout_ms(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

/// Scrape run configuration: result limits, scroll policy and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Consecutive scrolls without feed growth before collection stops
    #[serde(default = "default_max_stagnation")]
    pub max_stagnation: u32,
    /// Pixels per scroll command
    #[serde(default = "default_scroll_step")]
    pub scroll_step: u32,
    #[serde(default = "default_scroll_interval_ms")]
    pub scroll_interval_ms: u64,
    #[serde(default = "default_scroll_jitter_ms")]
    pub scroll_jitter_ms: u64,
    /// Settle time after the search page loads
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_listing_delay_ms")]
    pub listing_delay_ms: u64,
    #[serde(default = "default_listing_jitter_ms")]
    pub listing_jitter_ms: u64,
    /// How long to wait for a listing heading before extracting anyway
    #[serde(default = "default_heading_timeout_ms")]
    pub heading_timeout_ms: u64,
}

fn default_limit() -> usize {
    20
}

fn default_max_limit() -> usize {
    1000
}

fn default_max_stagnation() -> u32 {
    50
}

fn default_scroll_step() -> u32 {
    1000
}

fn default_scroll_interval_ms() -> u64 {
    1000
}

fn default_scroll_jitter_ms() -> u64 {
    400
}

fn default_initial_delay_ms() -> u64 {
    3000
}

fn default_listing_delay_ms() -> u64 {
    1000
}

fn default_listing_jitter_ms() -> u64 {
    1200
}

fn default_heading_timeout_ms() -> u64 {
    4000
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            max_stagnation: default_max_stagnation(),
            scroll_step: default_scroll_step(),
            scroll_interval_ms: default_scroll_interval_ms(),
            scroll_jitter_ms: default_scroll_jitter_ms(),
            initial_delay_ms: default_initial_delay_ms(),
            listing_delay_ms: default_listing_delay_ms(),
            listing_jitter_ms: default_listing_jitter_ms(),
            heading_timeout_ms: default_heading_timeout_ms(),
        }
    }
}

impl ScrapeConfig {
    /// Resolve a caller-supplied limit: missing, unparsable or zero falls back
    /// to the default, everything else is clamped to `[1, max_limit]`.
    pub fn resolve_limit(&self, requested: Option<&str>) -> usize {
        let parsed = requested
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|n| n.is_finite() && *n != 0.0);

        match parsed {
            Some(n) => (n.trunc().max(1.0) as usize).min(self.max_limit.max(1)),
            None => self.default_limit.clamp(1, self.max_limit.max(1)),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/places.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from defaults, `config.toml` and the environment
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            // PLACES__SERVER__PORT, PLACES__BROWSER__USER_AGENT, ...
            .add_source(
                config::Environment::with_prefix("PLACES")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
