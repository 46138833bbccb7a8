//! Configuration structures for parsing and scraping.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{OrdexError, Result};

/// Main configuration for ordex.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdexConfig {
    /// Scrape orchestration configuration.
    pub scrape: ScrapeConfig,

    /// Invoice parser configuration.
    pub parser: ParserConfig,

    /// Cache and order store configuration.
    pub store: StoreConfig,
}

/// Scrape orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Site root, without trailing slash.
    pub base_url: String,

    /// Order list path; `{year}` is replaced with the year.
    pub order_list_path: String,

    /// Invoice path; `{order_id}` is replaced with the order id.
    pub invoice_path: String,

    /// Account the cache and stored orders are scoped to.
    pub user: String,

    /// Persistent browser profile directory.
    pub profile_dir: PathBuf,

    /// Lower bound of the random delay between navigations.
    pub min_delay_ms: u64,

    /// Upper bound (exclusive) of the random delay between navigations.
    pub max_delay_ms: u64,

    /// Attempts per live fetch before giving up.
    pub fetch_attempts: u32,

    /// Backoff step; attempt `n` waits `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,

    /// Invoices younger than this are re-fetched on every run.
    pub invoice_cache_min_age_days: i64,

    /// Fall back to a visible browser when a sign-in wall is hit.
    pub allow_interactive: bool,

    /// Try headless first.
    pub start_headless: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.amazon.com".to_string(),
            order_list_path: "/your-orders/orders?timeFilter=year-{year}".to_string(),
            invoice_path: "/gp/css/summary/print.html?orderID={order_id}".to_string(),
            user: "default".to_string(),
            profile_dir: PathBuf::from("profile"),
            min_delay_ms: 1_000,
            max_delay_ms: 3_000,
            fetch_attempts: 3,
            retry_backoff_ms: 2_000,
            invoice_cache_min_age_days: 90,
            allow_interactive: true,
            start_headless: true,
        }
    }
}

impl ScrapeConfig {
    /// Order list URL for a year.
    pub fn order_list_url(&self, year: i32) -> String {
        format!(
            "{}{}",
            self.base_url,
            self.order_list_path.replace("{year}", &year.to_string())
        )
    }

    /// Invoice URL for an order.
    pub fn invoice_url(&self, order_id: &str) -> String {
        format!(
            "{}{}",
            self.base_url,
            self.invoice_path.replace("{order_id}", order_id)
        )
    }

    /// Resolve a possibly relative link found on a page.
    pub fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{}", self.base_url, href)
        } else {
            format!("{}/{}", self.base_url, href)
        }
    }
}

/// Invoice parser configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Currency used when no amount on the page carries a symbol.
    pub default_currency: String,

    /// Report subtotal and payment mismatches as warnings.
    pub check_subtotal: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_currency: "$".to_string(),
            check_subtotal: true,
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding cached pages and order records.
    pub data_dir: PathBuf,

    /// Directory parse failures are written to.
    pub fixtures_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("ordex-data"),
            fixtures_dir: PathBuf::from("fixtures"),
        }
    }
}

impl OrdexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| OrdexError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| OrdexError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
