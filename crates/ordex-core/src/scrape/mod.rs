//! Scrape orchestration: order list pages to invoices, through the cache.

pub mod browser;
pub mod cache;
mod hooks;
pub mod list;
mod orchestrator;
pub mod throttle;

pub use browser::{BrowserContext, BrowserLauncher, BrowserPage, LaunchMode};
pub use cache::cache_key;
pub use hooks::{DefaultHooks, Interaction, NoInteraction, OrderAction, ScrapeHooks, YearAction};
pub use orchestrator::{ScrapeReport, Scraper};
