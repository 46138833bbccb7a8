//! Caller control over a scrape run.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::BrowserError;
use crate::invoice::ParseObserver;
use crate::models::order::Order;

use super::browser::BrowserPage;

/// Decision taken before scraping a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearAction {
    Skip,
    ScrapeWithCache,
    ScrapeWithoutCache,
    Stop,
}

/// Decision taken before scraping an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Skip,
    Scrape,
    Stop,
}

/// Control and observation hooks for a scrape run.
///
/// Control hooks run before each unit of work; returning `Stop` ends the
/// run after the current unit. The remaining callbacks are notifications.
/// Parser events arrive through the [`ParseObserver`] supertrait.
pub trait ScrapeHooks: ParseObserver {
    fn before_year(&mut self, _year: i32) -> YearAction {
        YearAction::ScrapeWithCache
    }

    /// `date` is the placed date shown on the order list, when present.
    fn before_order(&mut self, _order_id: &str, _date: Option<NaiveDate>) -> OrderAction {
        OrderAction::Scrape
    }

    fn on_cache_hit(&mut self, _url: &str) {}

    fn on_cache_miss(&mut self, _url: &str) {}

    /// Called once per order and call. When a headless run restarts in an
    /// interactive session, orders reached again are saved again but not
    /// reported twice.
    fn on_order_scraped(&mut self, _order: &Order) {}
}

/// Hooks that scrape everything with the cache enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl ParseObserver for DefaultHooks {}

impl ScrapeHooks for DefaultHooks {}

/// A human completes a sign-in or verification challenge on `page`.
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Returns once the page should be read again.
    async fn resolve_challenge(&self, url: &str, page: &mut dyn BrowserPage) -> Result<(), BrowserError>;
}

/// Interaction that does nothing; the page is simply re-read.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInteraction;

#[async_trait]
impl Interaction for NoInteraction {
    async fn resolve_challenge(&self, _url: &str, _page: &mut dyn BrowserPage) -> Result<(), BrowserError> {
        Ok(())
    }
}
