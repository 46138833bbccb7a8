//! The scrape orchestrator.
//!
//! Work is strictly sequential: years in the order given, pages of a year
//! through their next links, orders in markup order. One browser context
//! and one page are reused for every navigation.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{BrowserError, ErrorKind, ScrapeError, StoreError};
use crate::invoice::{ExtractionResult, OrderParser, StateMachineParser};
use crate::models::config::ScrapeConfig;
use crate::models::order::Order;
use crate::store::OrderStore;

use super::browser::{BrowserContext, BrowserLauncher, BrowserPage, LaunchMode};
use super::cache::{cache_key, invoice_cacheable, list_page_trusted};
use super::hooks::{Interaction, NoInteraction, OrderAction, ScrapeHooks, YearAction};
use super::list::{is_sign_in_page, parse_order_list, OrderCard, OrderListPage};
use super::throttle::Throttle;

type Result<T> = std::result::Result<T, ScrapeError>;

/// Counters for one scrape run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeReport {
    pub years_visited: u32,
    pub pages_visited: u32,
    pub orders_scraped: u32,
    pub orders_skipped: u32,
    pub cache_hits: u32,
    pub live_fetches: u32,
    /// A hook asked to stop.
    pub stopped: bool,
}

struct Session {
    context: Box<dyn BrowserContext>,
    page: Box<dyn BrowserPage>,
}

/// Drives the browser through order lists and invoices, backed by a store.
pub struct Scraper<L: BrowserLauncher, S: OrderStore> {
    config: ScrapeConfig,
    parser: StateMachineParser,
    launcher: L,
    store: S,
    interaction: Box<dyn Interaction>,
    session: Option<Session>,
    mode: LaunchMode,
    throttle: Throttle,
    today: NaiveDate,
    /// Orders already reported to `on_order_scraped` in the current call.
    notified: HashSet<String>,
}

impl<L: BrowserLauncher, S: OrderStore> Scraper<L, S> {
    pub fn new(config: ScrapeConfig, launcher: L, store: S) -> Self {
        let throttle = Throttle::new(config.min_delay_ms, config.max_delay_ms);
        let mode = initial_mode(&config);
        Self {
            config,
            parser: StateMachineParser::new(),
            launcher,
            store,
            interaction: Box::new(NoInteraction),
            session: None,
            mode,
            throttle,
            today: Local::now().date_naive(),
            notified: HashSet::new(),
        }
    }

    pub fn with_parser(mut self, parser: StateMachineParser) -> Self {
        self.parser = parser;
        self
    }

    /// How a human is brought in when an interactive session is challenged.
    pub fn with_interaction(mut self, interaction: impl Interaction + 'static) -> Self {
        self.interaction = Box::new(interaction);
        self
    }

    /// Date used for the current-year and invoice-age rules.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Scrape every order of `years`, escalating to an interactive browser
    /// when the site asks for sign-in.
    pub async fn scrape_years<H: ScrapeHooks>(
        &mut self,
        years: &[i32],
        hooks: &mut H,
    ) -> Result<ScrapeReport> {
        self.notified.clear();
        loop {
            match self.run_years(years, hooks).await {
                Err(e) if self.should_escalate(&e) => self.escalate().await,
                other => return other,
            }
        }
    }

    /// Scrape a single invoice by order id.
    pub async fn scrape_order<H: ScrapeHooks>(
        &mut self,
        order_id: &str,
        hooks: &mut H,
    ) -> Result<Order> {
        let url = self.config.invoice_url(order_id);
        self.notified.clear();
        loop {
            let mut report = ScrapeReport::default();
            match self.scrape_invoice(&url, true, hooks, &mut report).await {
                Err(e) if self.should_escalate(&e) => self.escalate().await,
                other => return other,
            }
        }
    }

    /// Close the browser session, if one was opened.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            debug!("Closing browser session");
            session.page.close().await?;
            session.context.close().await?;
        }
        Ok(())
    }

    fn should_escalate(&self, error: &ScrapeError) -> bool {
        error.kind() == ErrorKind::AuthenticationRequired
            && self.mode == LaunchMode::Headless
            && self.config.allow_interactive
    }

    async fn escalate(&mut self) {
        warn!("Sign-in required, retrying with an interactive browser");
        if let Err(e) = self.close().await {
            warn!("Failed to close headless session: {}", e);
        }
        self.mode = LaunchMode::Interactive;
    }

    async fn run_years<H: ScrapeHooks>(
        &mut self,
        years: &[i32],
        hooks: &mut H,
    ) -> Result<ScrapeReport> {
        let mut report = ScrapeReport::default();
        for &year in years {
            let use_cache = match hooks.before_year(year) {
                YearAction::Skip => {
                    debug!("Skipping {}", year);
                    continue;
                }
                YearAction::Stop => {
                    report.stopped = true;
                    break;
                }
                YearAction::ScrapeWithCache => true,
                YearAction::ScrapeWithoutCache => false,
            };

            info!("Scraping orders for {}", year);
            report.years_visited += 1;
            if self.scrape_year(year, use_cache, hooks, &mut report).await? {
                report.stopped = true;
                break;
            }
        }
        Ok(report)
    }

    /// Returns `true` when a hook asked to stop.
    async fn scrape_year<H: ScrapeHooks>(
        &mut self,
        year: i32,
        use_cache: bool,
        hooks: &mut H,
        report: &mut ScrapeReport,
    ) -> Result<bool> {
        let mut next = Some(self.config.order_list_url(year));
        while let Some(url) = next {
            let page = self.load_list_page(year, &url, use_cache, hooks, report).await?;
            report.pages_visited += 1;

            for card in &page.orders {
                match hooks.before_order(&card.id, card.date) {
                    OrderAction::Skip => {
                        report.orders_skipped += 1;
                        continue;
                    }
                    OrderAction::Stop => return Ok(true),
                    OrderAction::Scrape => {}
                }
                let invoice_url = self.invoice_url_for(card);
                self.scrape_invoice(&invoice_url, use_cache, hooks, report)
                    .await?;
            }

            next = page.next_href.map(|href| self.config.absolute_url(&href));
        }
        Ok(false)
    }

    async fn scrape_invoice<H: ScrapeHooks>(
        &mut self,
        url: &str,
        use_cache: bool,
        hooks: &mut H,
        report: &mut ScrapeReport,
    ) -> Result<Order> {
        let (result, content) = self.load_invoice(url, use_cache, hooks, report).await?;
        let order = result.order;
        self.store
            .save_order(&order, &self.config.user, url, &content)?;
        if self.notified.insert(order.id.clone()) {
            hooks.on_order_scraped(&order);
        }
        report.orders_scraped += 1;
        info!("Scraped order {} ({})", order.id, order.date);
        Ok(order)
    }

    fn invoice_url_for(&self, card: &OrderCard) -> String {
        match &card.invoice_href {
            Some(href) => self.config.absolute_url(href),
            None => self.config.invoice_url(&card.id),
        }
    }

    fn is_cached(&self, url: &str) -> std::result::Result<bool, StoreError> {
        Ok(self
            .store
            .check_cache(&cache_key(&self.config.user, url))?
            .is_some())
    }

    async fn load_list_page<H: ScrapeHooks>(
        &mut self,
        year: i32,
        url: &str,
        use_cache: bool,
        hooks: &mut H,
        report: &mut ScrapeReport,
    ) -> Result<OrderListPage> {
        let key = cache_key(&self.config.user, url);

        if use_cache {
            if let Some(content) = self.store.check_cache(&key)? {
                match parse_order_list(&content) {
                    Some(page) => {
                        let invoice_urls: Vec<String> =
                            page.orders.iter().map(|c| self.invoice_url_for(c)).collect();
                        let trusted = list_page_trusted(
                            year,
                            self.today.year(),
                            invoice_urls.iter().map(String::as_str),
                            |u| self.is_cached(u),
                        )?;
                        if trusted {
                            debug!("Cache hit for {}", url);
                            hooks.on_cache_hit(url);
                            report.cache_hits += 1;
                            return Ok(page);
                        }
                        debug!("Cached list page {} has uncached invoices", url);
                    }
                    None => {
                        warn!("Discarding unusable cached page {}", url);
                        self.store.remove_cache(&key)?;
                    }
                }
            }
        }

        hooks.on_cache_miss(url);
        let (mut content, mut resolved) = self.fetch_live(url, report).await?;
        if parse_order_list(&content).is_none() {
            (content, resolved) = self.challenge(url, content).await?;
        }
        let Some(page) = parse_order_list(&content) else {
            return Err(ScrapeError::AuthenticationRequired {
                url: url.to_string(),
                content,
            });
        };

        self.write_back(&key, url, &resolved, &content)?;
        Ok(page)
    }

    async fn load_invoice<H: ScrapeHooks>(
        &mut self,
        url: &str,
        use_cache: bool,
        hooks: &mut H,
        report: &mut ScrapeReport,
    ) -> Result<(ExtractionResult, String)> {
        let key = cache_key(&self.config.user, url);

        if use_cache {
            if let Some(content) = self.store.check_cache(&key)? {
                match self.parse_invoice(url, &content, hooks) {
                    Ok(result) => {
                        debug!("Cache hit for {}", url);
                        hooks.on_cache_hit(url);
                        report.cache_hits += 1;
                        return Ok((result, content));
                    }
                    Err(e) => {
                        warn!("Discarding unusable cached page {}: {}", url, e);
                        self.store.remove_cache(&key)?;
                    }
                }
            }
        }

        hooks.on_cache_miss(url);
        let (mut content, mut resolved) = self.fetch_live(url, report).await?;
        if is_sign_in_page(&content) {
            (content, resolved) = self.challenge(url, content).await?;
        }
        let result = self.parse_invoice(url, &content, hooks)?;

        if invoice_cacheable(
            result.order.date,
            self.today,
            self.config.invoice_cache_min_age_days,
        ) {
            self.write_back(&key, url, &resolved, &content)?;
        } else {
            debug!("Order {} is too recent to cache", result.order.id);
        }
        Ok((result, content))
    }

    fn parse_invoice<H: ScrapeHooks>(
        &self,
        url: &str,
        content: &str,
        hooks: &mut H,
    ) -> Result<ExtractionResult> {
        if is_sign_in_page(content) {
            return Err(ScrapeError::AuthenticationRequired {
                url: url.to_string(),
                content: content.to_string(),
            });
        }
        self.parser
            .parse_observed(content, hooks)
            .map_err(|failure| ScrapeError::Parse {
                url: url.to_string(),
                failure,
            })
    }

    /// Cache live content unless the browser ended up somewhere else.
    fn write_back(&mut self, key: &str, url: &str, resolved: &str, content: &str) -> Result<()> {
        if resolved != url {
            warn!("{} redirected to {}, not caching", url, resolved);
            return Ok(());
        }
        self.store.update_cache(key, content)?;
        Ok(())
    }

    async fn session(&mut self) -> Result<&mut Session> {
        if self.session.is_none() {
            info!("Launching {:?} browser", self.mode);
            let context = self
                .launcher
                .launch(&self.config.profile_dir, self.mode)
                .await?;
            let page = context.new_page().await?;
            self.session = Some(Session { context, page });
        }
        self.session.as_mut().ok_or(ScrapeError::Browser(BrowserError::Closed))
    }

    /// Navigate with retries. Returns the content and the resolved URL.
    async fn fetch_live(&mut self, url: &str, report: &mut ScrapeReport) -> Result<(String, String)> {
        let attempts = self.config.fetch_attempts.max(1);
        let backoff = Duration::from_millis(self.config.retry_backoff_ms);
        self.session().await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.throttle.wait().await;
            match self.navigate(url).await {
                Ok(fetched) => {
                    report.live_fetches += 1;
                    return Ok(fetched);
                }
                Err(e) if attempt < attempts => {
                    warn!("Fetch {} of {} for {} failed: {}", attempt, attempts, url, e);
                    sleep(backoff * attempt).await;
                }
                Err(e) => {
                    return Err(ScrapeError::Fetch {
                        url: url.to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    async fn navigate(&mut self, url: &str) -> std::result::Result<(String, String), BrowserError> {
        let session = self.session.as_mut().ok_or(BrowserError::Closed)?;
        session.page.goto(url).await?;
        let content = session.page.content().await?;
        let resolved = session.page.url().await?;
        Ok((content, resolved))
    }

    /// Let a human clear a challenge, then read the page again. Headless
    /// sessions cannot, so the challenge surfaces as an error.
    async fn challenge(&mut self, url: &str, content: String) -> Result<(String, String)> {
        if !self.mode.is_interactive() {
            return Err(ScrapeError::AuthenticationRequired {
                url: url.to_string(),
                content,
            });
        }

        info!("Waiting for sign-in at {}", url);
        let session = self.session.as_mut().ok_or(BrowserError::Closed)?;
        self.interaction
            .resolve_challenge(url, session.page.as_mut())
            .await?;
        self.throttle.wait().await;
        Ok(self.navigate(url).await?)
    }
}

fn initial_mode(config: &ScrapeConfig) -> LaunchMode {
    if config.start_headless {
        LaunchMode::Headless
    } else {
        LaunchMode::Interactive
    }
}
