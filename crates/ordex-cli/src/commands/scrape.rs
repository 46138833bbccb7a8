//! Scrape command - fetch orders from the live site into the store.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use clap::Args;
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use ordex_core::{
    BrowserError, BrowserPage, FileStore, Interaction, Order, OrderAction, OrderStore,
    ParseObserver, ScrapeHooks, Scraper, YearAction,
};

use super::config::load_config;
use crate::http_browser::{COOKIE_FILE, HttpLauncher};

/// Arguments for the scrape command.
#[derive(Args)]
pub struct ScrapeArgs {
    /// Year to scrape; repeat for several (default: current year)
    #[arg(short, long = "year")]
    years: Vec<i32>,

    /// Ignore cached pages (fresh pages are still cached)
    #[arg(long)]
    no_cache: bool,

    /// Fail instead of asking for sign-in
    #[arg(long)]
    no_interactive: bool,

    /// Skip orders placed before this date (YYYY-MM-DD)
    #[arg(long)]
    since: Option<NaiveDate>,

    /// Stop at the first order already in the store
    #[arg(long)]
    stop_at_known: bool,

    /// Account to scrape (overrides the configured user)
    #[arg(short, long)]
    user: Option<String>,
}

/// Progress display and the command's skip/stop policy.
struct CliHooks {
    progress: ProgressBar,
    since: Option<NaiveDate>,
    no_cache: bool,
    known: HashSet<String>,
    stop_at_known: bool,
}

impl ParseObserver for CliHooks {}

impl ScrapeHooks for CliHooks {
    fn before_year(&mut self, year: i32) -> YearAction {
        if self.since.is_some_and(|since| year < since.year()) {
            return YearAction::Skip;
        }
        self.progress.set_message(format!("{}", year));
        if self.no_cache {
            YearAction::ScrapeWithoutCache
        } else {
            YearAction::ScrapeWithCache
        }
    }

    fn before_order(&mut self, order_id: &str, date: Option<NaiveDate>) -> OrderAction {
        if self.stop_at_known && self.known.contains(order_id) {
            self.progress
                .println(format!("{} Reached known order {}", style("ℹ").blue(), order_id));
            return OrderAction::Stop;
        }
        match (self.since, date) {
            (Some(since), Some(date)) if date < since => OrderAction::Skip,
            _ => OrderAction::Scrape,
        }
    }

    fn on_cache_hit(&mut self, url: &str) {
        self.progress.set_message(format!("cached {}", url));
    }

    fn on_cache_miss(&mut self, url: &str) {
        self.progress.set_message(format!("fetching {}", url));
    }

    fn on_order_scraped(&mut self, order: &Order) {
        self.progress.inc(1);
        self.progress.println(format!(
            "{} {}  {}  {}",
            style("✓").green(),
            order.id,
            order.date,
            order.total
        ));
    }
}

/// Asks the user on the terminal to sign in, then continues.
struct TerminalInteraction;

#[async_trait]
impl Interaction for TerminalInteraction {
    async fn resolve_challenge(
        &self,
        url: &str,
        _page: &mut dyn BrowserPage,
    ) -> Result<(), BrowserError> {
        let prompt = format!(
            "{} Sign-in required at {}\n  Refresh the session in {} and press Enter to continue.",
            style("!").yellow(),
            url,
            COOKIE_FILE
        );
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            let term = Term::stderr();
            term.write_line(&prompt)?;
            term.read_line()
        })
        .await
        .map_err(|e| BrowserError::Navigation {
            url: url.clone(),
            reason: e.to_string(),
        })?
        .map_err(|e| BrowserError::Navigation {
            url,
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

pub async fn run(args: ScrapeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = load_config(config_path)?;
    if let Some(user) = args.user {
        config.scrape.user = user;
    }
    if args.no_interactive {
        config.scrape.allow_interactive = false;
    }

    let years = years_to_scrape(&args.years, args.since, Local::now().year());
    let store = FileStore::open(&config.store.data_dir)?;
    let known: HashSet<String> = if args.stop_at_known {
        store.get_orders()?.into_iter().map(|o| o.id).collect()
    } else {
        HashSet::new()
    };

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} orders {msg}")?,
    );
    progress.enable_steady_tick(Duration::from_millis(120));

    let mut hooks = CliHooks {
        progress,
        since: args.since,
        no_cache: args.no_cache,
        known,
        stop_at_known: args.stop_at_known,
    };

    info!("Scraping {:?} for {}", years, config.scrape.user);
    let mut scraper = Scraper::new(config.scrape, HttpLauncher, store)
        .with_parser(ordex_core::StateMachineParser::from_config(&config.parser))
        .with_interaction(TerminalInteraction);

    let result = scraper.scrape_years(&years, &mut hooks).await;
    scraper.close().await?;
    hooks.progress.finish_and_clear();

    let report = result?;
    println!(
        "{} Scraped {} orders ({} skipped) from {} pages in {:.1}s",
        style("✓").green(),
        report.orders_scraped,
        report.orders_skipped,
        report.pages_visited,
        start.elapsed().as_secs_f64()
    );
    println!(
        "  {} cache hits, {} live fetches{}",
        report.cache_hits,
        report.live_fetches,
        if report.stopped { ", stopped early" } else { "" }
    );

    Ok(())
}

/// Explicit years as given; otherwise every year from `since` to now,
/// newest first; otherwise the current year.
fn years_to_scrape(years: &[i32], since: Option<NaiveDate>, current_year: i32) -> Vec<i32> {
    if !years.is_empty() {
        return years.to_vec();
    }
    match since {
        Some(since) => (since.year()..=current_year).rev().collect(),
        None => vec![current_year],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hooks(since: Option<NaiveDate>) -> CliHooks {
        CliHooks {
            progress: ProgressBar::hidden(),
            since,
            no_cache: false,
            known: HashSet::from(["112-0000001-0000001".to_string()]),
            stop_at_known: true,
        }
    }

    #[test]
    fn test_years_to_scrape() {
        assert_eq!(years_to_scrape(&[2019, 2018], None, 2021), vec![2019, 2018]);
        assert_eq!(years_to_scrape(&[], None, 2021), vec![2021]);
        let since = NaiveDate::from_ymd_opt(2019, 6, 1);
        assert_eq!(years_to_scrape(&[], since, 2021), vec![2021, 2020, 2019]);
    }

    #[test]
    fn test_since_skips_older_orders_and_years() {
        let mut hooks = hooks(NaiveDate::from_ymd_opt(2020, 3, 1));
        assert_eq!(hooks.before_year(2019), YearAction::Skip);
        assert_eq!(hooks.before_year(2020), YearAction::ScrapeWithCache);
        assert_eq!(
            hooks.before_order("112-0000002-0000002", NaiveDate::from_ymd_opt(2020, 2, 1)),
            OrderAction::Skip
        );
        assert_eq!(
            hooks.before_order("112-0000002-0000002", NaiveDate::from_ymd_opt(2020, 4, 1)),
            OrderAction::Scrape
        );
    }

    #[test]
    fn test_stop_at_known_order() {
        let mut hooks = hooks(None);
        assert_eq!(hooks.before_order("112-0000001-0000001", None), OrderAction::Stop);
        hooks.no_cache = true;
        assert_eq!(hooks.before_year(2021), YearAction::ScrapeWithoutCache);
    }
}
