//! Parse command - extract orders from saved invoice pages.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use tracing::{debug, error, info, warn};

use ordex_core::invoice::{Field, Outcome, State};
use ordex_core::{
    NoopObserver, Order, OrderParser, ParseFailure, ParseObserver, StateMachineParser,
    tokenize_html,
};

use super::config::load_config;
use super::orders::{OutputFormat, format_orders};

/// Arguments for the parse command.
#[derive(Args)]
pub struct ParseArgs {
    /// Invoice page or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Print the token stream instead of parsing
    #[arg(long)]
    tokens: bool,

    /// Print every state transition and unrecognized token
    #[arg(long)]
    trace: bool,

    /// Continue with the remaining pages when one fails
    #[arg(long)]
    continue_on_error: bool,
}

/// Prints parser events to stderr.
struct TransitionPrinter;

impl ParseObserver for TransitionPrinter {
    fn on_token(&mut self, state: State, token: &str, outcome: Outcome) {
        if outcome == Outcome::Unrecognized {
            eprintln!("  {} {:?}", style(format!("[{}]", state)).dim(), token);
        }
    }

    fn on_transition(&mut self, from: State, to: State, token: &str) {
        eprintln!(
            "{} {} {} on {:?}",
            style(from).cyan(),
            style("→").dim(),
            style(to).cyan(),
            token
        );
    }

    fn on_field(&mut self, _state: State, _token: &str, field: Field, value: &str) {
        eprintln!("    {} = {:?}", style(field).green(), value);
    }
}

pub async fn run(args: ParseArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?.filter_map(|r| r.ok()).collect();
    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }
    info!("Found {} pages to parse", files.len());

    let parser = StateMachineParser::from_config(&config.parser);
    let mut orders = Vec::with_capacity(files.len());
    let mut failed = 0;

    for path in &files {
        let html = fs::read_to_string(path)?;

        if args.tokens {
            println!("{}", style(path.display()).bold());
            for (i, token) in tokenize_html(&html).iter().enumerate() {
                println!("{:4}  {}", i, token);
            }
            continue;
        }

        match parse_page(&parser, &html, args.trace) {
            Ok(order) => {
                debug!("Parsed {} from {}", order.id, path.display());
                orders.push(order);
            }
            Err(failure) => {
                failed += 1;
                let fixture = write_fixture(&config.store.fixtures_dir, &failure)?;
                error!("Failed to parse {}: {}", path.display(), failure);
                eprintln!(
                    "{} {}: {} (saved to {})",
                    style("✗").red(),
                    path.display(),
                    failure,
                    fixture.display()
                );
                if !args.continue_on_error {
                    anyhow::bail!("Parsing failed: {}", failure);
                }
            }
        }
    }

    if !args.tokens {
        println!("{}", format_orders(&orders, args.format)?);
    }

    debug!("Parsed {} pages in {:?}", files.len(), start.elapsed());
    if failed > 0 {
        anyhow::bail!("{} of {} pages failed to parse", failed, files.len());
    }

    Ok(())
}

fn parse_page(parser: &StateMachineParser, html: &str, trace: bool) -> Result<Order, ParseFailure> {
    let result = if trace {
        parser.parse_observed(html, &mut TransitionPrinter)?
    } else {
        parser.parse_observed(html, &mut NoopObserver)?
    };

    for warning in &result.warnings {
        warn!("{}: {}", result.order.id, warning);
        eprintln!("{} {}: {}", style("!").yellow(), result.order.id, warning);
    }
    Ok(result.order)
}

/// Keep the failing page as a fixture for later regression tests.
fn write_fixture(dir: &Path, failure: &ParseFailure) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let name = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f").to_string();
    let path = dir.join(format!("{}.html", name));
    fs::write(&path, &failure.content)?;
    Ok(path)
}
