//! CLI application for order invoice extraction.

mod commands;
mod http_browser;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, invoice, orders, parse, scrape};

/// ordex - Extract structured orders from retailer invoice pages
#[derive(Parser)]
#[command(name = "ordex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse saved invoice pages offline
    Parse(parse::ParseArgs),

    /// List stored orders
    Orders(orders::OrdersArgs),

    /// Print the stored invoice page of an order
    Invoice(invoice::InvoiceArgs),

    /// Scrape orders from the live site
    Scrape(scrape::ScrapeArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Parse(args) => parse::run(args, config_path).await,
        Commands::Orders(args) => orders::run(args, config_path).await,
        Commands::Invoice(args) => invoice::run(args, config_path).await,
        Commands::Scrape(args) => scrape::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
