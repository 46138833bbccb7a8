//! Invoice command - print the raw page an order was parsed from.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use ordex_core::{FileStore, OrderStore};

use super::config::load_config;

/// Arguments for the invoice command.
#[derive(Args)]
pub struct InvoiceArgs {
    /// Order id, e.g. 112-1234567-7654321
    order_id: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn run(args: InvoiceArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = FileStore::open(&config.store.data_dir)?;

    let Some(html) = store.get_invoice_html(&args.order_id)? else {
        anyhow::bail!("No stored invoice for order {}", args.order_id);
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &html)?;
        println!(
            "{} Invoice written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", html);
    }

    Ok(())
}
