//! Orders command - list stored orders.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use ordex_core::{FileStore, Order, OrderStore};

use super::config::load_config;

/// Arguments for the orders command.
#[derive(Args)]
pub struct OrdersArgs {
    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per order
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: OrdersArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = FileStore::open(&config.store.data_dir)?;
    let orders = store.get_orders()?;
    info!("Loaded {} orders from {}", orders.len(), store.root().display());

    let output = format_orders(&orders, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} {} orders written to {}",
            style("✓").green(),
            orders.len(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    Ok(())
}

pub fn format_orders(orders: &[Order], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(orders)?),
        OutputFormat::Csv => format_csv(orders),
        OutputFormat::Text => Ok(orders
            .iter()
            .map(format_text)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

fn format_csv(orders: &[Order]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "order_id",
        "date",
        "placed_by",
        "items",
        "subtotal",
        "shipping",
        "tax",
        "total",
        "currency",
        "payments",
    ])?;

    for order in orders {
        let payments = order
            .payments
            .iter()
            .map(|p| p.describe())
            .collect::<Vec<_>>()
            .join("; ");
        wtr.write_record([
            order.id.clone(),
            order.date.to_string(),
            order.placed_by.clone().unwrap_or_default(),
            order.item_count().to_string(),
            order.subtotal.to_decimal().to_string(),
            order
                .shipping_cost
                .as_ref()
                .map(|m| m.to_decimal().to_string())
                .unwrap_or_default(),
            order.tax.to_decimal().to_string(),
            order.total.to_decimal().to_string(),
            order.currency.clone(),
            payments,
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

pub fn format_text(order: &Order) -> String {
    let mut output = String::new();

    output.push_str(&format!("Order: {}\n", order.id));
    output.push_str(&format!("Date: {}\n", order.date));
    if let Some(placed_by) = &order.placed_by {
        output.push_str(&format!("Placed by: {}\n", placed_by));
    }

    for (i, shipment) in order.shipments.iter().enumerate() {
        output.push_str(&format!("\nShipment {}", i + 1));
        if let Some(date) = shipment.date {
            output.push_str(&format!(" ({})", date));
        }
        output.push('\n');
        match &shipment.shipping_address {
            Some(address) if address.is_undisclosed() => {
                output.push_str("  To: (address withheld)\n");
            }
            Some(address) => output.push_str(&format!("  To: {}\n", address.format())),
            None => {}
        }
        for item in &shipment.items {
            output.push_str(&format!(
                "  {} x {} @ {}\n",
                item.quantity, item.name, item.price
            ));
        }
    }

    output.push_str("\nSummary:\n");
    output.push_str(&format!("  Subtotal: {}\n", order.subtotal));
    if let Some(shipping) = &order.shipping_cost {
        output.push_str(&format!("  Shipping: {}\n", shipping));
    }
    output.push_str(&format!("  Tax:      {}\n", order.tax));
    output.push_str(&format!("  Total:    {}\n", order.total));

    if !order.payments.is_empty() {
        output.push_str("\nPayments:\n");
        for payment in &order.payments {
            output.push_str(&format!(
                "  {} on {}: {}\n",
                payment.describe(),
                payment.date(),
                payment.amount()
            ));
        }
    }

    output
}
