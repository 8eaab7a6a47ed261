//! swapwatch - Exchange order watcher - Entry Point

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use swapwatch_bot::WatchOptions;
use swapwatch_client::QuoteRequest;
use swapwatch_core::{Amount, OrderStatus, OrderType, Rate};
use swapwatch_tracker::{OrderTarget, StopReason};
use tracing::{info, warn};

/// Exchange order watcher
#[derive(Parser, Debug)]
#[command(name = "swapwatch", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (can also be set via SWAPWATCH_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll an order until it finishes
    Watch {
        #[arg(long)]
        order_id: String,
        #[arg(long)]
        token: String,
        /// Rate quoted when the order was placed
        #[arg(long, conflicts_with = "from_currency")]
        quoted_rate: Option<Decimal>,
        /// Seed the quoted rate from a fresh float quote: currency sent
        #[arg(long, requires_all = ["to_currency", "amount"])]
        from_currency: Option<String>,
        /// Currency received
        #[arg(long, requires = "from_currency")]
        to_currency: Option<String>,
        /// Amount sent
        #[arg(long, requires = "from_currency")]
        amount: Option<Amount>,
        /// Apply this status after the first observation (needs
        /// polling.simulation_enabled)
        #[arg(long)]
        simulate: Option<OrderStatus>,
    },
    /// Quote a price and check it against a previous rate
    Quote {
        #[arg(long)]
        from_currency: String,
        #[arg(long)]
        to_currency: String,
        #[arg(long)]
        amount: Amount,
        /// "fixed" or "float"
        #[arg(long, default_value = "float")]
        order_type: String,
        /// Rate from an earlier quote
        #[arg(long)]
        previous_rate: Option<Decimal>,
    },
    /// Check an order once and print it
    Check {
        #[arg(long)]
        order_id: String,
        #[arg(long)]
        token: String,
    },
    /// Run the signed relay server
    Gateway,
    /// Print stored completion records as JSON lines
    Records,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    swapwatch_telemetry::init_logging()?;
    info!("Starting swapwatch v{}", env!("CARGO_PKG_VERSION"));

    let config = swapwatch_bot::AppConfig::load(cli.config.as_deref())?;
    let app = swapwatch_bot::Application::new(config)?;

    match cli.command {
        Command::Watch {
            order_id,
            token,
            quoted_rate,
            from_currency,
            to_currency,
            amount,
            simulate,
        } => {
            let mut target = OrderTarget {
                order_id,
                token,
                quoted_rate: quoted_rate.map(Rate::new),
            };
            if let (Some(from), Some(to), Some(amount)) = (from_currency, to_currency, amount) {
                let request = QuoteRequest::new(from, to, amount, OrderType::Float);
                let report = app.quote(&request, None).await?;
                target.quoted_rate = Some(report.quote.rate);
            }
            let options = WatchOptions { simulate };
            let summary = app
                .watch_with(target, options, shutdown_signal())
                .await?;
            if let Some(order) = &summary.order {
                println!("{}", serde_json::to_string_pretty(order)?);
            }
            if summary.reason == StopReason::Fatal {
                bail!("polling stopped on a fatal error");
            }
        }
        Command::Check { order_id, token } => {
            let report = app.check(OrderTarget::new(order_id, token)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Quote {
            from_currency,
            to_currency,
            amount,
            order_type,
            previous_rate,
        } => {
            let request = QuoteRequest::new(
                from_currency,
                to_currency,
                amount,
                OrderType::from_upstream(&order_type),
            );
            let report = app.quote(&request, previous_rate.map(Rate::new)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.drift.is_some() {
                bail!("exchange rate has changed significantly");
            }
        }
        Command::Gateway => app.run_gateway(shutdown_signal()).await?,
        Command::Records => {
            for record in app.records()? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
