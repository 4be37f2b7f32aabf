use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use hookrelay::config::Settings;
use hookrelay::execution::Executor;
use hookrelay::webhook::{self, AppState, Debouncer, Relay, SignalGate};
use hookrelay::{BitmexClient, Side};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hookrelay", version, about = "Relays charting alerts to BitMEX")]
struct Cli {
    /// Directory holding default.toml and per-environment overrides
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Listen for webhook signals (default)
    Serve {
        /// Overrides webhook.port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one rollover immediately, skipping the webhook
    Execute {
        #[arg(long)]
        instrument: String,
        /// Buy or Sell
        #[arg(long)]
        side: Side,
    },
    /// Print the top of the order book
    Book {
        #[arg(long)]
        instrument: String,
        #[arg(long, default_value_t = 5)]
        depth: usize,
    },
    /// Print margin, the open position and resting orders
    Position {
        #[arg(long)]
        instrument: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config_dir)
        .with_context(|| format!("loading settings from {}", cli.config_dir.display()))?;
    setup_logging(&settings.logging.level);

    if let Err(errors) = settings.validate() {
        for error in &errors {
            tracing::error!("Invalid setting: {}", error);
        }
        bail!("{} invalid setting(s)", errors.len());
    }

    let client = build_client(&settings)?;

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            let port = port.unwrap_or(settings.webhook.port);
            tracing::info!(
                base_url = client.base_url(),
                strategy = %settings.webhook.strategy,
                debounce_ms = settings.webhook.debounce_ms,
                "hookrelay starting"
            );

            let relay = Relay::new(Executor::new(client, settings.sizing));
            let debouncer = Debouncer::new(settings.webhook.debounce(), Arc::new(relay));
            let gate = SignalGate::new(
                settings.webhook.signature.clone(),
                settings.webhook.strategy.clone(),
            );

            webhook::serve(port, AppState::new(gate, debouncer))
                .await
                .context("webhook server")?;
        }
        Command::Execute { instrument, side } => {
            let executor = Executor::new(client, settings.sizing);
            let report = executor.execute(&instrument, side).await?;

            println!(
                "{} {} {} @ ~{} (margin {})",
                report.side,
                report.quantity,
                report.instrument,
                report.reference_price,
                report.available_margin
            );
            println!("{}", serde_json::to_string_pretty(&report.order)?);
        }
        Command::Book { instrument, depth } => {
            let book = client.get_order_book(&instrument, depth).await?;

            println!("{:>12} {:>12}", "price", "size");
            for level in book.asks.iter().rev() {
                println!("{:>12} {:>12}  ask", level.price, level.size);
            }
            println!("{}", "-".repeat(30));
            for level in &book.bids {
                println!("{:>12} {:>12}  bid", level.price, level.size);
            }
        }
        Command::Position { instrument } => {
            let margin = client.get_balance().await?;
            println!(
                "available margin: {} {}",
                margin.available_margin,
                margin.currency.as_deref().unwrap_or("XBt")
            );

            match client.get_position(&instrument).await? {
                Some(position) if position.is_open() => println!(
                    "{}: {} contracts @ {}",
                    position.symbol,
                    position.current_qty,
                    position
                        .avg_entry_price
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string())
                ),
                _ => println!("{}: flat", instrument),
            }

            let orders = client.get_open_orders(&instrument).await?;
            println!("{} open order(s)", orders.len());
            for order in orders {
                println!(
                    "  {} {} {} @ {} [{}]",
                    order.order_id,
                    order.side.map(|s| s.to_string()).unwrap_or_default(),
                    order.order_qty.unwrap_or_default(),
                    order
                        .price
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "market".to_string()),
                    order.ord_status.as_deref().unwrap_or("?")
                );
            }
        }
    }

    Ok(())
}

fn setup_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_client(settings: &Settings) -> anyhow::Result<BitmexClient> {
    let client =
        BitmexClient::with_timeout(settings.exchange.credentials(), settings.exchange.timeout())
            .context("building BitMEX client")?;

    Ok(match settings.exchange.rate_limit() {
        Some(per_minute) => client.with_rate_limit(per_minute),
        None => client,
    })
}
