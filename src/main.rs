//! Signal Trader
//!
//! Turns free-text trading signals into risk-sized trades against a
//! MetaTrader account hosted on MetaApi.

mod api;
mod error;
mod models;
mod session;
mod trading;

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{MetaApiClient, MetaApiConfig};
use crate::trading::{
    ExecutionContext, ExecutionOutcome, ParseOutcome, SignalParser, TradeExecutor, TradingConfig,
};

/// Reply for messages that are not trade signals.
const INVALID_FORMAT: &str = "Invalid trade format. Please use: BUY/SELL SYMBOL Entry SL TP.";

/// Signal trader CLI.
#[derive(Parser)]
#[command(name = "signal-trader")]
#[command(about = "Turn trading signals into risk-sized MetaTrader trades", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// MetaApi API token
    #[arg(long, env = "META_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// MetaApi account id
    #[arg(long, env = "ACCOUNT_ID")]
    account_id: Option<String>,

    /// Client API region (defaults to the account's region)
    #[arg(long, env = "METAAPI_REGION")]
    region: Option<String>,

    /// Fraction of balance risked per trade
    #[arg(long, env = "RISK_FACTOR", default_value = "0.01")]
    risk_factor: f64,

    /// Tradable symbols, comma-separated (defaults to the built-in list)
    #[arg(long, env = "SYMBOLS", value_delimiter = ',')]
    symbols: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a signal into a sized trade
    Trade {
        /// Signal text (read from stdin when omitted)
        #[arg(short, long)]
        signal: Option<String>,

        /// Give up after this many seconds
        #[arg(short, long)]
        deadline_secs: Option<u64>,

        /// Print the resolved trade as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a signal without contacting the account
    Parse {
        /// Signal text (read from stdin when omitted)
        #[arg(short, long)]
        signal: Option<String>,
    },

    /// Show balance, equity and margin
    AccountInfo {
        /// Give up after this many seconds
        #[arg(short, long)]
        deadline_secs: Option<u64>,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = trading_config(&cli)?;

    match &cli.command {
        Commands::Trade {
            signal,
            deadline_secs,
            json,
        } => {
            let text = read_signal(signal.as_deref())?;
            let executor = TradeExecutor::new(config, provider(&cli)?)?;
            let ctx = execution_context(*deadline_secs);

            match executor.execute_with(&text, &ctx).await {
                Ok(ExecutionOutcome::Resolved(trade)) => {
                    if *json {
                        println!("{}", serde_json::to_string_pretty(&trade)?);
                    } else {
                        println!("{}", trade.confirmation());
                    }
                }
                Ok(ExecutionOutcome::Rejected(_)) => {
                    println!("{}", INVALID_FORMAT);
                }
                Err(e) if e.is_input_error() => {
                    error!(error = %e, "Malformed signal");
                    println!("Value error: {}. Check your inputs.", e);
                    std::process::exit(1);
                }
                Err(e) => {
                    error!(error = %e, "Trade execution failed");
                    println!("Error occurred while placing the trade: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Parse { signal } => {
            let text = read_signal(signal.as_deref())?;
            let parser = SignalParser::new(config)?;

            match parser.parse(&text) {
                Ok(ParseOutcome::Trade(request)) => {
                    println!("{}", serde_json::to_string_pretty(&request)?);
                }
                Ok(ParseOutcome::Rejected(reason)) => {
                    info!(reason = %reason, "Signal rejected");
                    println!("{}", INVALID_FORMAT);
                }
                Err(e) => {
                    println!("Value error: {}. Check your inputs.", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::AccountInfo { deadline_secs } => {
            let executor = TradeExecutor::new(config, provider(&cli)?)?;
            let ctx = execution_context(*deadline_secs);

            match executor.account_information_with(&ctx).await {
                Ok(snapshot) => println!("{}", snapshot.report()),
                Err(e) => {
                    error!(error = %e, "Account query failed");
                    println!("Error fetching account information: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Config => {
            println!("\n=== Trading Configuration ===\n");
            println!("Symbols:      {}", config.symbols.join(", "));
            println!("Metals:       {}", config.metal_symbols.join(", "));
            println!("Risk Factor:  {}%", config.risk_factor * 100.0);

            println!("\n=== Account ===\n");
            println!("Account ID:   {}", cli.account_id.as_deref().unwrap_or("(not set)"));
            println!("Region:       {}", cli.region.as_deref().unwrap_or("(from account)"));
            println!(
                "API Token:    {}",
                if cli.token.is_some() { "set" } else { "(not set)" }
            );
        }
    }

    Ok(())
}

fn trading_config(cli: &Cli) -> Result<TradingConfig> {
    let mut config = TradingConfig::with_risk_factor(cli.risk_factor);
    if !cli.symbols.is_empty() {
        config.symbols = cli.symbols.clone();
        config
            .metal_symbols
            .retain(|m| cli.symbols.iter().any(|s| s.eq_ignore_ascii_case(m)));
    }
    Ok(config.validate()?)
}

fn provider(cli: &Cli) -> Result<Arc<MetaApiClient>> {
    let token = cli.token.clone().context("META_API_TOKEN not set")?;
    let account_id = cli.account_id.clone().context("ACCOUNT_ID not set")?;

    let mut config = MetaApiConfig::new(token, account_id);
    config.region = cli.region.clone();

    Ok(Arc::new(MetaApiClient::new(config)?))
}

/// Deadline from the command line plus cancellation on Ctrl+C.
fn execution_context(deadline_secs: Option<u64>) -> ExecutionContext {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling");
            let _ = tx.send(true);
        }
    });

    let ctx = ExecutionContext::unbounded().with_cancel(rx);
    match deadline_secs {
        Some(secs) => ctx.with_deadline(Instant::now() + Duration::from_secs(secs)),
        None => ctx,
    }
}

fn read_signal(arg: Option<&str>) -> Result<String> {
    match arg {
        Some(text) => Ok(text.to_string()),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read signal from stdin")?;
            Ok(text)
        }
    }
}
