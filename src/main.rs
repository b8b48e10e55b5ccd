//! washscan - wash trade detection over decentralized exchange trade ledgers
//!
//! Discovers groups of traders that repeatedly trade a token in a cycle and
//! labels their trades that net back to zero as wash trades.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// Use the library crate
use dex_wash_detector::cli::commands;
use dex_wash_detector::config::Config;
use dex_wash_detector::ledger::AmountSide;

/// DEX wash trade detector
#[derive(Parser)]
#[command(name = "washscan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "washscan.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect clusters and label wash trades
    Run {
        /// Trade ledger CSV
        #[arg(long)]
        trades: Option<PathBuf>,

        /// Output folder
        #[arg(long)]
        output: Option<PathBuf>,

        /// Relative balance tolerance
        #[arg(long)]
        margin: Option<f64>,

        /// Window size in seconds (repeat for several passes)
        #[arg(long = "window", value_name = "SECS")]
        windows: Vec<u64>,

        /// Minimum cluster recurrence count
        #[arg(long)]
        min_occurrence: Option<u64>,

        /// Settle balances on the ether leg instead of the token leg
        #[arg(long)]
        ether: bool,
    },

    /// Detect clusters only and print the most recurrent ones
    Clusters {
        /// Trade ledger CSV
        #[arg(long)]
        trades: Option<PathBuf>,

        /// Output folder
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dex_wash_detector=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    apply_overrides(&mut config, &cli.command);
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    // Execute command
    let result = match cli.command {
        Commands::Run { .. } => commands::run(&config, cancel).await,
        Commands::Clusters { .. } => commands::clusters(&config, cancel).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Command line flags take precedence over file and environment values
fn apply_overrides(config: &mut Config, command: &Commands) {
    match command {
        Commands::Run {
            trades,
            output,
            margin,
            windows,
            min_occurrence,
            ether,
        } => {
            override_paths(config, trades, output);
            if let Some(margin) = margin {
                config.labeling.margin = *margin;
            }
            if !windows.is_empty() {
                config.labeling.window_sizes_secs = windows.clone();
            }
            if let Some(min) = min_occurrence {
                config.detection.min_occurrence = *min;
            }
            if *ether {
                config.labeling.amount_side = AmountSide::Ether;
            }
        }
        Commands::Clusters { trades, output } => override_paths(config, trades, output),
        Commands::Config => {}
    }
}

fn override_paths(config: &mut Config, trades: &Option<PathBuf>, output: &Option<PathBuf>) {
    if let Some(trades) = trades {
        config.input.trades_path = trades.clone();
    }
    if let Some(output) = output {
        config.output.dir = output.clone();
    }
}

/// Ctrl-C stops detection between peel iterations
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping...");
                cancel.cancel();
            }
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
    });
    info!("Press Ctrl-C to stop");
}
