//! Arbitrage agent entry point.

use clap::{Parser, Subcommand};
use futures::stream;
use tracing::{error, info, warn};

use arby::arby::{Arby, DefaultVenues};
use arby::config::Config;
use arby::error::ArbyError;
use arby::logger::init_logging;
use arby::metrics;
use arby::utils::shutdown_token;

/// Arbitrage agent between a centralized exchange and OpenDEX.
#[derive(Parser, Debug)]
#[command(name = "arby")]
#[command(about = "Arbitrage agent quoting OpenDEX around a centralized exchange price")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the agent until shutdown (default).
    Run {
        /// Query balances and cancel orders on the real centralized venue.
        #[arg(long)]
        live_cex: bool,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Run { live_cex }) => cmd_run(live_cex, args.verbose).await,
        None => cmd_run(false, args.verbose).await,
    }
}

/// Load and validate configuration.
fn load_config(live_cex: bool) -> arby::Result<Config> {
    let mut config = Config::load()?;
    if live_cex {
        config.live_cex = true;
    }
    config.validate().map_err(ArbyError::InvalidConfig)?;
    Ok(config)
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("ARBY - CONFIGURATION CHECK");
    println!("======================================================================");

    let config = match load_config(false) {
        Ok(config) => config,
        Err(e) => {
            println!("CONFIGURATION CHECK FAILED");
            return Err(anyhow::anyhow!(e));
        }
    };

    println!("Configuration Summary:");
    println!("  Pair: {}", config.pair());
    println!("  Margin: {}", config.margin);
    println!("  Live CEX: {}", if config.live_cex { "Enabled" } else { "Disabled" });
    println!(
        "  CEX Credentials: {}",
        if config.cex_api_key.is_some() && config.cex_api_secret.is_some() {
            "present"
        } else {
            "absent"
        }
    );
    println!("  OpenDEX RPC: {}", config.opendex_endpoint());
    println!("  Log File: {}", config.log_file().display());
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run the agent.
async fn cmd_run(live_cex: bool, verbose: bool) -> anyhow::Result<()> {
    let config = load_config(live_cex)?;
    let _log_guard = init_logging(&config, verbose).map_err(ArbyError::Io)?;

    metrics::init_metrics();
    if let Some(port) = config.metrics_port {
        match metrics::install_exporter(port) {
            Ok(()) => info!(port, "Metrics exporter listening"),
            Err(e) => warn!(error = %e, "Failed to start metrics exporter"),
        }
    }

    let shutdown = shutdown_token();
    let arby = Arby::new(DefaultVenues);

    if let Err(e) = arby.start(stream::iter([config]), shutdown).await {
        error!(error = %e, "Arby failed");
        return Err(e.into());
    }

    println!("Shutdown complete. Goodbye, Arby.");
    Ok(())
}
