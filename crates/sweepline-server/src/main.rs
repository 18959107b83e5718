//! Sweepline CLI
//!
//! Starts the sweep service, or runs a single sweep with `--once`.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use sweepline_server::{config::ServerConfig, run_once, start_server};
use tracing_subscriber::EnvFilter;

/// Sweepline - retention sweeps for realtime-database trees.
#[derive(Debug, Parser)]
#[command(name = "sweepline")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "SWEEPLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Report what would be deleted without deleting
    #[arg(long)]
    dry_run: bool,

    /// Run one sweep, print the report as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.config.is_none() {
        tracing::warn!("No config file specified, using the built-in roots and environment");
    }

    let mut config = ServerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.dry_run {
        config.janitor.dry_run = true;
    }
    config.validate().context("validating configuration")?;

    if cli.once {
        let outcome = run_once(&config).await?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    start_server(config).await?;
    Ok(())
}
