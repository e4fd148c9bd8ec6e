//! Wallet Batcher - batch balance checks and token transfers
//!
//! # WARNING
//! - Transfer mode moves real funds from every wallet in the manifest.
//! - Private keys are read from plain text files. Keep them out of version
//!   control and restrict their permissions.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use wallet_batcher::cli::commands;
use wallet_batcher::config::Config;
use wallet_batcher::manifest::RunMode;

/// Wallet Batcher - batch balance checks and token transfers
#[derive(Parser)]
#[command(name = "batcher")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Operation to run; prompts with a menu when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check balances of every wallet
    Balances,

    /// Transfer tokens from every wallet to its recipient
    Transfer,

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wallet_batcher=info".parse()?),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // The mode is fixed before any manifest file is read
    let mode = match cli.command {
        Some(Commands::Config) => return commands::show_config(&config),
        Some(Commands::Balances) => RunMode::Balance,
        Some(Commands::Transfer) => RunMode::Transfer,
        None => commands::select_mode()?,
    };

    if let Err(e) = commands::run(&config, mode).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
