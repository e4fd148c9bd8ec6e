//! CLI command implementations

use anyhow::{Context, Result};
use dialoguer::Select;
use tracing::{info, warn};

use crate::batch::BatchRunner;
use crate::chain::SolanaChainClient;
use crate::config::Config;
use crate::manifest::RunMode;
use crate::pacing::Pacing;

/// Menu entries, in display order
const MENU: [(&str, RunMode); 2] = [
    ("Check balances", RunMode::Balance),
    ("Transfer tokens", RunMode::Transfer),
];

/// Ask the operator which batch to run
pub fn select_mode() -> Result<RunMode> {
    let labels: Vec<&str> = MENU.iter().map(|(label, _)| *label).collect();

    let choice = Select::new()
        .with_prompt("Select operation mode")
        .items(&labels)
        .default(0)
        .interact()
        .context("Failed to read menu selection")?;

    Ok(MENU[choice].1)
}

/// Run the batch for the chosen mode
pub async fn run(config: &Config, mode: RunMode) -> Result<()> {
    match mode {
        RunMode::Balance => check_balances(config).await,
        RunMode::Transfer => transfer_tokens(config).await,
    }
}

/// Check and record balances of every wallet
pub async fn check_balances(config: &Config) -> Result<()> {
    let client = SolanaChainClient::from_config(config)?;
    let mut runner = BatchRunner::new(config, &client, Pacing::from_entropy(config.delays.clone()));

    let table = runner
        .check_all_wallets()
        .await
        .context("Balance check aborted")?;

    if table.is_empty() {
        warn!("No wallets in {}", config.files.addresses);
    } else {
        info!("Checked {} wallets", table.len());
    }
    Ok(())
}

/// Transfer from every wallet to its paired recipient
pub async fn transfer_tokens(config: &Config) -> Result<()> {
    info!(
        "Transferring {} (use_all_balance: {}, policy: {:?})",
        config.transfer.token, config.transfer.use_all_balance, config.transfer.policy
    );

    let client = SolanaChainClient::from_config(config)?;
    let mut runner = BatchRunner::new(config, &client, Pacing::from_entropy(config.delays.clone()));

    let table = runner
        .transfer_all_wallets()
        .await
        .context("Transfer batch aborted")?;

    let sent = table
        .rows
        .iter()
        .filter(|row| row[1] != crate::report::NO_TRANSACTION)
        .count();
    info!("Sent {} of {} transfers", sent, table.len());
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
