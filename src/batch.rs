//! Batch drivers
//!
//! Load the manifest, walk the wallets strictly one at a time, pause
//! between them, then write the report.
//!
//! Failure handling differs per mode. A failed balance query aborts a
//! balance run and no report is written. In a transfer run every per-wallet
//! failure (balance query, signing, submission) is logged and recorded as
//! [`NO_TRANSACTION`], and the batch moves on.

use std::path::Path;

use tracing::{error, info};

use crate::chain::{ChainClient, TokenBalance, TokenRef, TransferRequest, TxReference};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::manifest::{load_manifest_files, RunMode, WalletRecord};
use crate::pacing::Pacing;
use crate::policy::{TransferDecision, TransferPolicy};
use crate::report::{balances_table, transactions_table, Table, NO_TRANSACTION};

/// Sequential driver over one manifest
pub struct BatchRunner<'a, C: ChainClient + ?Sized> {
    config: &'a Config,
    client: &'a C,
    pacing: Pacing,
}

impl<'a, C: ChainClient + ?Sized> BatchRunner<'a, C> {
    pub fn new(config: &'a Config, client: &'a C, pacing: Pacing) -> Self {
        Self {
            config,
            client,
            pacing,
        }
    }

    /// Check every wallet's balances and save the balances report
    pub async fn check_all_wallets(&mut self) -> Result<Table> {
        let wallets = load_manifest_files(&self.config.files, RunMode::Balance)?;

        info!("Checking balances...");
        let table = self.collect_balances(&wallets).await?;

        let output = &self.config.files.balances_output;
        table.write_csv(Path::new(output))?;
        info!("Balances saved to {}\n{}", output, table.render());

        Ok(table)
    }

    /// Query each wallet in order; the first failure aborts the run
    pub async fn collect_balances(&mut self, wallets: &[WalletRecord]) -> Result<Table> {
        let config = self.config;
        let symbols = config.report_symbols();
        let mut table = balances_table(&symbols);

        for wallet in wallets {
            let balances = self.client.query_balances(wallet).await.map_err(|e| {
                error!("Balance query failed for {}: {}", wallet.address, e);
                e
            })?;

            let mut row = Vec::with_capacity(symbols.len() + 1);
            row.push(wallet.address.clone());
            for symbol in &symbols {
                let amount = balances
                    .get(*symbol)
                    .map(TokenBalance::normalized)
                    .unwrap_or(0.0);
                row.push(amount.to_string());
            }
            info!("{}: {}", wallet.address, row[1..].join(" / "));
            table.push_row(row);

            let delay = self.pacing.balance_delay();
            self.pacing.pause(delay).await;
        }

        Ok(table)
    }

    /// Transfer from every wallet to its recipient and save the
    /// transactions report
    pub async fn transfer_all_wallets(&mut self) -> Result<Table> {
        let wallets = load_manifest_files(&self.config.files, RunMode::Transfer)?;

        let table = self.collect_transfers(&wallets).await?;

        let output = &self.config.files.transactions_output;
        table.write_csv(Path::new(output))?;
        info!("Transactions saved to {}\n{}", output, table.render());

        Ok(table)
    }

    /// Run the transfer policy and submit for each wallet in order
    pub async fn collect_transfers(&mut self, wallets: &[WalletRecord]) -> Result<Table> {
        let policy = TransferPolicy::from_config(self.config)?;
        let token = self.token_ref(&policy)?;
        let mut table = transactions_table();

        for wallet in wallets {
            let link = match self.transfer_wallet(&policy, &token, wallet).await {
                Ok(Some(tx)) => {
                    let link = tx.explorer_link(&self.config.explorer.tx_url);
                    info!("Transaction for {} sent. TX: {}", wallet.address, link);
                    link
                }
                Ok(None) => NO_TRANSACTION.to_string(),
                Err(e) if e.is_per_wallet() => {
                    error!("Error for {}: {}", wallet.address, e);
                    NO_TRANSACTION.to_string()
                }
                Err(e) => return Err(e),
            };
            table.push_row(vec![wallet.address.clone(), link]);

            let delay = self.pacing.transfer_delay();
            self.pacing.pause(delay).await;
        }

        Ok(table)
    }

    /// `Ok(None)` when the policy skips the wallet
    async fn transfer_wallet(
        &mut self,
        policy: &TransferPolicy,
        token: &TokenRef,
        wallet: &WalletRecord,
    ) -> Result<Option<TxReference>> {
        let recipient = wallet
            .recipient
            .as_deref()
            .ok_or_else(|| Error::InvalidAddress(format!("{}: no recipient", wallet.address)))?;

        let balances = self.client.query_balances(wallet).await?;

        let base_units = match policy.decide(&balances, self.pacing.rng()) {
            TransferDecision::Skip(reason) => {
                info!("{}: {}. Skipping account...", wallet.address, reason);
                return Ok(None);
            }
            TransferDecision::Proceed { amount, base_units } => {
                info!(
                    "{}: transferring {} {} ({} base units) to {}",
                    wallet.address,
                    amount,
                    policy.token_symbol(),
                    base_units,
                    recipient
                );
                base_units
            }
        };

        let request = TransferRequest {
            wallet,
            recipient,
            token: token.clone(),
            amount_base_units: base_units,
            fee_budget: policy.fee_budget_base_units(),
            sweep: policy.sweeps_native(),
        };

        self.client.submit_transfer(&request).await.map(Some)
    }

    fn token_ref(&self, policy: &TransferPolicy) -> Result<TokenRef> {
        if policy.is_native_transfer() {
            return Ok(TokenRef::Native);
        }
        let token = self
            .config
            .token(policy.token_symbol())
            .ok_or_else(|| Error::UnknownToken(policy.token_symbol().to_string()))?;
        Ok(TokenRef::Mint {
            mint: token.mint.clone(),
            decimals: token.decimals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Balances;
    use crate::config::{DelayConfig, TokenConfig};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    #[derive(Debug, Clone, PartialEq)]
    struct Submitted {
        from: String,
        to: String,
        token: TokenRef,
        amount: u128,
        fee_budget: u128,
        sweep: bool,
    }

    /// In-memory chain keyed by address
    #[derive(Default)]
    struct MockChain {
        balances: HashMap<String, Balances>,
        unreachable: HashSet<String>,
        rejecting: HashSet<String>,
        queries: Mutex<usize>,
        submitted: Mutex<Vec<Submitted>>,
    }

    impl MockChain {
        fn with_wallet(mut self, address: &str, sol_lamports: u128, usdc_raw: u128) -> Self {
            let mut balances = Balances::new();
            balances.insert("SOL".into(), TokenBalance::new("SOL", sol_lamports, 9));
            balances.insert("USDC".into(), TokenBalance::new("USDC", usdc_raw, 6));
            self.balances.insert(address.to_string(), balances);
            self
        }

        fn submitted(&self) -> Vec<Submitted> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChainClient for MockChain {
        async fn query_balances(&self, wallet: &WalletRecord) -> Result<Balances> {
            *self.queries.lock().unwrap() += 1;
            if self.unreachable.contains(&wallet.address) {
                return Err(Error::Network("connection refused".into()));
            }
            Ok(self
                .balances
                .get(&wallet.address)
                .cloned()
                .unwrap_or_default())
        }

        async fn submit_transfer(&self, request: &TransferRequest<'_>) -> Result<TxReference> {
            if self.rejecting.contains(&request.wallet.address) {
                return Err(Error::Transaction("simulation failed".into()));
            }
            self.submitted.lock().unwrap().push(Submitted {
                from: request.wallet.address.clone(),
                to: request.recipient.to_string(),
                token: request.token.clone(),
                amount: request.amount_base_units,
                fee_budget: request.fee_budget,
                sweep: request.sweep,
            });
            Ok(TxReference(format!("sig-{}", request.wallet.address)))
        }
    }

    /// Config with zero delays and manifest files inside `dir`
    fn test_config(dir: &TempDir) -> Config {
        let path = |name: &str| dir.path().join(name).to_string_lossy().to_string();
        let mut config = Config::default();
        config.tokens.push(TokenConfig {
            symbol: "USDC".to_string(),
            mint: USDC_MINT.to_string(),
            decimals: 6,
        });
        config.delays = DelayConfig {
            balance_secs: [0.0, 0.0],
            transfer_secs: [0, 0],
        };
        config.files.addresses = path("addresses.txt");
        config.files.private_keys = path("private_keys.txt");
        config.files.recipients = path("recipients.txt");
        config.files.balances_output = path("output/balances.csv");
        config.files.transactions_output = path("output/transactions.csv");
        config
    }

    fn write_manifest(dir: &TempDir, addresses: &str, keys: &str, recipients: &str) {
        std::fs::write(dir.path().join("addresses.txt"), addresses).unwrap();
        std::fs::write(dir.path().join("private_keys.txt"), keys).unwrap();
        std::fs::write(dir.path().join("recipients.txt"), recipients).unwrap();
    }

    fn pacing(config: &Config) -> Pacing {
        Pacing::new(config.delays.clone(), Some(1))
    }

    #[tokio::test]
    async fn test_transfer_end_to_end() {
        let dir = tempdir().unwrap();
        write_manifest(&dir, "A1\nA2\n", "K1\nK2\n", "R1\nR2\n");
        let config = test_config(&dir);

        // 0.01 SOL proceeds, 0.00001 SOL is below the 0.000034 fee buffer
        let chain = MockChain::default()
            .with_wallet("A1", 10_000_000, 0)
            .with_wallet("A2", 10_000, 0);

        let mut runner = BatchRunner::new(&config, &chain, pacing(&config));
        let table = runner.transfer_all_wallets().await.unwrap();

        assert_eq!(
            table.rows,
            vec![
                vec!["A1".to_string(), "https://solscan.io/tx/sig-A1".to_string()],
                vec!["A2".to_string(), NO_TRANSACTION.to_string()],
            ]
        );

        assert_eq!(
            chain.submitted(),
            vec![Submitted {
                from: "A1".to_string(),
                to: "R1".to_string(),
                token: TokenRef::Native,
                amount: 9_966_000,
                fee_budget: 34_000,
                sweep: true,
            }]
        );

        let csv = std::fs::read_to_string(&config.files.transactions_output).unwrap();
        assert_eq!(
            csv,
            "Address,Transaction Link\nA1,https://solscan.io/tx/sig-A1\nA2,N/A\n"
        );
    }

    #[tokio::test]
    async fn test_transfer_failures_are_isolated() {
        let dir = tempdir().unwrap();
        write_manifest(&dir, "A1\nA2\nA3\n", "K1\nK2\nK3\n", "R1\nR2\nR3\n");
        let config = test_config(&dir);

        let mut chain = MockChain::default()
            .with_wallet("A1", 10_000_000, 0)
            .with_wallet("A2", 10_000_000, 0)
            .with_wallet("A3", 10_000_000, 0);
        chain.rejecting.insert("A1".to_string());
        chain.unreachable.insert("A2".to_string());

        let mut runner = BatchRunner::new(&config, &chain, pacing(&config));
        let table = runner.transfer_all_wallets().await.unwrap();

        let links: Vec<&str> = table.rows.iter().map(|r| r[1].as_str()).collect();
        assert_eq!(links, vec!["N/A", "N/A", "https://solscan.io/tx/sig-A3"]);
        assert_eq!(chain.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_token_transfer_uses_mint() {
        let dir = tempdir().unwrap();
        write_manifest(&dir, "A1\n", "K1\n", "R1\n");
        let mut config = test_config(&dir);
        config.transfer.token = "USDC".to_string();

        let chain = MockChain::default().with_wallet("A1", 10_000_000, 120_500_000);

        let mut runner = BatchRunner::new(&config, &chain, pacing(&config));
        runner.transfer_all_wallets().await.unwrap();

        let submitted = chain.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(
            submitted[0].token,
            TokenRef::Mint {
                mint: USDC_MINT.to_string(),
                decimals: 6,
            }
        );
        assert_eq!(submitted[0].amount, 120_500_000);
        assert!(!submitted[0].sweep);
    }

    #[tokio::test]
    async fn test_token_use_all_keeps_odd_base_units() {
        let dir = tempdir().unwrap();
        write_manifest(&dir, "A1\n", "K1\n", "R1\n");
        let mut config = test_config(&dir);
        config.transfer.token = "USDC".to_string();

        let chain = MockChain::default().with_wallet("A1", 10_000_000, 249);

        let mut runner = BatchRunner::new(&config, &chain, pacing(&config));
        runner.transfer_all_wallets().await.unwrap();

        assert_eq!(chain.submitted()[0].amount, 249);
    }

    #[tokio::test]
    async fn test_manifest_mismatch_stops_before_chain_access() {
        let dir = tempdir().unwrap();
        write_manifest(&dir, "A1\nA2\n", "K1\nK2\n", "R1\n");
        let config = test_config(&dir);
        let chain = MockChain::default().with_wallet("A1", 10_000_000, 0);

        let mut runner = BatchRunner::new(&config, &chain, pacing(&config));
        let result = runner.transfer_all_wallets().await;

        assert!(matches!(result, Err(Error::ManifestMismatch { .. })));
        assert_eq!(*chain.queries.lock().unwrap(), 0);
        assert!(!Path::new(&config.files.transactions_output).exists());
    }

    #[tokio::test]
    async fn test_balance_report() {
        let dir = tempdir().unwrap();
        // Recipients are not needed for balances, even if counts differ
        write_manifest(&dir, "A1\nA2\n", "K1\nK2\n", "");
        let config = test_config(&dir);

        let chain = MockChain::default()
            .with_wallet("A1", 500_000_000, 120_500_000)
            .with_wallet("A2", 0, 0);

        let mut runner = BatchRunner::new(&config, &chain, pacing(&config));
        let table = runner.check_all_wallets().await.unwrap();

        assert_eq!(table.headers, vec!["Address", "SOL", "USDC"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["A1".to_string(), "0.5".to_string(), "120.5".to_string()],
                vec!["A2".to_string(), "0".to_string(), "0".to_string()],
            ]
        );

        let csv = std::fs::read_to_string(&config.files.balances_output).unwrap();
        assert_eq!(csv, "Address,SOL,USDC\nA1,0.5,120.5\nA2,0,0\n");
    }

    #[tokio::test]
    async fn test_balance_network_error_aborts_without_report() {
        let dir = tempdir().unwrap();
        write_manifest(&dir, "A1\nA2\n", "K1\nK2\n", "");
        let config = test_config(&dir);

        let mut chain = MockChain::default()
            .with_wallet("A1", 500_000_000, 0)
            .with_wallet("A2", 500_000_000, 0);
        chain.unreachable.insert("A1".to_string());

        let mut runner = BatchRunner::new(&config, &chain, pacing(&config));
        let result = runner.check_all_wallets().await;

        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(*chain.queries.lock().unwrap(), 1);
        assert!(!Path::new(&config.files.balances_output).exists());
    }
}
