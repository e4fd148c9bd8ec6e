//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use crate::policy::PolicyMode;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub native: NativeTokenConfig,
    /// Additional tokens, in report column order
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub delays: DelayConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerConfig {
    /// Prefix the transaction signature is appended to
    #[serde(default = "default_explorer_tx_url")]
    pub tx_url: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            tx_url: default_explorer_tx_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NativeTokenConfig {
    #[serde(default = "default_native_symbol")]
    pub symbol: String,
    #[serde(default = "default_native_decimals")]
    pub decimals: u32,
}

impl Default for NativeTokenConfig {
    fn default() -> Self {
        Self {
            symbol: default_native_symbol(),
            decimals: default_native_decimals(),
        }
    }
}

/// An SPL token tracked alongside the native balance
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TokenConfig {
    pub symbol: String,
    pub mint: String,
    pub decimals: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    /// Native-token reserve withheld for the transaction fee (decimal units)
    #[serde(default = "default_fee_buffer")]
    pub fee_buffer: f64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            fee_buffer: default_fee_buffer(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_addresses_file")]
    pub addresses: String,
    #[serde(default = "default_private_keys_file")]
    pub private_keys: String,
    #[serde(default = "default_recipients_file")]
    pub recipients: String,
    #[serde(default = "default_balances_output")]
    pub balances_output: String,
    #[serde(default = "default_transactions_output")]
    pub transactions_output: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            addresses: default_addresses_file(),
            private_keys: default_private_keys_file(),
            recipients: default_recipients_file(),
            balances_output: default_balances_output(),
            transactions_output: default_transactions_output(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelayConfig {
    /// Pause between wallets in balance mode, seconds
    #[serde(default = "default_balance_delay")]
    pub balance_secs: [f64; 2],
    /// Pause between wallets in transfer mode, whole seconds
    #[serde(default = "default_transfer_delay")]
    pub transfer_secs: [u64; 2],
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            balance_secs: default_balance_delay(),
            transfer_secs: default_transfer_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Symbol of the token to move (native symbol or a configured token)
    #[serde(default = "default_native_symbol")]
    pub token: String,
    #[serde(default = "default_true")]
    pub use_all_balance: bool,
    /// Ignored when use_all_balance is set
    #[serde(default = "default_amount_range")]
    pub amount_range: [f64; 2],
    #[serde(default)]
    pub policy: PolicyMode,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            token: default_native_symbol(),
            use_all_balance: true,
            amount_range: default_amount_range(),
            policy: PolicyMode::default(),
        }
    }
}

fn default_rpc_endpoint() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_explorer_tx_url() -> String {
    "https://solscan.io/tx/".to_string()
}

fn default_native_symbol() -> String {
    "SOL".to_string()
}

fn default_native_decimals() -> u32 {
    9
}

fn default_fee_buffer() -> f64 {
    0.000034
}

fn default_addresses_file() -> String {
    "addresses.txt".to_string()
}

fn default_private_keys_file() -> String {
    "private_keys.txt".to_string()
}

fn default_recipients_file() -> String {
    "recipients.txt".to_string()
}

fn default_balances_output() -> String {
    "output/balances.csv".to_string()
}

fn default_transactions_output() -> String {
    "output/transactions.csv".to_string()
}

fn default_balance_delay() -> [f64; 2] {
    [1.0, 5.0]
}

fn default_transfer_delay() -> [u64; 2] {
    [10, 20]
}

fn default_amount_range() -> [f64; 2] {
    [0.001, 0.003]
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(path: &str) -> Result<Self> {
        let path = Path::new(path);

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix BATCHER_)
            .add_source(
                config::Environment::with_prefix("BATCHER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.rpc.endpoint)
            .with_context(|| format!("Invalid rpc.endpoint: {}", self.rpc.endpoint))?;
        url::Url::parse(&self.explorer.tx_url)
            .with_context(|| format!("Invalid explorer.tx_url: {}", self.explorer.tx_url))?;

        if self.native.decimals > 18 {
            anyhow::bail!("native.decimals cannot exceed 18");
        }

        let mut seen = HashSet::new();
        seen.insert(self.native.symbol.as_str());
        for token in &self.tokens {
            if !seen.insert(token.symbol.as_str()) {
                anyhow::bail!("Duplicate token symbol: {}", token.symbol);
            }
            if token.decimals > 18 {
                anyhow::bail!("{}: decimals cannot exceed 18", token.symbol);
            }
            Pubkey::from_str(&token.mint)
                .with_context(|| format!("{}: invalid mint {}", token.symbol, token.mint))?;
        }

        if !(self.fees.fee_buffer >= 0.0) {
            anyhow::bail!("fee_buffer must be non-negative");
        }

        let [min_delay, max_delay] = self.delays.balance_secs;
        if !(min_delay >= 0.0 && min_delay <= max_delay) {
            anyhow::bail!("delays.balance_secs must satisfy 0 <= min <= max");
        }
        let [min_delay, max_delay] = self.delays.transfer_secs;
        if min_delay > max_delay {
            anyhow::bail!("delays.transfer_secs must satisfy min <= max");
        }

        let [min_amount, max_amount] = self.transfer.amount_range;
        if !(min_amount >= 0.0 && min_amount <= max_amount) {
            anyhow::bail!("transfer.amount_range must satisfy 0 <= min <= max");
        }

        if self.token_decimals(&self.transfer.token).is_none() {
            anyhow::bail!(
                "transfer.token {} is neither {} nor a configured token",
                self.transfer.token,
                self.native.symbol
            );
        }

        if self.transfer.policy == PolicyMode::Faithful {
            tracing::warn!(
                "transfer.policy is 'faithful' - amounts are scaled by 10^18 for every token"
            );
        }

        Ok(())
    }

    /// Check whether a symbol names the native token
    pub fn is_native(&self, symbol: &str) -> bool {
        symbol == self.native.symbol
    }

    /// Look up a configured SPL token by symbol
    pub fn token(&self, symbol: &str) -> Option<&TokenConfig> {
        self.tokens.iter().find(|t| t.symbol == symbol)
    }

    /// Decimal count for the native token or any configured token
    pub fn token_decimals(&self, symbol: &str) -> Option<u32> {
        if self.is_native(symbol) {
            Some(self.native.decimals)
        } else {
            self.token(symbol).map(|t| t.decimals)
        }
    }

    /// Balance report column symbols: native first, then configured tokens
    pub fn report_symbols(&self) -> Vec<&str> {
        std::iter::once(self.native.symbol.as_str())
            .chain(self.tokens.iter().map(|t| t.symbol.as_str()))
            .collect()
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let tokens = self
            .tokens
            .iter()
            .map(|t| format!("    {} ({} decimals): {}", t.symbol, t.decimals, t.mint))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    timeout: {}ms
  Explorer:
    tx_url: {}
  Native:
    {} ({} decimals)
  Tokens:
{}
  Fees:
    fee_buffer: {} {}
  Files:
    addresses: {}
    private_keys: {}
    recipients: {}
    balances_output: {}
    transactions_output: {}
  Delays:
    balance: {:?}s
    transfer: {:?}s
  Transfer:
    token: {}
    use_all_balance: {}
    amount_range: {:?}
    policy: {:?}
"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.timeout_ms,
            self.explorer.tx_url,
            self.native.symbol,
            self.native.decimals,
            if tokens.is_empty() { "    (none)".to_string() } else { tokens },
            self.fees.fee_buffer,
            self.native.symbol,
            self.files.addresses,
            self.files.private_keys,
            self.files.recipients,
            self.files.balances_output,
            self.files.transactions_output,
            self.delays.balance_secs,
            self.delays.transfer_secs,
            self.transfer.token,
            self.transfer.use_all_balance,
            self.transfer.amount_range,
            self.transfer.policy,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            explorer: ExplorerConfig::default(),
            native: NativeTokenConfig::default(),
            tokens: vec![],
            fees: FeeConfig::default(),
            files: FilesConfig::default(),
            delays: DelayConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}
