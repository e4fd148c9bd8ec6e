//! Chain access
//!
//! The batch drivers only talk to the chain through [`ChainClient`], so the
//! policy and drivers can be exercised against an in-memory double.
//!
//! ```text
//! BatchRunner ──► ChainClient ──► SolanaChainClient (RPC + signing)
//! ```

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::manifest::WalletRecord;
use crate::policy::to_decimal_units;

pub mod solana;

pub use solana::SolanaChainClient;

/// One token balance as reported by the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub symbol: String,
    /// Balance in base units
    pub raw_amount: u128,
    pub decimals: u32,
}

impl TokenBalance {
    pub fn new(symbol: impl Into<String>, raw_amount: u128, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            raw_amount,
            decimals,
        }
    }

    /// Human-readable amount (`raw / 10^decimals`)
    pub fn normalized(&self) -> f64 {
        to_decimal_units(self.raw_amount, self.decimals)
    }
}

/// Balances of one wallet, keyed by token symbol
pub type Balances = HashMap<String, TokenBalance>;

/// Which asset a transfer moves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRef {
    /// The chain's fee-paying asset
    Native,
    /// An SPL token
    Mint { mint: String, decimals: u32 },
}

/// Everything needed to submit one transfer
#[derive(Debug, Clone)]
pub struct TransferRequest<'a> {
    pub wallet: &'a WalletRecord,
    pub recipient: &'a str,
    pub token: TokenRef,
    pub amount_base_units: u128,
    /// Highest network fee the sender accepts, native base units
    pub fee_budget: u128,
    /// Native transfers only: send the whole balance minus the actual fee,
    /// leaving the sender at zero
    pub sweep: bool,
}

/// Reference to a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReference(pub String);

impl TxReference {
    /// Block-explorer link for this transaction
    pub fn explorer_link(&self, tx_url: &str) -> String {
        format!("{}{}", tx_url, self.0)
    }
}

impl std::fmt::Display for TxReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Balance queries and transfer submission for one wallet at a time
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Native balance plus every configured token.
    ///
    /// Fails with `Error::Network` when the node cannot be reached.
    async fn query_balances(&self, wallet: &WalletRecord) -> Result<Balances>;

    /// Sign and submit a transfer, returning once it is confirmed.
    ///
    /// Fails with `Error::Transaction` when submission or execution fails.
    async fn submit_transfer(&self, request: &TransferRequest<'_>) -> Result<TxReference>;
}
