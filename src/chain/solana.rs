//! Solana implementation of [`ChainClient`]
//!
//! Native balances are account lamports; token balances are read from the
//! owner's associated token account, which counts as empty when it does not
//! exist yet.
//!
//! The runtime rejects a transaction that leaves the fee payer with fewer
//! lamports than the rent-exempt minimum, unless it ends at exactly zero.
//! Submissions are checked against that rule before signing, including the
//! rent for a recipient token account that has to be created.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    instruction::Instruction,
    message::Message,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    system_instruction,
    transaction::Transaction,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use super::{Balances, ChainClient, TokenBalance, TokenRef, TransferRequest, TxReference};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::manifest::WalletRecord;

/// SPL token resolved from configuration
#[derive(Debug, Clone)]
struct TrackedToken {
    symbol: String,
    mint: Pubkey,
    decimals: u32,
}

/// Chain client backed by a Solana JSON-RPC node
pub struct SolanaChainClient {
    rpc: RpcClient,
    native_symbol: String,
    native_decimals: u32,
    tokens: Vec<TrackedToken>,
}

impl SolanaChainClient {
    /// Create a client for the configured endpoint and token set
    pub fn from_config(config: &Config) -> Result<Self> {
        let rpc = RpcClient::new_with_timeout(
            config.rpc.endpoint.clone(),
            Duration::from_millis(config.rpc.timeout_ms),
        );

        let tokens = config
            .tokens
            .iter()
            .map(|t| {
                Ok(TrackedToken {
                    symbol: t.symbol.clone(),
                    mint: parse_pubkey(&t.mint)?,
                    decimals: t.decimals,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rpc,
            native_symbol: config.native.symbol.clone(),
            native_decimals: config.native.decimals,
            tokens,
        })
    }

    /// Raw amount held in a token account, 0 if the account is missing
    async fn token_account_amount(&self, account: &Pubkey) -> Result<u64> {
        let response = self
            .rpc
            .get_account_with_commitment(account, self.rpc.commitment())
            .await?;

        match response.value {
            Some(acc) => spl_token::state::Account::unpack(&acc.data)
                .map(|state| state.amount)
                .map_err(|e| Error::Network(format!("Malformed token account {}: {}", account, e))),
            None => Ok(0),
        }
    }

    /// Rent the payer owes for creating the recipient's token account, 0 if
    /// it already exists
    async fn recipient_account_rent(&self, recipient: &Pubkey, mint: &str) -> Result<u64> {
        let destination = get_associated_token_address(recipient, &parse_pubkey(mint)?);
        let existing = self
            .rpc
            .get_account_with_commitment(&destination, self.rpc.commitment())
            .await?
            .value;

        if existing.is_some() {
            return Ok(0);
        }
        Ok(self
            .rpc
            .get_minimum_balance_for_rent_exemption(spl_token::state::Account::LEN)
            .await?)
    }

    fn transfer_instructions(
        payer: &Pubkey,
        recipient: &Pubkey,
        token: &TokenRef,
        amount: u64,
    ) -> Result<Vec<Instruction>> {
        match token {
            TokenRef::Native => Ok(vec![system_instruction::transfer(payer, recipient, amount)]),
            TokenRef::Mint { mint, decimals } => {
                let mint = parse_pubkey(mint)?;
                let decimals = u8::try_from(*decimals)
                    .map_err(|_| Error::Transaction(format!("Invalid decimals: {}", decimals)))?;
                let source = get_associated_token_address(payer, &mint);
                let destination = get_associated_token_address(recipient, &mint);

                let transfer = spl_token::instruction::transfer_checked(
                    &spl_token::id(),
                    &source,
                    &mint,
                    &destination,
                    payer,
                    &[],
                    amount,
                    decimals,
                )
                .map_err(|e| Error::Transaction(format!("Failed to build transfer: {}", e)))?;

                Ok(vec![
                    create_associated_token_account_idempotent(
                        payer,
                        recipient,
                        &mint,
                        &spl_token::id(),
                    ),
                    transfer,
                ])
            }
        }
    }
}

#[async_trait]
impl ChainClient for SolanaChainClient {
    async fn query_balances(&self, wallet: &WalletRecord) -> Result<Balances> {
        let owner = parse_pubkey(&wallet.address)?;
        let mut balances = Balances::new();

        let lamports = self.rpc.get_balance(&owner).await?;
        balances.insert(
            self.native_symbol.clone(),
            TokenBalance::new(&self.native_symbol, lamports as u128, self.native_decimals),
        );

        for token in &self.tokens {
            let ata = get_associated_token_address(&owner, &token.mint);
            let amount = self.token_account_amount(&ata).await?;
            balances.insert(
                token.symbol.clone(),
                TokenBalance::new(&token.symbol, amount as u128, token.decimals),
            );
        }

        Ok(balances)
    }

    async fn submit_transfer(&self, request: &TransferRequest<'_>) -> Result<TxReference> {
        let keypair = signer_for(request.wallet)?;
        let payer = keypair.pubkey();
        let recipient = parse_pubkey(request.recipient)?;
        let amount = u64::try_from(request.amount_base_units).map_err(|_| {
            Error::Transaction(format!(
                "Amount {} exceeds the token program limit",
                request.amount_base_units
            ))
        })?;

        debug!(
            "Executing transfer: {} base units of {:?} from {} to {}",
            amount, request.token, payer, recipient
        );

        let instructions = Self::transfer_instructions(&payer, &recipient, &request.token, amount)?;

        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| Error::Transaction(format!("Failed to get blockhash: {}", e)))?;

        let mut message = Message::new_with_blockhash(&instructions, Some(&payer), &blockhash);

        let fee = self
            .rpc
            .get_fee_for_message(&message)
            .await
            .map_err(|e| Error::Transaction(format!("Failed to quote fee: {}", e)))?;
        if fee as u128 > request.fee_budget {
            return Err(Error::Transaction(format!(
                "Fee {} exceeds budget {}",
                fee, request.fee_budget
            )));
        }

        let balance = self.rpc.get_balance(&payer).await?;
        let rent_floor = self.rpc.get_minimum_balance_for_rent_exemption(0).await?;

        match &request.token {
            TokenRef::Native => {
                let send = native_send_amount(balance, amount, fee, rent_floor, request.sweep)?;
                if send != amount {
                    debug!("Sweeping {} lamports from {}", send, payer);
                    // Same signer set, so the quoted fee still applies
                    let instructions =
                        Self::transfer_instructions(&payer, &recipient, &request.token, send)?;
                    message = Message::new_with_blockhash(&instructions, Some(&payer), &blockhash);
                }
            }
            TokenRef::Mint { mint, .. } => {
                let account_rent = self.recipient_account_rent(&recipient, mint).await?;
                check_payer_remainder(balance, fee.saturating_add(account_rent), rent_floor)?;
            }
        }

        let transaction = Transaction::new(&[&keypair], message, blockhash);

        let signature = self
            .rpc
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| Error::Transaction(format!("Transfer failed: {}", e)))?;

        Ok(TxReference(signature.to_string()))
    }
}

/// Lamports a native transfer actually moves.
///
/// A sweep sends everything left after the fee. Otherwise the requested
/// amount is kept and the payer's remainder must be valid.
fn native_send_amount(
    balance: u64,
    requested: u64,
    fee: u64,
    rent_floor: u64,
    sweep: bool,
) -> Result<u64> {
    if sweep {
        return match balance.checked_sub(fee) {
            Some(send) if send > 0 => Ok(send),
            _ => Err(Error::Transaction(format!(
                "Balance {} does not cover fee {}",
                balance, fee
            ))),
        };
    }
    check_payer_remainder(balance, requested.saturating_add(fee), rent_floor)?;
    Ok(requested)
}

/// The payer must end at zero or at least at the rent-exempt minimum
fn check_payer_remainder(balance: u64, spent: u64, rent_floor: u64) -> Result<()> {
    let remainder = balance.checked_sub(spent).ok_or_else(|| {
        Error::Transaction(format!(
            "Balance {} does not cover {} lamports of transfer, fee and rent",
            balance, spent
        ))
    })?;

    if remainder > 0 && remainder < rent_floor {
        return Err(Error::Transaction(format!(
            "Payer would keep {} lamports, below the rent-exempt minimum {}",
            remainder, rent_floor
        )));
    }
    Ok(())
}

fn parse_pubkey(value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).map_err(|e| Error::InvalidAddress(format!("{}: {}", value, e)))
}

/// Parse a secret key line: base58 (64-byte keypair) or a JSON byte array
pub fn parse_keypair(secret: &str) -> Result<Keypair> {
    let bytes: Vec<u8> = if secret.starts_with('[') {
        serde_json::from_str(secret)
            .map_err(|e| Error::InvalidKeypair(format!("Malformed JSON key: {}", e)))?
    } else {
        bs58::decode(secret)
            .into_vec()
            .map_err(|e| Error::InvalidKeypair(format!("Malformed base58 key: {}", e)))?
    };

    Keypair::from_bytes(&bytes).map_err(|e| Error::InvalidKeypair(e.to_string()))
}

/// Keypair for a wallet, checked against its address
fn signer_for(wallet: &WalletRecord) -> Result<Keypair> {
    let keypair = parse_keypair(&wallet.private_key)?;
    if keypair.pubkey().to_string() != wallet.address {
        return Err(Error::InvalidKeypair(format!(
            "Key does not belong to {}",
            wallet.address
        )));
    }
    Ok(keypair)
}
