//! Transfer amount selection
//!
//! Pure decision logic: given one wallet's balances, decide whether to skip
//! it and, if not, how many base units to send. No network access happens
//! here; randomness comes from the caller's RNG.
//!
//! # Rules
//!
//! 1. The native balance must exceed the fee buffer, whatever token moves.
//! 2. A zero balance of the transferred token is skipped.
//! 3. With `use_all_balance`, native transfers send `balance - fee_buffer`
//!    and token transfers send the whole token balance. In
//!    [`PolicyMode::Corrected`] these amounts are computed on raw base units
//!    so no unit is lost to float rounding.
//! 4. Otherwise an amount is drawn uniformly from `[min, upper]`, where
//!    `upper` depends on the token kind and [`PolicyMode`].

use rand::Rng;
use serde::Deserialize;
use std::fmt;

use crate::chain::Balances;
use crate::config::Config;
use crate::error::{Error, Result};

/// Decimal places used by [`PolicyMode::Faithful`] for every token
pub const FAITHFUL_SCALE_DECIMALS: u32 = 18;

/// Which flavour of the amount rules to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Reproduces the legacy batch script exactly: token ranges are widened
    /// to `max(range_max, balance)` and every amount is scaled by 10^18.
    Faithful,
    /// Token ranges are capped at the balance and amounts are scaled by the
    /// token's own decimals.
    #[default]
    Corrected,
}

/// Why a wallet was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Native balance does not exceed the fee buffer
    InsufficientFeeBalance,
    /// Nothing of the transferred token to send
    ZeroBalance,
    /// Balance is below the lower end of the amount range
    BelowMinimum,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InsufficientFeeBalance => write!(f, "insufficient native balance for fee"),
            SkipReason::ZeroBalance => write!(f, "zero balance"),
            SkipReason::BelowMinimum => write!(f, "below minimum transfer threshold"),
        }
    }
}

/// Outcome of the policy for one wallet
#[derive(Debug, Clone, PartialEq)]
pub enum TransferDecision {
    Skip(SkipReason),
    Proceed {
        /// Amount in decimal units of the transferred token
        amount: f64,
        /// Amount submitted on chain
        base_units: u128,
    },
}

/// Transfer rules resolved against the run configuration
#[derive(Debug, Clone)]
pub struct TransferPolicy {
    native_symbol: String,
    native_decimals: u32,
    token_symbol: String,
    token_decimals: u32,
    fee_buffer: f64,
    use_all_balance: bool,
    amount_range: (f64, f64),
    mode: PolicyMode,
}

impl TransferPolicy {
    /// Resolve the configured transfer token and its decimals
    pub fn from_config(config: &Config) -> Result<Self> {
        let token_symbol = config.transfer.token.clone();
        let token_decimals = config
            .token_decimals(&token_symbol)
            .ok_or_else(|| Error::UnknownToken(token_symbol.clone()))?;
        let [min, max] = config.transfer.amount_range;

        Ok(Self {
            native_symbol: config.native.symbol.clone(),
            native_decimals: config.native.decimals,
            token_symbol,
            token_decimals,
            fee_buffer: config.fees.fee_buffer,
            use_all_balance: config.transfer.use_all_balance,
            amount_range: (min, max),
            mode: config.transfer.policy,
        })
    }

    /// Symbol of the token this policy moves
    pub fn token_symbol(&self) -> &str {
        &self.token_symbol
    }

    pub fn is_native_transfer(&self) -> bool {
        self.token_symbol == self.native_symbol
    }

    /// Whether native use-all transfers should empty the sender, letting the
    /// chain client replace the buffer with the fee it actually quotes
    pub fn sweeps_native(&self) -> bool {
        self.mode == PolicyMode::Corrected && self.use_all_balance && self.is_native_transfer()
    }

    /// Fee ceiling for a submission, in native base units
    pub fn fee_budget_base_units(&self) -> u128 {
        to_base_units(self.fee_buffer, self.native_decimals)
    }

    /// Decide what to do with one wallet.
    ///
    /// A symbol missing from `balances` counts as a zero balance.
    pub fn decide<R: Rng + ?Sized>(&self, balances: &Balances, rng: &mut R) -> TransferDecision {
        let native_balance = self.normalized(balances, &self.native_symbol, self.native_decimals);

        // Fee is always paid in the native token
        if native_balance <= self.fee_buffer {
            return TransferDecision::Skip(SkipReason::InsufficientFeeBalance);
        }

        let (min, max) = self.amount_range;

        let amount = if self.is_native_transfer() {
            if native_balance <= 0.0 {
                return TransferDecision::Skip(SkipReason::ZeroBalance);
            }

            if self.use_all_balance {
                if self.mode == PolicyMode::Corrected {
                    let raw = raw_amount(balances, &self.native_symbol)
                        .saturating_sub(self.fee_budget_base_units());
                    return self.proceed_raw(raw);
                }
                native_balance - self.fee_buffer
            } else {
                if native_balance < min + self.fee_buffer {
                    return TransferDecision::Skip(SkipReason::BelowMinimum);
                }
                let upper = max.min(native_balance - self.fee_buffer);
                draw(rng, min, upper)
            }
        } else {
            let token_balance =
                self.normalized(balances, &self.token_symbol, self.token_decimals);

            if token_balance <= 0.0 {
                return TransferDecision::Skip(SkipReason::ZeroBalance);
            }

            if self.use_all_balance {
                if self.mode == PolicyMode::Corrected {
                    return self.proceed_raw(raw_amount(balances, &self.token_symbol));
                }
                token_balance
            } else {
                if token_balance < min {
                    return TransferDecision::Skip(SkipReason::BelowMinimum);
                }
                let upper = match self.mode {
                    PolicyMode::Faithful => max.max(token_balance),
                    PolicyMode::Corrected => max.min(token_balance),
                };
                draw(rng, min, upper)
            }
        };

        TransferDecision::Proceed {
            amount,
            base_units: to_base_units(amount, self.scale_decimals()),
        }
    }

    /// Proceed with an exact amount already in the token's base units
    fn proceed_raw(&self, base_units: u128) -> TransferDecision {
        TransferDecision::Proceed {
            amount: to_decimal_units(base_units, self.token_decimals),
            base_units,
        }
    }

    fn scale_decimals(&self) -> u32 {
        match self.mode {
            PolicyMode::Faithful => FAITHFUL_SCALE_DECIMALS,
            PolicyMode::Corrected => self.token_decimals,
        }
    }

    fn normalized(&self, balances: &Balances, symbol: &str, decimals: u32) -> f64 {
        to_decimal_units(raw_amount(balances, symbol), decimals)
    }
}

fn raw_amount(balances: &Balances, symbol: &str) -> u128 {
    balances.get(symbol).map(|b| b.raw_amount).unwrap_or(0)
}

/// Uniform draw from `[low, high]`; collapses to `low` when rounding leaves
/// `high` below it.
fn draw<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    if high <= low {
        low
    } else {
        rng.gen_range(low..=high)
    }
}

/// Convert base units to decimal units.
///
/// Parsing `<raw>e-<decimals>` rounds the exact quotient once, where
/// `raw as f64 / 10^d` would round twice for raw amounts above 2^53.
pub fn to_decimal_units(raw: u128, decimals: u32) -> f64 {
    format!("{}e-{}", raw, decimals)
        .parse()
        .unwrap_or_else(|_| raw as f64 / 10f64.powi(decimals as i32))
}

/// Convert decimal units to base units, truncating toward zero.
///
/// Negative amounts yield 0.
pub fn to_base_units(amount: f64, decimals: u32) -> u128 {
    (amount * 10f64.powi(decimals as i32)) as u128
}
