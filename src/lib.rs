//! Wallet Batcher Library
//!
//! Batch balance checks and token transfers across many Solana wallets,
//! processed one at a time with randomized pacing.

pub mod batch;
pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod pacing;
pub mod policy;
pub mod report;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
