//! Error types for the batch runner

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the batch runner
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Unknown token: {0}")]
    UnknownToken(String),

    // Manifest errors
    #[error("Manifest mismatch: {left} has {left_count} entries, {right} has {right_count}")]
    ManifestMismatch {
        left: &'static str,
        left_count: usize,
        right: &'static str,
        right_count: usize,
    },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    // Chain errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    // Output errors
    #[error("Report error: {0}")]
    Report(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Check if this error only concerns a single wallet.
    ///
    /// A transfer batch records these as failed rows and moves on; anything
    /// else aborts the run.
    pub fn is_per_wallet(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::Transaction(_)
                | Error::InvalidAddress(_)
                | Error::InvalidKeypair(_)
        )
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Network(e.to_string())
    }
}

// Conversion from csv errors
impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Report(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
