//! Wallet manifest loading
//!
//! A manifest is three line-oriented files (addresses, private keys,
//! recipients) whose lines pair up by position. Blank lines are dropped and
//! every value is trimmed before counting.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::{info, warn};

use crate::config::FilesConfig;
use crate::error::{Error, Result};

/// Which batch the manifest is being loaded for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Check balances; recipients are read but ignored
    Balance,
    /// Transfer tokens; every wallet needs a recipient
    Transfer,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Balance => write!(f, "balance"),
            RunMode::Transfer => write!(f, "transfer"),
        }
    }
}

/// One wallet of the batch
#[derive(Clone, PartialEq, Eq)]
pub struct WalletRecord {
    pub address: String,
    pub private_key: String,
    /// Always `None` in balance mode
    pub recipient: Option<String>,
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("address", &self.address)
            .field("private_key", &"***")
            .field("recipient", &self.recipient)
            .finish()
    }
}

/// Split file contents into trimmed, non-blank lines
fn data_lines(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Build wallet records from the contents of the three manifest files.
///
/// Fails with [`Error::ManifestMismatch`] before producing anything if the
/// address and key counts differ, or in transfer mode if the key and
/// recipient counts differ.
///
/// A repeated address replaces the earlier record's key and recipient but
/// keeps the earlier position.
pub fn load_manifest(
    addresses: &str,
    private_keys: &str,
    recipients: &str,
    mode: RunMode,
) -> Result<Vec<WalletRecord>> {
    let addresses = data_lines(addresses);
    let private_keys = data_lines(private_keys);
    let recipients = data_lines(recipients);

    if addresses.len() != private_keys.len() {
        return Err(Error::ManifestMismatch {
            left: "addresses",
            left_count: addresses.len(),
            right: "private keys",
            right_count: private_keys.len(),
        });
    }

    if mode == RunMode::Transfer && private_keys.len() != recipients.len() {
        return Err(Error::ManifestMismatch {
            left: "private keys",
            left_count: private_keys.len(),
            right: "recipients",
            right_count: recipients.len(),
        });
    }

    let mut records: Vec<WalletRecord> = Vec::with_capacity(addresses.len());
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for (i, (&address, &private_key)) in addresses.iter().zip(&private_keys).enumerate() {
        let record = WalletRecord {
            address: address.to_string(),
            private_key: private_key.to_string(),
            recipient: match mode {
                RunMode::Transfer => Some(recipients[i].to_string()),
                RunMode::Balance => None,
            },
        };

        match positions.get(address) {
            Some(&pos) => {
                warn!(
                    "Duplicate address {} on line {}; replacing earlier entry",
                    address,
                    i + 1
                );
                records[pos] = record;
            }
            None => {
                positions.insert(address, records.len());
                records.push(record);
            }
        }
    }

    Ok(records)
}

/// Read the manifest files named in the configuration.
///
/// The recipients file must exist even in balance mode.
pub fn load_manifest_files(files: &FilesConfig, mode: RunMode) -> Result<Vec<WalletRecord>> {
    let addresses = read_source(&files.addresses)?;
    let private_keys = read_source(&files.private_keys)?;
    let recipients = read_source(&files.recipients)?;

    let records = load_manifest(&addresses, &private_keys, &recipients, mode)?;
    info!("Loaded {} wallets for {} mode", records.len(), mode);

    Ok(records)
}

fn read_source(path: &str) -> Result<String> {
    std::fs::read_to_string(Path::new(path))
        .map_err(|e| Error::Io(format!("Failed to read {}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_positional_pairing_in_file_order() {
        let records = load_manifest(
            "A1\nA2\nA3\n",
            "K1\nK2\nK3\n",
            "R1\nR2\nR3\n",
            RunMode::Transfer,
        )
        .unwrap();

        assert_eq!(records.len(), 3);
        for (i, record) in records.iter().enumerate() {
            let n = i + 1;
            assert_eq!(record.address, format!("A{n}"));
            assert_eq!(record.private_key, format!("K{n}"));
            assert_eq!(record.recipient.as_deref(), Some(format!("R{n}").as_str()));
        }
    }

    #[test]
    fn test_blank_lines_and_whitespace_ignored() {
        let records = load_manifest(
            "  A1  \n\nA2\n   \nA3",
            "K1\nK2\n\nK3\n",
            "\nR1\nR2\nR3\n\n",
            RunMode::Transfer,
        )
        .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].address, "A1");
        assert_eq!(records[2].private_key, "K3");
        assert_eq!(records[0].recipient.as_deref(), Some("R1"));
    }

    #[test]
    fn test_address_key_mismatch() {
        let result = load_manifest("A1\nA2\n", "K1\n", "R1\nR2\n", RunMode::Balance);
        assert!(matches!(
            result,
            Err(Error::ManifestMismatch {
                left: "addresses",
                left_count: 2,
                right: "private keys",
                right_count: 1,
            })
        ));
    }

    #[test]
    fn test_recipient_mismatch_only_matters_for_transfer() {
        let result = load_manifest("A1\nA2\n", "K1\nK2\n", "R1\n", RunMode::Transfer);
        assert!(matches!(
            result,
            Err(Error::ManifestMismatch {
                left: "private keys",
                right: "recipients",
                ..
            })
        ));

        let records = load_manifest("A1\nA2\n", "K1\nK2\n", "R1\n", RunMode::Balance).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.recipient.is_none()));
    }

    #[test]
    fn test_address_check_runs_first() {
        // Both pairs disagree; the address/key comparison is reported
        let result = load_manifest("A1\n", "K1\nK2\n", "", RunMode::Transfer);
        assert!(matches!(
            result,
            Err(Error::ManifestMismatch { left: "addresses", .. })
        ));
    }

    #[test]
    fn test_duplicate_address_last_write_wins() {
        let records = load_manifest(
            "A1\nA2\nA1\n",
            "K1\nK2\nK3\n",
            "R1\nR2\nR3\n",
            RunMode::Transfer,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].address, "A1");
        assert_eq!(records[0].private_key, "K3");
        assert_eq!(records[0].recipient.as_deref(), Some("R3"));
        assert_eq!(records[1].address, "A2");
    }

    #[test]
    fn test_debug_hides_private_key() {
        let record = WalletRecord {
            address: "A1".to_string(),
            private_key: "super-secret".to_string(),
            recipient: None,
        };
        let debug = format!("{:?}", record);
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempdir().unwrap();
        let path = |name: &str| dir.path().join(name).to_string_lossy().to_string();

        std::fs::write(path("addresses.txt"), "A1\n\nA2\n").unwrap();
        std::fs::write(path("keys.txt"), "K1\nK2\n").unwrap();
        std::fs::write(path("recipients.txt"), "").unwrap();

        let files = FilesConfig {
            addresses: path("addresses.txt"),
            private_keys: path("keys.txt"),
            recipients: path("recipients.txt"),
            balances_output: path("balances.csv"),
            transactions_output: path("transactions.csv"),
        };

        let records = load_manifest_files(&files, RunMode::Balance).unwrap();
        assert_eq!(records.len(), 2);

        let result = load_manifest_files(&files, RunMode::Transfer);
        assert!(matches!(result, Err(Error::ManifestMismatch { .. })));
    }

    #[test]
    fn test_missing_recipients_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = |name: &str| dir.path().join(name).to_string_lossy().to_string();

        std::fs::write(path("addresses.txt"), "A1\n").unwrap();
        std::fs::write(path("keys.txt"), "K1\n").unwrap();

        let files = FilesConfig {
            addresses: path("addresses.txt"),
            private_keys: path("keys.txt"),
            recipients: path("missing.txt"),
            balances_output: path("balances.csv"),
            transactions_output: path("transactions.csv"),
        };

        assert!(matches!(
            load_manifest_files(&files, RunMode::Balance),
            Err(Error::Io(_))
        ));
    }
}
