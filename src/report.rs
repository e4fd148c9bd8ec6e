//! Tabular run reports
//!
//! Reports are written as CSV. The same table can be rendered as aligned
//! text with every column sized to its widest cell plus two.

use std::path::Path;

use tracing::info;

use crate::error::Result;

/// Marker written when a wallet produced no transaction
pub const NO_TRANSACTION: &str = "N/A";

/// A header row plus data rows of equal width
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column widths: longest cell (header included) plus two
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(len),
                    None => widths.push(len),
                }
            }
        }
        widths.into_iter().map(|w| w + 2).collect()
    }

    /// Render as left-aligned, auto-sized text columns
    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let mut out = String::new();

        for row in std::iter::once(&self.headers).chain(self.rows.iter()) {
            let line = row
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
                .collect::<String>();
            out.push_str(line.trim_end());
            out.push('\n');
        }

        out
    }

    /// Write as CSV, creating parent directories
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        info!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

/// Balance table: `Address`, native symbol, then each configured token
pub fn balances_table(symbols: &[&str]) -> Table {
    Table::new(std::iter::once("Address").chain(symbols.iter().copied()))
}

/// Transaction table: `Address`, `Transaction Link`
pub fn transactions_table() -> Table {
    Table::new(["Address", "Transaction Link"])
}
