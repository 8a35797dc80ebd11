use crate::basis::LotKey;
use crate::model::{Quantity, UsdAmount};
use chrono::{DateTime, Utc};
use std::fmt::{self, Display};
use thiserror::Error;

/// A data-integrity problem that was contained within one transaction.
///
/// The ledger keeps going after each of these, but the numbers it produced for that transaction
/// need a human to look at them.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Diagnostic {
    /// A disposal had no acquisition history. It was recorded with zero basis.
    #[error("{key}: No lots to match disposal of {quantity} on {date} (proceeds {proceeds}), basis set to zero")]
    UnmatchedDisposal {
        key: LotKey,
        date: DateTime<Utc>,
        quantity: Quantity,
        proceeds: UsdAmount,
    },

    /// A withdrawal destination could not be resolved. The transaction was dropped.
    #[error("Tx {txid}: Withdrawal address `{address}` is not known, transaction dropped")]
    UnknownAddress { txid: String, address: String },

    /// A withdrawal moved more than the source account held.
    #[error("Tx {txid}: {key} is short {missing} for withdrawal")]
    WithdrawalShortfall {
        txid: String,
        key: LotKey,
        missing: Quantity,
    },

    /// Transactions were supplied out of chronological order.
    #[error("Tx {txid}: Timestamp {timestamp} is earlier than the previous transaction at {previous}")]
    OutOfOrder {
        txid: String,
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
}

impl Diagnostic {
    /// Exceptions are disposals whose real basis is unknown.
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::UnmatchedDisposal { .. })
    }
}

/// Printable summary of every diagnostic raised by a ledger.
pub struct CheckList<'a> {
    diagnostics: &'a [Diagnostic],
}

impl<'a> CheckList<'a> {
    pub fn new(diagnostics: &'a [Diagnostic]) -> Self {
        Self { diagnostics }
    }

    pub fn is_passing(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl Display for CheckList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ledger CheckList")?;
        writeln!(f, "====== =========")?;
        writeln!(f)?;

        if self.is_passing() {
            writeln!(f, "No issues detected! 🎉")?;
        } else {
            for diagnostic in self.diagnostics {
                let marker = if diagnostic.is_exception() { "❌" } else { "⚠️" };
                writeln!(f, "{marker} {diagnostic}")?;
            }
        }

        Ok(())
    }
}
