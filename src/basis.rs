//! FIFO lot tracking: the ledger, its lots, and the problems it reports.

pub use self::diagnostics::{CheckList, Diagnostic};
pub use self::ledger::{Ledger, LedgerConfig, LedgerError, MiningValuation};
pub use self::lot::{Lot, LotKey, LotTotals};

mod diagnostics;
mod ledger;
mod lot;
