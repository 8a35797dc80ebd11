pub use self::address::{AddressBook, AddressResolver};
pub use self::amount::{AmountError, Quantity, UsdAmount};
pub use self::checkpoint::{CheckpointError, CheckpointHeader, LotsCheckpoint};
pub use self::exchange_rate::{ExchangeRates, ExchangeRatesDbError, FixedPrices};
pub use self::exchange_rate::{PriceError, PriceOracle};
pub use self::gains::{GainsWorksheet, IncomeWorksheet, LotsWorksheet, Sums};
pub use self::records::{GainRecord, GainTerm, IncomeRecord};
pub use self::stats::Stats;
pub use self::symbol::Symbol;
pub use self::transaction::{Transaction, TxKind, UnrecognizedActionError};

pub(crate) mod address;
pub(crate) mod amount;
pub(crate) mod checkpoint;
pub mod constants;
pub(crate) mod exchange_rate;
mod gains;
pub(crate) mod records;
mod stats;
pub(crate) mod symbol;
pub(crate) mod transaction;
