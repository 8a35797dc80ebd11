//! Every public error type, in one place.

pub use crate::basis::LedgerError;
pub use crate::imports::ImportError;
pub use crate::model::{AmountError, CheckpointError, ExchangeRatesDbError, PriceError};
pub use crate::model::UnrecognizedActionError;
