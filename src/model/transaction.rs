use crate::basis::LotKey;
use crate::model::amount::{Quantity, UsdAmount};
use crate::model::symbol::Symbol;
use crate::util::year_ext::GetYear;
use chrono::{DateTime, Datelike as _, Utc};
use rust_decimal::Decimal;
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Unrecognized transaction action: `{0}`")]
pub struct UnrecognizedActionError(pub String);

/// The economic event a [`Transaction`] describes.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum TxKind {
    Deposit,
    Buy,
    Sell,
    Withdraw,
    /// Seeds an opening position with a known basis.
    Init,
    Mine,
}

impl FromStr for TxKind {
    type Err = UnrecognizedActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEPOSIT" | "DEP" => Ok(Self::Deposit),
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            "WITHDRAW" | "WD" => Ok(Self::Withdraw),
            "INIT" => Ok(Self::Init),
            "MINE" => Ok(Self::Mine),
            _ => Err(UnrecognizedActionError(s.to_string())),
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deposit => "DEPOSIT",
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Withdraw => "WITHDRAW",
            Self::Init => "INIT",
            Self::Mine => "MINE",
        })
    }
}

/// One input event.
///
/// `gross` and `fee` are denominated in `counter_asset` units. They are fiat when the counter
/// asset is fiat, and a quantity of crypto otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub timestamp: DateTime<Utc>,
    pub account: String,
    pub id: String,
    pub kind: TxKind,
    pub trading_pair: String, // informational
    pub asset: Symbol,
    pub counter_asset: Symbol,
    pub gross: Decimal,
    pub quantity: Quantity,
    pub fee: Decimal,
    pub address: Option<String>, // withdrawals only
    pub note: String,
}

/// Enable consistency checks on years.
impl GetYear for Transaction {
    fn get_year(&self) -> i32 {
        self.timestamp.year()
    }
}

impl Transaction {
    /// Lot key of the primary asset in the transaction's own account.
    pub fn key(&self) -> LotKey {
        LotKey::new(&self.account, self.asset.clone())
    }

    pub(crate) fn gross_fiat(&self) -> UsdAmount {
        UsdAmount::new(self.gross)
    }

    pub(crate) fn fee_fiat(&self) -> UsdAmount {
        UsdAmount::new(self.fee)
    }
}
