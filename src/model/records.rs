use crate::basis::LotKey;
use crate::model::amount::{Quantity, UsdAmount};
use chrono::{DateTime, Months, Utc};
use std::fmt;

/// Holding period classification of a realized gain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GainTerm {
    /// Held one year or less.
    Short,
    /// Held more than one year.
    Long,
}

impl fmt::Display for GainTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Short => "Short",
            Self::Long => "Long",
        })
    }
}

/// One disposal matched against one lot (or against nothing, with zero basis).
#[derive(Clone, Debug, PartialEq)]
pub struct GainRecord {
    pub acquired: DateTime<Utc>,
    pub sold: DateTime<Utc>,
    pub key: LotKey,
    pub quantity: Quantity,
    pub proceeds: UsdAmount,
    pub fee_sale: UsdAmount,
    pub basis: UsdAmount,
    pub fee_purchase: UsdAmount,
}

impl GainRecord {
    /// Net capital gain (negative for a loss). Both fees reduce the gain.
    pub fn gain(&self) -> UsdAmount {
        self.proceeds - self.fee_sale - self.basis - self.fee_purchase
    }

    pub fn term(&self) -> GainTerm {
        match self.acquired.checked_add_months(Months::new(12)) {
            Some(one_year) if self.sold > one_year => GainTerm::Long,
            Some(_) => GainTerm::Short,
            // Only reachable at the end of chrono's range, which is certainly more than a year.
            None => GainTerm::Long,
        }
    }
}

/// Income received by mining, valued on the date of receipt.
#[derive(Clone, Debug, PartialEq)]
pub struct IncomeRecord {
    pub date: DateTime<Utc>,
    pub key: LotKey,
    pub quantity: Quantity,
    pub gross: UsdAmount,
    pub fee: UsdAmount,
}
