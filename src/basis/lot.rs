use crate::model::{Quantity, Symbol, UsdAmount};
use crate::util::{fifo::Dated, HasSplit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one pool of lots: an asset held in one account.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct LotKey {
    pub account: String,
    pub asset: Symbol,
}

impl LotKey {
    pub fn new(account: impl Into<String>, asset: Symbol) -> Self {
        Self {
            account: account.into(),
            asset,
        }
    }
}

impl fmt::Display for LotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.account, self.asset)
    }
}

/// An open acquisition: what is left of one purchase, seed, or mining reward.
///
/// `gross` and `fee` are totals for the remaining `quantity`, in fiat.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Lot {
    pub date: DateTime<Utc>,
    pub quantity: Quantity,
    pub gross: UsdAmount,
    pub fee: UsdAmount,
}

impl Dated for Lot {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

impl Lot {
    /// Split off `take_quantity`, which must be positive and less than `self.quantity`.
    ///
    /// Gross and fee are divided in proportion to quantity. The remainder gets whatever the taken
    /// part did not, so the two halves always add back up to the original lot.
    pub(crate) fn split(self, take_quantity: Quantity) -> HasSplit<Lot> {
        debug_assert!(Quantity::ZERO < take_quantity && take_quantity < self.quantity);

        let fraction = take_quantity.ratio(self.quantity);
        let take = Lot {
            date: self.date,
            quantity: take_quantity,
            gross: self.gross.scale(fraction),
            fee: self.fee.scale(fraction),
        };
        let leave = Lot {
            date: self.date,
            quantity: self.quantity - take.quantity,
            gross: self.gross - take.gross,
            fee: self.fee - take.fee,
        };

        HasSplit { take, leave }
    }
}

/// Sums over every open lot, across all keys.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LotTotals {
    pub quantity: Quantity,
    pub gross: UsdAmount,
    pub fee: UsdAmount,
}

impl<'a> FromIterator<&'a Lot> for LotTotals {
    fn from_iter<T: IntoIterator<Item = &'a Lot>>(iter: T) -> Self {
        iter.into_iter().fold(Self::default(), |mut acc, lot| {
            acc.quantity += lot.quantity;
            acc.gross += lot.gross;
            acc.fee += lot.fee;
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;
    use rust_decimal_macros::dec;

    #[test]
    fn test_split_is_proportional() {
        let date = Utc.with_ymd_and_hms(2018, 2, 1, 0, 0, 0).unwrap();
        let lot = Lot {
            date,
            quantity: Quantity::new(dec!(0.5)),
            gross: UsdAmount::new(dec!(2500)),
            fee: UsdAmount::new(dec!(10)),
        };

        let HasSplit { take, leave } = lot.split(Quantity::new(dec!(0.2)));

        assert_eq!(take.date, date);
        assert_eq!(take.quantity, Quantity::new(dec!(0.2)));
        assert_eq!(take.gross, UsdAmount::new(dec!(1000)));
        assert_eq!(take.fee, UsdAmount::new(dec!(4)));

        assert_eq!(leave.date, date);
        assert_eq!(leave.quantity, Quantity::new(dec!(0.3)));
        assert_eq!(leave.gross, UsdAmount::new(dec!(1500)));
        assert_eq!(leave.fee, UsdAmount::new(dec!(6)));
    }

    #[test]
    fn test_split_conserves_awkward_fractions() {
        let lot = Lot {
            date: Utc.with_ymd_and_hms(2018, 2, 1, 0, 0, 0).unwrap(),
            quantity: Quantity::new(dec!(0.3)),
            gross: UsdAmount::new(dec!(100)),
            fee: UsdAmount::new(dec!(1)),
        };

        let HasSplit { take, leave } = lot.split(Quantity::new(dec!(0.1)));

        assert_eq!(take.gross + leave.gross, UsdAmount::new(dec!(100)));
        assert_eq!(take.fee + leave.fee, UsdAmount::new(dec!(1)));
        assert!(take.gross.is_fuzzy_eq(UsdAmount::new(dec!(33.333333333))));
    }

    #[test]
    fn test_key_display() {
        let key = LotKey::new("coinbase", Symbol::new("btc"));
        assert_eq!(key.to_string(), "coinbase~BTC");
    }
}
