use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::{fmt, iter::Sum, str::FromStr};
use thiserror::Error;

/// Digits printed for fiat values in worksheets.
pub(crate) const FIAT_DIGITS: u32 = 4;

/// Digits printed for asset quantities in worksheets.
pub(crate) const QUANTITY_DIGITS: u32 = 10;

/// Since we can't ensure that all arithmetic has infinite precision, we need an epsilon for
/// comparisons. This is smaller than any fiat precision written to a worksheet.
const USD_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 7);

#[derive(Debug, Error)]
pub enum AmountError {
    /// Unable to parse decimal string.
    #[error("Unable to parse decimal string")]
    Decimal(#[from] rust_decimal::Error),
}

/// An amount of some asset, in that asset's own units.
#[derive(
    Copy, Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct Quantity(Decimal);

/// A fiat value. All basis, proceeds and fees are tracked in this unit.
#[derive(
    Copy, Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct UsdAmount(Decimal);

macro_rules! impl_math_ops {
    ($name:ident) => {
        impl ::std::ops::Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl ::std::ops::AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl ::std::ops::Neg for $name {
            type Output = Self;

            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl ::std::ops::Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl ::std::ops::SubAssign for $name {
            fn sub_assign(&mut self, rhs: Self) {
                self.0 -= rhs.0;
            }
        }

        impl<'a> Sum<&'a $name> for $name {
            fn sum<I: Iterator<Item = &'a $name>>(iter: I) -> Self {
                iter.fold(Self::ZERO, |acc, x| acc + *x)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = $name>>(iter: I) -> Self {
                iter.fold(Self::ZERO, |acc, x| acc + x)
            }
        }

        impl From<Decimal> for $name {
            fn from(value: Decimal) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = AmountError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl $name {
            pub const ZERO: Self = Self(Decimal::ZERO);

            pub const fn new(value: Decimal) -> Self {
                Self(value)
            }

            pub fn to_decimal(self) -> Decimal {
                self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.is_zero()
            }

            pub fn is_sign_negative(&self) -> bool {
                self.0.is_sign_negative() && !self.0.is_zero()
            }

            /// Scale this amount by a fraction in `[0, 1]`.
            pub(crate) fn scale(self, fraction: Decimal) -> Self {
                Self(self.0 * fraction)
            }

            pub fn is_fuzzy_eq(self, other: Self) -> bool {
                (self.0 - other.0).abs() < USD_EPSILON
            }
        }
    };
}

impl_math_ops!(Quantity);
impl_math_ops!(UsdAmount);

impl Quantity {
    /// The fraction of `whole` represented by `self`.
    ///
    /// `whole` must be non-zero; lots never hold a zero quantity.
    pub(crate) fn ratio(self, whole: Quantity) -> Decimal {
        self.0 / whole.0
    }

    /// Fiat value of this quantity at the given unit price.
    pub fn value_at(self, price: UsdAmount) -> UsdAmount {
        UsdAmount(self.0 * price.0)
    }
}

impl UsdAmount {
    /// The share of `self` attributable to `part` out of `whole`.
    ///
    /// Multiplies before dividing to keep the most precision.
    pub(crate) fn pro_rata(self, part: Quantity, whole: Quantity) -> Self {
        Self(self.0 * part.0 / whole.0)
    }
}

impl fmt::Display for UsdAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Banker's rounding at the worksheet precision. Internal values keep full precision, so
        // sums of printed values may differ from printed sums in the last digit.
        let amount = self
            .0
            .round_dp_with_strategy(FIAT_DIGITS, RoundingStrategy::MidpointNearestEven);

        write!(f, "{amount:.precision$}", precision = FIAT_DIGITS as usize)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let amount = self
            .0
            .round_dp_with_strategy(QUANTITY_DIGITS, RoundingStrategy::MidpointNearestEven)
            .normalize();

        write!(f, "{amount}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbtest::arbtest;
    use rust_decimal_macros::dec;
    use tracing_test::traced_test;

    #[test]
    fn test_display_rounding() {
        assert_eq!(UsdAmount::new(dec!(1142.857142857)).to_string(), "1142.8571");
        assert_eq!(UsdAmount::new(dec!(0.00005)).to_string(), "0.0000");
        assert_eq!(UsdAmount::new(dec!(0.00015)).to_string(), "0.0002");
        assert_eq!(UsdAmount::new(dec!(10)).to_string(), "10.0000");

        assert_eq!(Quantity::new(dec!(0.50000)).to_string(), "0.5");
        assert_eq!(Quantity::new(dec!(12)).to_string(), "12");
    }

    #[test]
    fn test_negative_zero_is_not_negative() {
        assert!(!Quantity::new(-Decimal::ZERO).is_sign_negative());
        assert!(Quantity::new(dec!(-0.1)).is_sign_negative());
    }

    #[test]
    #[traced_test]
    fn prop_test_pro_rata_parts_sum_to_whole() {
        arbtest(|u| {
            let whole = Quantity::new(Decimal::new(u.int_in_range(1..=10_000_000_000)?, 8));
            let part = Quantity::new(Decimal::new(
                u.int_in_range(0..=whole.to_decimal().mantissa() as i64)?,
                8,
            ));
            let value = UsdAmount::new(Decimal::new(u.int_in_range(0..=100_000_000_000)?, 2));

            let taken = value.pro_rata(part, whole);
            let left = value.pro_rata(whole - part, whole);

            assert!(
                (taken + left).is_fuzzy_eq(value),
                "{taken} + {left} != {value}"
            );
            assert!(!taken.is_sign_negative());

            Ok(())
        });
    }
}
