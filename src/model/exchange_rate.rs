use crate::model::{amount::UsdAmount, constants, symbol::Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::{ffi::OsStr, fs, path::Path};
use thiserror::Error;
use tracing::{debug, warn};

/// Exchange rate lookup failures.
#[cfg_attr(test, derive(Eq, PartialEq))]
#[derive(Clone, Debug, Error)]
pub enum PriceError {
    #[error("DateTime {1} does not exist for {0}")]
    NotFound(Symbol, DateTime<Utc>),

    #[error("Price of {0} at {1} is not positive")]
    NonPositive(Symbol, DateTime<Utc>),
}

#[derive(Debug, Error)]
pub enum ExchangeRatesDbError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("RON parsing error")]
    Parse(#[from] ron::de::SpannedError),

    #[error("DB has an invalid aggregation granularity")]
    InvalidGranularity,
}

/// Source of fiat unit prices for crypto-for-crypto trades and mining income.
///
/// Implementations must be deterministic for a given `(symbol, datetime)` within one run.
pub trait PriceOracle {
    fn price(&self, symbol: &Symbol, datetime: DateTime<Utc>) -> Result<UsdAmount, PriceError>;
}

impl<T: PriceOracle + ?Sized> PriceOracle for &T {
    fn price(&self, symbol: &Symbol, datetime: DateTime<Utc>) -> Result<UsdAmount, PriceError> {
        (**self).price(symbol, datetime)
    }
}

impl<T: PriceOracle + ?Sized> PriceOracle for Box<T> {
    fn price(&self, symbol: &Symbol, datetime: DateTime<Utc>) -> Result<UsdAmount, PriceError> {
        (**self).price(symbol, datetime)
    }
}

/// A price table that ignores the date.
#[derive(Clone, Debug)]
pub struct FixedPrices {
    prices: HashMap<Symbol, UsdAmount>,
}

impl Default for FixedPrices {
    fn default() -> Self {
        constants::DEFAULT_FIXED_PRICES
            .iter()
            .map(|(symbol, price)| (Symbol::new(symbol), UsdAmount::new(Decimal::from(*price))))
            .collect()
    }
}

impl FromIterator<(Symbol, UsdAmount)> for FixedPrices {
    fn from_iter<T: IntoIterator<Item = (Symbol, UsdAmount)>>(iter: T) -> Self {
        Self {
            prices: iter.into_iter().collect(),
        }
    }
}

impl FixedPrices {
    pub fn insert(&mut self, symbol: Symbol, price: UsdAmount) -> Option<UsdAmount> {
        self.prices.insert(symbol, price)
    }
}

impl PriceOracle for FixedPrices {
    fn price(&self, symbol: &Symbol, datetime: DateTime<Utc>) -> Result<UsdAmount, PriceError> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| PriceError::NotFound(symbol.clone(), datetime))
    }
}

pub type ExchangeRateMap = BTreeMap<u64, UsdAmount>;

/// Exchange rates database: one `BTreeMap` of timestamp to fiat rate per symbol.
#[derive(Debug)]
pub struct ExchangeRates {
    /// Timestamp granularity.
    ///
    /// Must be equal to the interval between each timestamp in the keys, minus 1 second.
    granularity: u64,

    rates: HashMap<Symbol, ExchangeRateMap>,
}

impl ExchangeRates {
    /// Create an ExchangeRates DB from the given directory path.
    ///
    /// Every `*.ron` file whose stem ends in `-<symbol><fiat>` (e.g. `2018-btcusd.ron`) is loaded
    /// under `<symbol>`. Other files are ignored.
    pub fn new<P>(path: P, fiat: &Symbol) -> Result<Self, ExchangeRatesDbError>
    where
        P: AsRef<Path>,
    {
        let suffix = fiat.as_str().to_ascii_lowercase();
        let mut rates = HashMap::<Symbol, ExchangeRateMap>::new();

        for entry in fs::read_dir(path.as_ref())? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() && path.extension() == Some(OsStr::new("ron")) {
                let name = match path.file_stem().and_then(OsStr::to_str) {
                    Some(name) => name,
                    None => continue,
                };
                let symbol = match name
                    .rsplit('-')
                    .next()
                    .and_then(|pair| pair.strip_suffix(suffix.as_str()))
                {
                    Some(symbol) if !symbol.is_empty() => Symbol::new(symbol),
                    _ => continue,
                };

                debug!("Reading {symbol} exchange rates from {path:?}");
                rates.entry(symbol).or_default().extend(read_ron(&path)?);
            }
        }

        if rates.is_empty() {
            warn!("No exchange rates found");
        }

        Self::from_rates(rates)
    }

    /// Create an ExchangeRates DB from rates already in memory.
    pub fn from_rates(
        rates: HashMap<Symbol, ExchangeRateMap>,
    ) -> Result<Self, ExchangeRatesDbError> {
        let mut granularity = 0;
        for map in rates.values() {
            granularity = check_granularity(map, granularity)?;
        }

        if granularity == 0 {
            Err(ExchangeRatesDbError::InvalidGranularity)
        } else {
            // Patch the detected granularity to make lower-bound searches exclusive
            Ok(Self {
                granularity: granularity - 1,
                rates,
            })
        }
    }

    pub fn get(&self, symbol: &Symbol, datetime: DateTime<Utc>) -> Result<UsdAmount, PriceError> {
        let not_found = || PriceError::NotFound(symbol.clone(), datetime);
        let end = u64::try_from(datetime.timestamp()).map_err(|_| not_found())?;
        let start = end.saturating_sub(self.granularity);

        self.rates
            .get(symbol)
            .and_then(|map| map.range(start..=end).next_back())
            .map(|(_k, v)| *v)
            .ok_or_else(not_found)
    }
}

impl PriceOracle for ExchangeRates {
    fn price(&self, symbol: &Symbol, datetime: DateTime<Utc>) -> Result<UsdAmount, PriceError> {
        self.get(symbol, datetime)
    }
}

fn read_ron(path: &Path) -> Result<ExchangeRateMap, ExchangeRatesDbError> {
    let data = fs::read_to_string(path)?;
    let rates = ron::from_str::<ExchangeRateMap>(&data)?;

    Ok(rates)
}

fn check_granularity(map: &ExchangeRateMap, granularity: u64) -> Result<u64, ExchangeRatesDbError> {
    map.keys()
        .try_fold((0, granularity), |(acc, granularity), timestamp| {
            if acc == 0 || timestamp - acc == granularity {
                Some((*timestamp, granularity))
            } else if granularity == 0 {
                Some((*timestamp, timestamp - acc))
            } else {
                None
            }
        })
        .map(|(_, granularity)| granularity)
        .ok_or(ExchangeRatesDbError::InvalidGranularity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ONE_DAY: u64 = 60 * 60 * 24;

    fn btc_rates() -> ExchangeRates {
        let btc = ExchangeRateMap::from([
            (1514764800, UsdAmount::new(dec!(13444.88))), // 2018-01-01
            (1514851200, UsdAmount::new(dec!(14754.13))), // 2018-01-02
            (1514937600, UsdAmount::new(dec!(15156.62))), // 2018-01-03
        ]);

        ExchangeRates::from_rates(HashMap::from([(Symbol::new("BTC"), btc)])).unwrap()
    }

    #[test]
    fn test_exchange_rates() {
        let exchange_rates = btc_rates();
        let btc = Symbol::new("BTC");
        assert_eq!(exchange_rates.granularity, ONE_DAY - 1);

        let datetime = "2018-01-01 13:42:00+0000".parse().unwrap();
        let actual = exchange_rates.get(&btc, datetime);
        assert_eq!(actual, Ok(UsdAmount::new(dec!(13444.88))));

        // Bounds checks; in bounds
        let datetime = "2018-01-02 00:00:00+0000".parse().unwrap();
        let actual = exchange_rates.get(&btc, datetime);
        assert_eq!(actual, Ok(UsdAmount::new(dec!(14754.13))));

        let datetime = "2018-01-03 23:59:59+0000".parse().unwrap();
        let actual = exchange_rates.get(&btc, datetime);
        assert_eq!(actual, Ok(UsdAmount::new(dec!(15156.62))));

        // Bounds checks; out of bounds
        let datetime = "2017-12-31 23:59:59+0000".parse().unwrap();
        let actual = exchange_rates.get(&btc, datetime);
        assert_eq!(actual, Err(PriceError::NotFound(btc.clone(), datetime)));

        let datetime = "2018-01-04 00:00:00+0000".parse().unwrap();
        let actual = exchange_rates.get(&btc, datetime);
        assert_eq!(actual, Err(PriceError::NotFound(btc, datetime)));

        // Unknown symbol
        let eth = Symbol::new("ETH");
        let actual = exchange_rates.get(&eth, datetime);
        assert_eq!(actual, Err(PriceError::NotFound(eth, datetime)));
    }

    #[test]
    fn test_mismatched_granularity() {
        let start = 1514764800;
        let one = UsdAmount::new(dec!(1));
        let btc = ExchangeRateMap::from([(start, one), (start + ONE_DAY, one)]);
        let eth = ExchangeRateMap::from([(start, one), (start + 3600, one)]);
        let rates = HashMap::from([(Symbol::new("BTC"), btc), (Symbol::new("ETH"), eth)]);

        assert!(matches!(
            ExchangeRates::from_rates(rates),
            Err(ExchangeRatesDbError::InvalidGranularity)
        ));
    }

    #[test]
    fn test_load_directory() {
        let dir = std::env::temp_dir().join(format!("lotledger-rates-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("2018-ethusd.ron"),
            r#"{ 1514764800: "772.64", 1514851200: "884.44" }"#,
        )
        .unwrap();
        fs::write(dir.join("2018-ethbtc.ron"), r#"{ 1514764800: "0.05" }"#).unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let exchange_rates = ExchangeRates::new(&dir, &Symbol::new("USD")).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        let datetime = "2018-01-02 08:00:00+0000".parse().unwrap();
        let actual = exchange_rates.price(&Symbol::new("eth"), datetime);
        assert_eq!(actual, Ok(UsdAmount::new(dec!(884.44))));
        assert_eq!(exchange_rates.rates.len(), 1);
    }

    #[test]
    fn test_fixed_prices() {
        let prices = FixedPrices::default();
        let datetime = "2018-06-01 00:00:00+0000".parse().unwrap();

        let btc = Symbol::new("BTC");
        assert_eq!(prices.price(&btc, datetime), Ok(UsdAmount::new(dec!(6000))));

        let doge = Symbol::new("DOGE");
        let expected = Err(PriceError::NotFound(doge.clone(), datetime));
        assert_eq!(prices.price(&doge, datetime), expected);
    }
}
