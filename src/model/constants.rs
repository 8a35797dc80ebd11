/// Fiat currency all basis is tracked in, unless configured otherwise.
pub const DEFAULT_FIAT: &str = "USD";

/// Default reporting year. Disposals with no matching lot are dated January 1 of this year.
pub const DEFAULT_YEAR: i32 = 1900;

/// Unit prices used by `FixedPrices::default()`.
pub const DEFAULT_FIXED_PRICES: &[(&str, i64)] = &[("BTC", 6000), ("ETH", 600)];
