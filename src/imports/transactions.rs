use crate::model::{Quantity, Stats, Symbol, Transaction, TxKind, UnrecognizedActionError};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::{io::Read, path::Path, str::FromStr as _};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV Error")]
    Csv(#[from] csv::Error),

    #[error("FS Error")]
    Fs(#[from] std::io::Error),

    #[error("Line {line}: Unable to parse timestamp `{value}`")]
    DateTime {
        line: u64,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Line {line}: Unable to parse {field} `{value}`")]
    Decimal {
        line: u64,
        field: &'static str,
        value: String,
        #[source]
        source: rust_decimal::Error,
    },

    #[error("Line {line}: Unable to parse transaction kind")]
    Kind {
        line: u64,
        #[source]
        source: UnrecognizedActionError,
    },
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct TransactionCSVRow {
    pub(crate) timestamp: String,
    pub(crate) account: String,
    pub(crate) id: String,
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) pair: String,
    pub(crate) asset: String,
    #[serde(default)]
    pub(crate) counter_asset: String,
    #[serde(default)]
    pub(crate) gross: String,
    #[serde(default)]
    pub(crate) quantity: String,
    #[serde(default)]
    pub(crate) fee: String,
    #[serde(default)]
    pub(crate) address: String,
    #[serde(default)]
    pub(crate) note: String,
}

/// Read a transactions CSV file. Rows are returned in file order.
pub fn read_transactions(
    s: &mut Stats,
    path: impl AsRef<Path>,
) -> Result<Vec<Transaction>, ImportError> {
    let path = path.as_ref();
    debug!("Parsing transactions from {path:?}");

    read_transactions_from_reader(s, std::fs::File::open(path)?)
}

pub fn read_transactions_from_reader<R: Read>(
    s: &mut Stats,
    reader: R,
) -> Result<Vec<Transaction>, ImportError> {
    let mut rows = Vec::new();
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);
        let row: TransactionCSVRow = record.deserialize(Some(&headers))?;
        trace!("Deserialized: {row:?}");

        let tx = transaction_parse(line, row)?;
        trace!("Parsed: {tx:?}");

        rows.push(tx);
        s.inc_transactions();
    }

    Ok(rows)
}

fn transaction_parse(line: u64, row: TransactionCSVRow) -> Result<Transaction, ImportError> {
    let decimal = |field, value: &str| {
        parse_decimal(value).map_err(|source| ImportError::Decimal {
            line,
            field,
            value: value.to_string(),
            source,
        })
    };

    Ok(Transaction {
        timestamp: parse_timestamp(&row.timestamp).map_err(|source| ImportError::DateTime {
            line,
            value: row.timestamp.clone(),
            source,
        })?,
        kind: row
            .kind
            .parse::<TxKind>()
            .map_err(|source| ImportError::Kind { line, source })?,
        gross: decimal("gross", &row.gross)?,
        quantity: Quantity::new(decimal("quantity", &row.quantity)?),
        fee: decimal("fee", &row.fee)?,
        account: row.account,
        id: row.id,
        trading_pair: row.pair,
        asset: Symbol::new(&row.asset),
        counter_asset: Symbol::new(&row.counter_asset),
        address: (!row.address.is_empty()).then_some(row.address),
        note: row.note,
    })
}

/// Timestamps are either `%F %T` in UTC (fractional seconds optional) or RFC 3339.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, "%F %T%.f")
        .map(|datetime| datetime.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|datetime| datetime.with_timezone(&Utc)))
}

/// Empty fields are zero. Scientific notation is accepted.
fn parse_decimal(value: &str) -> Result<Decimal, rust_decimal::Error> {
    if value.is_empty() {
        return Ok(Decimal::ZERO);
    }

    Decimal::from_str(value).or_else(|err| {
        if value.contains(['e', 'E']) {
            Decimal::from_scientific(value)
        } else {
            Err(err)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;
    use rust_decimal_macros::dec;
    use similar_asserts::assert_eq;
    use tracing_test::traced_test;

    const HEADER: &str =
        "timestamp,account,id,kind,pair,asset,counter_asset,gross,quantity,fee,address,note\n";

    fn read(rows: &str) -> Result<Vec<Transaction>, ImportError> {
        let mut stats = Stats::default();
        let data = format!("{HEADER}{rows}");

        read_transactions_from_reader(&mut stats, data.as_bytes())
    }

    #[test]
    #[traced_test]
    fn test_read_transactions() {
        let _ = tracing_log::LogTracer::init();

        let mut stats = Stats::default();
        let data = format!(
            "{HEADER}\
            # Opening position\n\
            2017-01-01 00:00:00,coinbase,seed-1,INIT,BTCUSD,btc,USD,5000,1.0,,,carried over\n\
            2018-06-01T12:30:00-04:00, coinbase , 42 ,wd,,BTC,,,0.25,0.0001,bc1qdest,\n\
            2018-06-02 08:00:00.5,gdax,43,SELL,ETHBTC,ETH,BTC,0.5,10,1e-3,,\n"
        );
        let rows = read_transactions_from_reader(&mut stats, data.as_bytes()).unwrap();
        assert_eq!(stats.transactions(), 3);

        let expected = Transaction {
            timestamp: Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap(),
            account: "coinbase".to_string(),
            id: "seed-1".to_string(),
            kind: TxKind::Init,
            trading_pair: "BTCUSD".to_string(),
            asset: Symbol::new("BTC"),
            counter_asset: Symbol::new("USD"),
            gross: dec!(5000),
            quantity: Quantity::new(dec!(1.0)),
            fee: Decimal::ZERO,
            address: None,
            note: "carried over".to_string(),
        };
        assert_eq!(rows[0], expected);

        assert_eq!(
            rows[1].timestamp,
            Utc.with_ymd_and_hms(2018, 6, 1, 16, 30, 0).unwrap()
        );
        assert_eq!(rows[1].account, "coinbase");
        assert_eq!(rows[1].kind, TxKind::Withdraw);
        assert_eq!(rows[1].gross, Decimal::ZERO);
        assert_eq!(rows[1].address.as_deref(), Some("bc1qdest"));

        assert_eq!(rows[2].fee, dec!(0.001));
        assert_eq!(rows[2].counter_asset, Symbol::new("BTC"));
    }

    #[test]
    fn test_unknown_kind() {
        let err = read("2018-01-01 00:00:00,a,1,STAKE,,BTC,USD,1,1,0,,\n").unwrap_err();

        assert!(matches!(err, ImportError::Kind { line: 2, ref source } if source.0 == "STAKE"));
    }

    #[test]
    fn test_bad_fields() {
        let err = read("2018-01-01 00:00:00,a,1,BUY,,BTC,USD,lots,1,0,,\n").unwrap_err();
        assert!(matches!(
            err,
            ImportError::Decimal {
                line: 2,
                field: "gross",
                ..
            }
        ));

        let err = read("01/02/2018,a,1,BUY,,BTC,USD,1,1,0,,\n").unwrap_err();
        assert!(matches!(err, ImportError::DateTime { line: 2, .. }));
    }
}
