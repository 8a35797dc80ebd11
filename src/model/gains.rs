use crate::basis::{Ledger, Lot, LotKey, LotTotals};
use crate::model::address::AddressResolver;
use crate::model::amount::UsdAmount;
use crate::model::exchange_rate::PriceOracle;
use crate::model::records::{GainRecord, GainTerm, IncomeRecord};
use crate::util::fifo::FIFO;
use std::collections::BTreeMap;
use std::fmt::{self, Display};

const DATE_FORMAT: &str = "%F %T %Z";

/// Realized gains, one row per matched lot fragment.
#[derive(Debug)]
pub struct GainsWorksheet<'a> {
    gains: &'a [GainRecord],
}

/// Mining income, one row per reward.
#[derive(Debug)]
pub struct IncomeWorksheet<'a> {
    income: &'a [IncomeRecord],
}

/// Lots still open at the end of the run.
#[derive(Debug)]
pub struct LotsWorksheet<'a> {
    lots: &'a BTreeMap<LotKey, FIFO<Lot>>,
}

#[derive(Debug)]
pub struct Sums {
    ledger_proceeds: UsdAmount,
    short: TermSums,
    long: TermSums,
    income: UsdAmount,
    open: LotTotals,
}

/// Per-term columns in the sums worksheet.
#[derive(Debug, Default)]
struct TermSums {
    proceeds: UsdAmount,
    basis: UsdAmount,
    fees: UsdAmount,
    gain: UsdAmount,
}

/// A CSV field with embedded quotes escaped.
struct Quoted<'a, T>(&'a T);

impl<T: Display> Display for Quoted<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#""{}""#, self.0.to_string().replace('"', r#""""#))
    }
}

impl<'a> GainsWorksheet<'a> {
    pub fn new(gains: &'a [GainRecord]) -> Self {
        Self { gains }
    }
}

impl<'a> IncomeWorksheet<'a> {
    pub fn new(income: &'a [IncomeRecord]) -> Self {
        Self { income }
    }
}

impl<'a> LotsWorksheet<'a> {
    pub fn new(lots: &'a BTreeMap<LotKey, FIFO<Lot>>) -> Self {
        Self { lots }
    }
}

impl Display for GainsWorksheet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Write the CSV header
        writeln!(
            f,
            concat!(
                // Columns A-D
                r#""Date Acquired","Date Sold","Description","Quantity","#,
                // Columns E-H
                r#""Proceeds","Sale Fee","Basis","Purchase Fee","#,
                // Columns I-J
                r#""Term","Gain""#,
            )
        )?;

        // Write CSV rows
        for gain in self.gains {
            // Columns A-D
            write!(
                f,
                r#""{acquired}","{sold}",{key},"{quantity}","#,
                acquired = gain.acquired.format(DATE_FORMAT),
                sold = gain.sold.format(DATE_FORMAT),
                key = Quoted(&gain.key),
                quantity = gain.quantity,
            )?;
            // Columns E-H
            write!(
                f,
                r#""{proceeds}","{fee_sale}","{basis}","{fee_purchase}","#,
                proceeds = gain.proceeds,
                fee_sale = gain.fee_sale,
                basis = gain.basis,
                fee_purchase = gain.fee_purchase,
            )?;
            // Columns I-J
            writeln!(
                f,
                r#""{term}","{gain}""#,
                term = gain.term(),
                gain = gain.gain(),
            )?;
        }

        Ok(())
    }
}

impl Display for IncomeWorksheet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, r#""Date","Description","Quantity","Gross","Fee""#)?;

        for income in self.income {
            writeln!(
                f,
                r#""{date}",{key},"{quantity}","{gross}","{fee}""#,
                date = income.date.format(DATE_FORMAT),
                key = Quoted(&income.key),
                quantity = income.quantity,
                gross = income.gross,
                fee = income.fee,
            )?;
        }

        Ok(())
    }
}

impl Display for LotsWorksheet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, r#""Description","Date Acquired","Quantity","Basis","Fee""#)?;

        for (key, lots) in self.lots {
            for lot in lots {
                writeln!(
                    f,
                    r#"{key},"{date}","{quantity}","{gross}","{fee}""#,
                    key = Quoted(key),
                    date = lot.date.format(DATE_FORMAT),
                    quantity = lot.quantity,
                    gross = lot.gross,
                    fee = lot.fee,
                )?;
            }
        }

        Ok(())
    }
}

impl Sums {
    pub fn new<P: PriceOracle, R: AddressResolver>(ledger: &Ledger<P, R>) -> Self {
        let mut short = TermSums::default();
        let mut long = TermSums::default();

        for gain in ledger.gains() {
            let sums = match gain.term() {
                GainTerm::Short => &mut short,
                GainTerm::Long => &mut long,
            };
            sums.proceeds += gain.proceeds;
            sums.basis += gain.basis;
            sums.fees += gain.fee_sale + gain.fee_purchase;
            sums.gain += gain.gain();
        }

        Self {
            ledger_proceeds: ledger.total_proceeds(),
            short,
            long,
            income: ledger.income().iter().map(|income| income.gross).sum(),
            open: ledger.total_open_lots(),
        }
    }

    /// Assert that the per-term proceeds add up to the ledger total (within EPSILON tolerance).
    pub fn assert_error_check(&self) {
        let proceeds = self.short.proceeds + self.long.proceeds;

        assert!(
            self.ledger_proceeds.is_fuzzy_eq(proceeds),
            "Expected {ledger_proceeds} ~= {proceeds}",
            ledger_proceeds = self.ledger_proceeds,
        );
    }
}

impl Display for Sums {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Write the CSV header
        writeln!(f, r#""","Long Term","Short Term""#)?;

        let rows = [
            ("Proceeds", self.long.proceeds, self.short.proceeds),
            ("Basis", self.long.basis, self.short.basis),
            ("Fees", self.long.fees, self.short.fees),
            ("Gain", self.long.gain, self.short.gain),
        ];
        for (name, long, short) in rows {
            writeln!(f, r#""{name}","{long}","{short}""#)?;
        }

        writeln!(f, r#""Mining Income","{}","""#, self.income)?;
        writeln!(f, r#""Open Lot Basis","{}","""#, self.open.gross)?;
        writeln!(f, r#""Open Lot Fees","{}","""#, self.open.fee)?;

        Ok(())
    }
}
