use crate::basis::{CheckList, Diagnostic, Lot, LotKey, LotTotals};
use crate::model::{constants, AddressResolver, GainRecord, IncomeRecord, PriceError, PriceOracle};
use crate::model::{Quantity, Symbol, Transaction, TxKind, UsdAmount};
use crate::util::fifo::FIFO;
use chrono::{DateTime, TimeZone as _, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

#[cfg(test)]
mod prop_tests;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Tx {txid}: Negative {field} is not supported")]
    NegativeAmount { txid: String, field: &'static str },

    #[error("Tx {txid}: {kind} cannot apply to the fiat currency {asset}")]
    FiatAsset {
        txid: String,
        kind: TxKind,
        asset: Symbol,
    },

    #[error("Tx {txid}: INIT must be denominated in fiat, found {counter_asset}")]
    InitCounterAsset { txid: String, counter_asset: Symbol },

    #[error("Tx {txid}: Price lookup failed")]
    Price {
        txid: String,
        #[source]
        source: PriceError,
    },
}

/// How mined coins are valued on receipt.
///
/// The historical tool computed `quantity + price`, which disagrees with how every other fiat
/// value is derived. `Product` is the default; `LegacySum` exists to reconcile old reports.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MiningValuation {
    /// `quantity * price`
    #[default]
    Product,
    /// `quantity + price`
    LegacySum,
}

impl MiningValuation {
    pub fn value(self, quantity: Quantity, price: UsdAmount) -> UsdAmount {
        match self {
            Self::Product => quantity.value_at(price),
            Self::LegacySum => UsdAmount::new(quantity.to_decimal() + price.to_decimal()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Disposals with no matching lot are treated as acquired on January 1 of this year.
    pub year: i32,
    /// The only currency basis is tracked in.
    pub fiat: Symbol,
    pub mining_valuation: MiningValuation,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            year: constants::DEFAULT_YEAR,
            fiat: Symbol::new(constants::DEFAULT_FIAT),
            mining_valuation: MiningValuation::default(),
        }
    }
}

impl LedgerConfig {
    pub(crate) fn fallback_date(&self) -> DateTime<Utc> {
        // Years outside chrono's range clamp to its minimum.
        Utc.with_ymd_and_hms(self.year, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// FIFO tax-lot ledger.
///
/// Feed it transactions in chronological order with [`Ledger::add_transaction`], then read the
/// realized gains, mining income, and remaining open lots.
pub struct Ledger<P, R> {
    config: LedgerConfig,
    prices: P,
    addresses: R,
    lots: BTreeMap<LotKey, FIFO<Lot>>,
    gains: Vec<GainRecord>,
    income: Vec<IncomeRecord>,
    diagnostics: Vec<Diagnostic>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl<P: PriceOracle, R: AddressResolver> Ledger<P, R> {
    pub fn new(config: LedgerConfig, prices: P, addresses: R) -> Self {
        Self {
            config,
            prices,
            addresses,
            lots: BTreeMap::new(),
            gains: Vec::new(),
            income: Vec::new(),
            diagnostics: Vec::new(),
            last_timestamp: None,
        }
    }

    /// Create a ledger that starts with the given open lots, e.g. from a checkpoint.
    ///
    /// Lots with a zero or negative quantity are discarded.
    pub fn with_lots<I>(config: LedgerConfig, prices: P, addresses: R, lots: I) -> Self
    where
        I: IntoIterator<Item = (LotKey, Lot)>,
    {
        let mut ledger = Self::new(config, prices, addresses);
        for (key, lot) in lots {
            if lot.quantity <= Quantity::ZERO {
                warn!("Discarding empty lot for {key} acquired {}", lot.date);
                continue;
            }
            ledger.lots.entry(key).or_default().push(lot);
        }

        ledger
    }

    /// Apply one transaction.
    ///
    /// Errors reject the whole transaction and leave the ledger untouched. Problems that only
    /// affect part of the data (missing lots, unknown addresses) are recorded as diagnostics
    /// instead.
    pub fn add_transaction(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        trace!("Adding transaction: {tx:?}");
        self.validate(tx)?;

        match tx.kind {
            TxKind::Buy | TxKind::Sell => self.trade(tx)?,
            TxKind::Deposit => self.deposit(tx),
            TxKind::Withdraw => self.withdraw(tx),
            TxKind::Init => self.init(tx),
            TxKind::Mine => self.mine(tx)?,
        }
        self.check_order(tx);

        Ok(())
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn gains(&self) -> &[GainRecord] {
        &self.gains
    }

    pub fn income(&self) -> &[IncomeRecord] {
        &self.income
    }

    /// Every open lot, keyed by account and asset, oldest first.
    pub fn open_lots(&self) -> &BTreeMap<LotKey, FIFO<Lot>> {
        &self.lots
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Disposals that found no lots and were given zero basis.
    pub fn exceptions(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_exception())
    }

    pub fn checklist(&self) -> CheckList<'_> {
        CheckList::new(&self.diagnostics)
    }

    pub fn total_proceeds(&self) -> UsdAmount {
        self.gains.iter().map(|gain| gain.proceeds).sum()
    }

    pub fn total_basis(&self) -> UsdAmount {
        self.gains.iter().map(|gain| gain.basis).sum()
    }

    pub fn total_open_lots(&self) -> LotTotals {
        self.lots.values().flatten().collect()
    }

    fn is_fiat(&self, symbol: &Symbol) -> bool {
        *symbol == self.config.fiat
    }

    fn validate(&self, tx: &Transaction) -> Result<(), LedgerError> {
        let negative = |field| LedgerError::NegativeAmount {
            txid: tx.id.clone(),
            field,
        };
        if tx.quantity.is_sign_negative() {
            return Err(negative("quantity"));
        }
        if tx.gross.is_sign_negative() && !tx.gross.is_zero() {
            return Err(negative("gross"));
        }
        if tx.fee.is_sign_negative() && !tx.fee.is_zero() {
            return Err(negative("fee"));
        }

        match tx.kind {
            TxKind::Buy | TxKind::Sell | TxKind::Init | TxKind::Mine if self.is_fiat(&tx.asset) => {
                Err(LedgerError::FiatAsset {
                    txid: tx.id.clone(),
                    kind: tx.kind,
                    asset: tx.asset.clone(),
                })
            }
            TxKind::Init if !self.is_fiat(&tx.counter_asset) => {
                Err(LedgerError::InitCounterAsset {
                    txid: tx.id.clone(),
                    counter_asset: tx.counter_asset.clone(),
                })
            }
            TxKind::Sell if tx.fee > tx.gross && !self.is_fiat(&tx.counter_asset) => {
                Err(negative("gross - fee"))
            }
            _ => Ok(()),
        }
    }

    fn check_order(&mut self, tx: &Transaction) {
        match self.last_timestamp {
            Some(previous) if tx.timestamp < previous => {
                warn!(
                    "Tx {}: Out of order, {} is before {previous}",
                    tx.id, tx.timestamp
                );
                self.diagnostics.push(Diagnostic::OutOfOrder {
                    txid: tx.id.clone(),
                    timestamp: tx.timestamp,
                    previous,
                });
            }
            _ => self.last_timestamp = Some(tx.timestamp),
        }
    }

    fn price(&self, tx: &Transaction, symbol: &Symbol) -> Result<UsdAmount, LedgerError> {
        let price_error = |source| LedgerError::Price {
            txid: tx.id.clone(),
            source,
        };
        let price = self
            .prices
            .price(symbol, tx.timestamp)
            .map_err(price_error)?;

        if price <= UsdAmount::ZERO {
            return Err(price_error(PriceError::NonPositive(
                symbol.clone(),
                tx.timestamp,
            )));
        }

        Ok(price)
    }

    /// Split a trade into fiat-denominated legs.
    ///
    /// A crypto-for-crypto trade disposes of what was given up and acquires what was received,
    /// both valued at the market price of the same side. The fee is already folded into the
    /// quantities, so neither leg carries a fiat fee.
    fn trade(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        let date = tx.timestamp;
        let is_buy = tx.kind == TxKind::Buy;

        if self.is_fiat(&tx.counter_asset) {
            let (gross, fee) = (tx.gross_fiat(), tx.fee_fiat());
            if is_buy {
                self.acquire(&tx.account, date, &tx.asset, tx.quantity, gross, fee);
            } else {
                self.dispose(&tx.account, date, &tx.asset, tx.quantity, gross, fee);
            }

            return Ok(());
        }

        // Look up both prices before touching any lots.
        let price_asset = self.price(tx, &tx.asset)?;
        let price_counter = self.price(tx, &tx.counter_asset)?;
        debug!(
            "Tx {}: Splitting {}/{} trade at {price_asset}/{price_counter}",
            tx.id, tx.asset, tx.counter_asset
        );

        if is_buy {
            let given = Quantity::new(tx.gross + tx.fee);
            let value = tx.quantity.value_at(price_asset);
            self.dispose(
                &tx.account,
                date,
                &tx.counter_asset,
                given,
                value,
                UsdAmount::ZERO,
            );
            self.acquire(
                &tx.account,
                date,
                &tx.asset,
                tx.quantity,
                value,
                UsdAmount::ZERO,
            );
        } else {
            let received = Quantity::new(tx.gross - tx.fee);
            let value = received.value_at(price_counter);
            self.dispose(
                &tx.account,
                date,
                &tx.asset,
                tx.quantity,
                value,
                UsdAmount::ZERO,
            );
            self.acquire(
                &tx.account,
                date,
                &tx.counter_asset,
                received,
                value,
                UsdAmount::ZERO,
            );
        }

        Ok(())
    }

    fn acquire(
        &mut self,
        account: &str,
        date: DateTime<Utc>,
        asset: &Symbol,
        quantity: Quantity,
        gross: UsdAmount,
        fee: UsdAmount,
    ) {
        let key = LotKey::new(account, asset.clone());
        if quantity.is_zero() {
            trace!("Ignoring zero quantity acquisition for {key}");
            return;
        }

        debug!("Acquire {quantity} {key} for {gross} (fee {fee})");
        self.lots.entry(key).or_default().push(Lot {
            date,
            quantity,
            gross,
            fee,
        });
    }

    /// Match a disposal against the oldest lots first.
    fn dispose(
        &mut self,
        account: &str,
        date: DateTime<Utc>,
        asset: &Symbol,
        quantity: Quantity,
        proceeds: UsdAmount,
        fee: UsdAmount,
    ) {
        let key = LotKey::new(account, asset.clone());
        if quantity.is_zero() {
            trace!("Ignoring zero quantity disposal for {key}");
            return;
        }

        debug!("Dispose {quantity} {key} for {proceeds} (fee {fee})");
        let mut lots = self.take_lots(&key);
        let mut remaining = quantity;
        let mut proceeds_left = proceeds;
        let mut fee_left = fee;

        while remaining > Quantity::ZERO {
            let Some(lot) = lots.pop_front() else {
                warn!("There were no lots for {remaining} {key} sold on {date}");
                self.gains.push(GainRecord {
                    acquired: self.config.fallback_date(),
                    sold: date,
                    key: key.clone(),
                    quantity: remaining,
                    proceeds: proceeds_left,
                    fee_sale: fee_left,
                    basis: UsdAmount::ZERO,
                    fee_purchase: UsdAmount::ZERO,
                });
                self.diagnostics.push(Diagnostic::UnmatchedDisposal {
                    key: key.clone(),
                    date,
                    quantity: remaining,
                    proceeds: proceeds_left,
                });
                break;
            };

            let (taken, leave) = if lot.quantity > remaining {
                let split = lot.split(remaining);
                (split.take, Some(split.leave))
            } else {
                (lot, None)
            };

            // The fragment that completes the request takes whatever is left, so the records of
            // one disposal always add up to its proceeds and fee exactly.
            let (lot_proceeds, lot_fee) = if taken.quantity == remaining {
                (proceeds_left, fee_left)
            } else {
                (
                    proceeds.pro_rata(taken.quantity, quantity),
                    fee.pro_rata(taken.quantity, quantity),
                )
            };
            proceeds_left -= lot_proceeds;
            fee_left -= lot_fee;
            remaining -= taken.quantity;

            trace!(
                "Matched {} {key} acquired {} with basis {}",
                taken.quantity,
                taken.date,
                taken.gross
            );
            self.gains.push(GainRecord {
                acquired: taken.date,
                sold: date,
                key: key.clone(),
                quantity: taken.quantity,
                proceeds: lot_proceeds,
                fee_sale: lot_fee,
                basis: taken.gross,
                fee_purchase: taken.fee,
            });

            if let Some(leave) = leave {
                lots.push_front(leave);
            }
        }

        self.restore_lots(key, lots);
    }

    fn deposit(&mut self, tx: &Transaction) {
        if self.is_fiat(&tx.asset) {
            info!("Tx {}: {} deposit {} to {}", tx.id, tx.asset, tx.gross, tx.account);
        } else {
            // Crypto deposits are expected to match a withdrawal from another account, which
            // already moved the lots.
            debug!(
                "Tx {}: Ignoring {} {} deposit to {}",
                tx.id, tx.quantity, tx.asset, tx.account
            );
        }
    }

    /// Move lots to the account that owns the destination address, oldest first.
    fn withdraw(&mut self, tx: &Transaction) {
        if self.is_fiat(&tx.asset) {
            info!("Tx {}: {} withdrawal from {}", tx.id, tx.asset, tx.account);
            return;
        }

        let address = tx.address.as_deref().unwrap_or_default();
        let Some(destination) = self.addresses.resolve(address) else {
            error!(
                "Tx {}: Address `{address}` is unknown, unable to process withdrawal",
                tx.id
            );
            self.diagnostics.push(Diagnostic::UnknownAddress {
                txid: tx.id.clone(),
                address: address.to_string(),
            });
            return;
        };

        let source_key = tx.key();
        let destination_key = LotKey::new(destination, tx.asset.clone());
        if source_key == destination_key {
            debug!("Tx {}: Withdrawal from {source_key} to itself", tx.id);
            return;
        }

        debug!(
            "Tx {}: Moving {} from {source_key} to {destination_key}",
            tx.id, tx.quantity
        );
        let mut source = self.take_lots(&source_key);
        let mut destination = self.take_lots(&destination_key);
        let mut remaining = tx.quantity;

        while remaining > Quantity::ZERO {
            let Some(lot) = source.pop_front() else {
                warn!(
                    "Tx {}: {source_key} is short {remaining} for withdrawal",
                    tx.id
                );
                self.diagnostics.push(Diagnostic::WithdrawalShortfall {
                    txid: tx.id.clone(),
                    key: source_key.clone(),
                    missing: remaining,
                });
                break;
            };

            if lot.quantity > remaining {
                let split = lot.split(remaining);
                source.push_front(split.leave);
                destination.push(split.take);
                remaining = Quantity::ZERO;
            } else {
                remaining -= lot.quantity;
                destination.push(lot);
            }
        }

        self.restore_lots(source_key, source);
        self.restore_lots(destination_key, destination);
    }

    fn init(&mut self, tx: &Transaction) {
        self.acquire(
            &tx.account,
            tx.timestamp,
            &tx.asset,
            tx.quantity,
            tx.gross_fiat(),
            tx.fee_fiat(),
        );
    }

    /// Mined coins are income at market value, and that value becomes their basis.
    fn mine(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        if tx.quantity.is_zero() {
            trace!("Tx {}: Ignoring zero quantity mining reward", tx.id);
            return Ok(());
        }

        let price = self.price(tx, &tx.asset)?;
        let gross = self.config.mining_valuation.value(tx.quantity, price);

        self.income.push(IncomeRecord {
            date: tx.timestamp,
            key: tx.key(),
            quantity: tx.quantity,
            gross,
            fee: UsdAmount::ZERO,
        });
        self.acquire(
            &tx.account,
            tx.timestamp,
            &tx.asset,
            tx.quantity,
            gross,
            UsdAmount::ZERO,
        );

        Ok(())
    }

    fn take_lots(&mut self, key: &LotKey) -> FIFO<Lot> {
        self.lots.remove(key).unwrap_or_default()
    }

    fn restore_lots(&mut self, key: LotKey, lots: FIFO<Lot>) {
        if !lots.is_empty() {
            self.lots.insert(key, lots);
        }
    }
}
