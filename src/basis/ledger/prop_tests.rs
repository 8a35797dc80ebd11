use super::*;
use crate::model::{AddressBook, FixedPrices};
use arbtest::arbitrary::{Result as ArbResult, Unstructured};
use arbtest::arbtest;
use chrono::{Datelike as _, TimeDelta, TimeZone as _};
use rust_decimal::Decimal;
use tracing_test::traced_test;

fn arb_quantity(u: &mut Unstructured<'_>) -> ArbResult<Quantity> {
    Ok(Quantity::new(Decimal::new(u.int_in_range(1..=500_000_000)?, 8)))
}

fn arb_usd(u: &mut Unstructured<'_>) -> ArbResult<UsdAmount> {
    Ok(UsdAmount::new(Decimal::new(u.int_in_range(0..=1_000_000_000)?, 2)))
}

fn fiat_tx(
    timestamp: DateTime<Utc>,
    kind: TxKind,
    quantity: Quantity,
    gross: UsdAmount,
    fee: UsdAmount,
) -> Transaction {
    Transaction {
        timestamp,
        account: "A".to_string(),
        id: format!("{kind}-{}", timestamp.timestamp()),
        kind,
        trading_pair: "BTCUSD".to_string(),
        asset: Symbol::new("BTC"),
        counter_asset: Symbol::new("USD"),
        gross: gross.to_decimal(),
        quantity,
        fee: fee.to_decimal(),
        address: None,
        note: String::new(),
    }
}

/// Fill account `A` with a random number of BTC lots in date order. Returns the next free date.
fn arb_buys(
    u: &mut Unstructured<'_>,
    ledger: &mut Ledger<FixedPrices, AddressBook>,
) -> ArbResult<DateTime<Utc>> {
    let mut date = Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();

    for _ in 0..u.int_in_range(0..=20)? {
        let buy = fiat_tx(date, TxKind::Buy, arb_quantity(u)?, arb_usd(u)?, arb_usd(u)?);
        ledger.add_transaction(&buy).unwrap();
        date += TimeDelta::days(u.int_in_range(0..=3)?);
    }

    Ok(date + TimeDelta::days(1))
}

fn assert_lots_are_valid(ledger: &Ledger<FixedPrices, AddressBook>) {
    for (key, lots) in ledger.open_lots() {
        assert!(!lots.is_empty(), "{key} has no lots");

        let mut previous = DateTime::<Utc>::MIN_UTC;
        for lot in lots {
            assert!(lot.quantity > Quantity::ZERO, "{key}: {lot:?}");
            assert!(!lot.gross.is_sign_negative(), "{key}: {lot:?}");
            assert!(!lot.fee.is_sign_negative(), "{key}: {lot:?}");
            assert!(lot.date >= previous, "{key} is out of date order");
            previous = lot.date;
        }
    }
}

#[test]
#[traced_test]
fn prop_test_disposal_matches_oldest_lots_first() {
    arbtest(|u| {
        let mut ledger = Ledger::new(
            LedgerConfig::default(),
            FixedPrices::default(),
            AddressBook::new(),
        );
        let date = arb_buys(u, &mut ledger)?;
        let before = ledger.total_open_lots();

        let quantity = arb_quantity(u)?;
        let (gross, fee) = (arb_usd(u)?, arb_usd(u)?);
        let sell = fiat_tx(date, TxKind::Sell, quantity, gross, fee);
        ledger.add_transaction(&sell).unwrap();

        let gains = ledger.gains();
        let sold: Quantity = gains.iter().map(|gain| gain.quantity).sum();
        let proceeds: UsdAmount = gains.iter().map(|gain| gain.proceeds).sum();
        let fee_sale: UsdAmount = gains.iter().map(|gain| gain.fee_sale).sum();
        let basis: UsdAmount = gains.iter().map(|gain| gain.basis).sum();
        let fee_purchase: UsdAmount = gains.iter().map(|gain| gain.fee_purchase).sum();

        // Every unit requested is accounted for, by a lot or by a zero-basis fragment.
        assert_eq!(sold, quantity);
        assert!(proceeds.is_fuzzy_eq(gross), "{proceeds} != {gross}");
        assert!(fee_sale.is_fuzzy_eq(fee), "{fee_sale} != {fee}");

        // Basis only moves from open lots into gain records.
        let after = ledger.total_open_lots();
        assert!((basis + after.gross).is_fuzzy_eq(before.gross));
        assert!((fee_purchase + after.fee).is_fuzzy_eq(before.fee));
        assert_eq!(after.quantity + sold, before.quantity.max(quantity));

        // FIFO: records are emitted oldest lot first, and nothing left open is older.
        for pair in gains.windows(2) {
            let is_unmatched = pair[1].basis.is_zero() && pair[1].acquired.year() == 1900;
            assert!(is_unmatched || pair[0].acquired <= pair[1].acquired);
        }
        let last_matched = gains
            .iter()
            .filter(|gain| gain.acquired.year() != 1900)
            .map(|gain| gain.acquired)
            .max();
        for lot in ledger.open_lots().values().flatten() {
            assert!(last_matched.is_none_or(|last| lot.date >= last));
        }

        for gain in gains {
            assert!(gain.quantity > Quantity::ZERO, "{gain:?}");
            assert!(!gain.proceeds.is_sign_negative(), "{gain:?}");
            assert!(!gain.fee_sale.is_sign_negative(), "{gain:?}");
            assert!(!gain.basis.is_sign_negative(), "{gain:?}");
        }
        assert_eq!(ledger.exceptions().count(), usize::from(quantity > before.quantity));
        assert_lots_are_valid(&ledger);

        Ok(())
    });
}

#[test]
#[traced_test]
fn prop_test_withdrawal_moves_lots_without_gains() {
    arbtest(|u| {
        let addresses = AddressBook::from_iter([("bc1qdest", "B")]);
        let mut ledger = Ledger::new(LedgerConfig::default(), FixedPrices::default(), addresses);
        let date = arb_buys(u, &mut ledger)?;
        let before = ledger.total_open_lots();

        let quantity = arb_quantity(u)?;
        let withdraw = Transaction {
            address: Some("bc1qdest".to_string()),
            ..fiat_tx(
                date,
                TxKind::Withdraw,
                quantity,
                UsdAmount::ZERO,
                UsdAmount::ZERO,
            )
        };
        ledger.add_transaction(&withdraw).unwrap();

        assert!(ledger.gains().is_empty());
        let after = ledger.total_open_lots();
        assert_eq!(after.quantity, before.quantity);
        assert!(after.gross.is_fuzzy_eq(before.gross));
        assert!(after.fee.is_fuzzy_eq(before.fee));

        let moved: Quantity = ledger
            .open_lots()
            .get(&LotKey::new("B", Symbol::new("BTC")))
            .into_iter()
            .flatten()
            .map(|lot| lot.quantity)
            .sum();
        assert_eq!(moved, quantity.min(before.quantity));

        let is_short = quantity > before.quantity;
        assert_eq!(ledger.diagnostics().len(), usize::from(is_short));
        assert_lots_are_valid(&ledger);

        Ok(())
    });
}
