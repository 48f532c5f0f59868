//! FIFO lot matching.
//!
//! Buys open lots at the back of a per-instrument queue; Sells close them
//! from the front. Each (Sell, lot) pairing yields one [`ClosedPosition`].
//!
//! A Sell larger than the open quantity does not create a negative lot. The
//! unmatched remainder is reported as an [`InsufficientLots`] diagnostic and
//! recorded as `shortfall` on the last position that Sell produced, and
//! processing carries on with the next transaction.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use super::error::InsufficientLots;
use super::position::{ClosedPosition, Lot, LotQueue, OpenLot, SLICE_SCALE};
use super::transaction::{Side, Transaction};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub closed: Vec<ClosedPosition>,
    pub diagnostics: Vec<InsufficientLots>,
    pub open_lots: Vec<OpenLot>,
}

/// Run one FIFO pass over `transactions`.
///
/// Transactions are taken in timestamp order; equal timestamps keep their
/// input order.
pub fn match_fifo(transactions: &[Transaction]) -> MatchOutcome {
    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_by_key(|t| t.timestamp);

    let mut queues: HashMap<&str, LotQueue> = HashMap::new();
    let mut outcome = MatchOutcome::default();

    for tx in ordered {
        let queue = queues.entry(tx.instrument.as_str()).or_default();
        match tx.side {
            Side::Buy => queue.push(Lot::open(tx)),
            Side::Sell => {
                log::debug!(
                    "{}: selling {} against {} open",
                    tx.instrument,
                    tx.quantity,
                    queue.open_quantity()
                );
                if let Some(diag) = close_sell(queue, tx, &mut outcome.closed) {
                    log::warn!("{diag}");
                    outcome.diagnostics.push(diag);
                }
            }
        }
    }

    let sorted: BTreeMap<&str, LotQueue> = queues.into_iter().collect();
    outcome.open_lots = sorted
        .values()
        .flat_map(|q| q.iter().map(OpenLot::from))
        .collect();

    outcome
}

fn close_sell(
    queue: &mut LotQueue,
    sell: &Transaction,
    closed: &mut Vec<ClosedPosition>,
) -> Option<InsufficientLots> {
    let first = closed.len();
    let mut remaining = sell.quantity;
    let mut fees_left = sell.fees;

    while remaining > Decimal::ZERO {
        let Some(lot) = queue.front_mut() else {
            break;
        };

        let take = remaining.min(lot.remaining);
        let acquired_at = lot.acquired_at;
        let cost_basis = lot.take(take);
        let exhausted = lot.is_exhausted();

        let fee = if fees_left.is_zero() {
            Decimal::ZERO
        } else if take == remaining {
            fees_left
        } else {
            (sell.fees * take / sell.quantity)
                .round_dp(SLICE_SCALE)
                .min(fees_left)
        };
        fees_left -= fee;

        log::debug!(
            "{}: closing {} from lot of {} (basis {})",
            sell.instrument,
            take,
            acquired_at,
            cost_basis
        );

        closed.push(ClosedPosition::new(
            sell.instrument.clone(),
            acquired_at,
            sell.timestamp,
            take,
            cost_basis,
            take * sell.price - fee,
        ));

        remaining -= take;
        if exhausted {
            queue.pop_front();
        }
    }

    if remaining <= Decimal::ZERO {
        return None;
    }

    if closed.len() > first {
        if let Some(last) = closed.last_mut() {
            last.shortfall = Some(remaining);
        }
    }

    Some(InsufficientLots {
        instrument: sell.instrument.clone(),
        timestamp: sell.timestamp,
        requested: sell.quantity,
        matched: sell.quantity - remaining,
        unmatched: remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal_macros::dec;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn tx(day: u32, inst: &str, side: Side, qty: Decimal, price: Decimal) -> Transaction {
        Transaction {
            timestamp: ts(day),
            instrument: inst.into(),
            side,
            quantity: qty,
            price,
            fees: Decimal::ZERO,
        }
    }

    #[test]
    fn fifo_draws_oldest_lot_first() {
        let txs = vec![
            tx(1, "AAPL", Side::Buy, dec!(100), dec!(10)),
            tx(2, "AAPL", Side::Buy, dec!(100), dec!(20)),
            tx(3, "AAPL", Side::Sell, dec!(150), dec!(30)),
        ];
        let out = match_fifo(&txs);

        assert_eq!(out.closed.len(), 2);
        assert_eq!(out.closed[0].quantity, dec!(100));
        assert_eq!(out.closed[0].cost_basis, dec!(1000));
        assert_eq!(out.closed[0].proceeds, dec!(3000));
        assert_eq!(out.closed[0].acquired_at, ts(1));
        assert_eq!(out.closed[1].quantity, dec!(50));
        assert_eq!(out.closed[1].cost_basis, dec!(1000));
        assert_eq!(out.closed[1].proceeds, dec!(1500));
        assert_eq!(out.closed[1].acquired_at, ts(2));
        assert!(out.diagnostics.is_empty());

        assert_eq!(out.open_lots.len(), 1);
        assert_eq!(out.open_lots[0].remaining, dec!(50));
        assert_eq!(out.open_lots[0].acquired_at, ts(2));
    }

    #[test]
    fn exact_match_empties_queue_then_oversell_is_flagged() {
        let txs = vec![
            tx(1, "AAPL", Side::Buy, dec!(10), dec!(10)),
            tx(2, "AAPL", Side::Sell, dec!(10), dec!(12)),
            tx(3, "AAPL", Side::Sell, dec!(5), dec!(12)),
        ];
        let out = match_fifo(&txs);

        assert_eq!(out.closed.len(), 1);
        assert!(out.closed[0].shortfall.is_none());
        assert!(out.open_lots.is_empty());
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].matched, dec!(0));
        assert_eq!(out.diagnostics[0].unmatched, dec!(5));
    }

    #[test]
    fn oversell_flags_partial_record() {
        let txs = vec![
            tx(1, "TSLA", Side::Buy, dec!(50), dec!(10)),
            tx(2, "TSLA", Side::Sell, dec!(80), dec!(15)),
        ];
        let out = match_fifo(&txs);

        assert_eq!(out.closed.len(), 1);
        let cp = &out.closed[0];
        assert_eq!(cp.quantity, dec!(50));
        assert_eq!(cp.realized_pl, dec!(250));
        assert_eq!(cp.shortfall, Some(dec!(30)));
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].requested, dec!(80));
        assert_eq!(out.diagnostics[0].matched, dec!(50));
        assert_eq!(out.diagnostics[0].unmatched, dec!(30));
    }

    #[test]
    fn processing_continues_after_oversell() {
        let txs = vec![
            tx(1, "TSLA", Side::Sell, dec!(5), dec!(15)),
            tx(2, "TSLA", Side::Buy, dec!(5), dec!(10)),
            tx(3, "TSLA", Side::Sell, dec!(5), dec!(11)),
        ];
        let out = match_fifo(&txs);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.closed.len(), 1);
        assert_eq!(out.closed[0].realized_pl, dec!(5));
    }

    #[test]
    fn instruments_are_matched_independently() {
        let txs = vec![
            tx(1, "AAPL", Side::Buy, dec!(10), dec!(10)),
            tx(2, "MSFT", Side::Buy, dec!(10), dec!(100)),
            tx(3, "AAPL", Side::Sell, dec!(10), dec!(11)),
            tx(4, "MSFT", Side::Sell, dec!(10), dec!(90)),
        ];
        let out = match_fifo(&txs);
        assert_eq!(out.closed.len(), 2);
        assert_eq!(out.closed[0].instrument, "AAPL");
        assert_eq!(out.closed[0].realized_pl, dec!(10));
        assert_eq!(out.closed[1].instrument, "MSFT");
        assert_eq!(out.closed[1].realized_pl, dec!(-100));
    }

    #[test]
    fn input_is_ordered_by_timestamp() {
        // newest-first, as brokerage exports usually are
        let txs = vec![
            tx(3, "AAPL", Side::Sell, dec!(10), dec!(15)),
            tx(1, "AAPL", Side::Buy, dec!(10), dec!(10)),
        ];
        let out = match_fifo(&txs);
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.closed.len(), 1);
        assert_eq!(out.closed[0].holding_period_days, 2);
    }

    #[test]
    fn same_timestamp_keeps_input_order() {
        let txs = vec![
            tx(1, "AAPL", Side::Buy, dec!(10), dec!(10)),
            tx(1, "AAPL", Side::Sell, dec!(10), dec!(12)),
        ];
        let out = match_fifo(&txs);
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.closed[0].realized_pl, dec!(20));
    }

    #[test]
    fn fees_are_allocated_to_basis_and_proceeds() {
        let mut buy = tx(1, "AAPL", Side::Buy, dec!(10), dec!(10));
        buy.fees = dec!(2);
        let mut sell = tx(2, "AAPL", Side::Sell, dec!(4), dec!(20));
        sell.fees = dec!(1);
        let out = match_fifo(&[buy, sell]);

        let cp = &out.closed[0];
        assert_eq!(cp.cost_basis, dec!(40.8));
        assert_eq!(cp.proceeds, dec!(79));
        assert_eq!(cp.realized_pl, dec!(38.2));
    }

    #[test]
    fn sell_fees_sum_exactly_across_slices() {
        let txs = vec![
            tx(1, "AAPL", Side::Buy, dec!(1), dec!(10)),
            tx(2, "AAPL", Side::Buy, dec!(1), dec!(10)),
            tx(3, "AAPL", Side::Buy, dec!(1), dec!(10)),
            Transaction {
                fees: dec!(1),
                ..tx(4, "AAPL", Side::Sell, dec!(3), dec!(0))
            },
        ];
        let out = match_fifo(&txs);
        assert_eq!(out.closed.len(), 3);
        // thirds do not divide evenly; the last slice absorbs the remainder
        let proceeds: Decimal = out.closed.iter().map(|c| c.proceeds).sum();
        assert_eq!(proceeds, dec!(-1));
    }

    #[test]
    fn empty_input_yields_empty_outcome() {
        let out = match_fifo(&[]);
        assert_eq!(out, MatchOutcome::default());
    }

    #[test]
    fn fractional_shares() {
        let txs = vec![
            tx(1, "VOO", Side::Buy, dec!(0.5), dec!(400)),
            tx(2, "VOO", Side::Buy, dec!(0.25), dec!(420)),
            tx(3, "VOO", Side::Sell, dec!(0.6), dec!(450)),
        ];
        let out = match_fifo(&txs);
        assert_eq!(out.closed.len(), 2);
        assert_eq!(out.closed[0].quantity, dec!(0.5));
        assert_eq!(out.closed[1].quantity, dec!(0.1));
        assert_eq!(out.closed[1].cost_basis, dec!(42.0));
        assert_eq!(out.open_lots[0].remaining, dec!(0.15));
    }

    #[test]
    fn lot_cost_is_conserved_across_slices() {
        let mut buy = tx(1, "AAPL", Side::Buy, dec!(3), dec!(45728.29667));
        buy.fees = dec!(0.2);
        let txs = vec![
            buy,
            tx(2, "AAPL", Side::Sell, dec!(1), dec!(50000)),
            tx(3, "AAPL", Side::Sell, dec!(1), dec!(50000)),
            tx(4, "AAPL", Side::Sell, dec!(1), dec!(50000)),
        ];
        let out = match_fifo(&txs);

        assert_eq!(out.closed.len(), 3);
        let basis: Decimal = out.closed.iter().map(|c| c.cost_basis).sum();
        assert_eq!(basis, dec!(137185.09001));
        assert!(out.open_lots.is_empty());
    }

    #[test]
    fn sell_fees_are_conserved_at_large_notional() {
        let mut sell = tx(4, "AAPL", Side::Sell, dec!(3), dec!(45728.29667));
        sell.fees = dec!(1);
        let txs = vec![
            tx(1, "AAPL", Side::Buy, dec!(1), dec!(40000)),
            tx(2, "AAPL", Side::Buy, dec!(1), dec!(40000)),
            tx(3, "AAPL", Side::Buy, dec!(1), dec!(40000)),
            sell,
        ];
        let out = match_fifo(&txs);

        assert_eq!(out.closed.len(), 3);
        let proceeds: Decimal = out.closed.iter().map(|c| c.proceeds).sum();
        assert_eq!(proceeds, dec!(137183.89001));
        for cp in &out.closed {
            assert!(cp.proceeds.scale() <= SLICE_SCALE);
        }
    }
}
