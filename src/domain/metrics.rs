//! Summary statistics over closed positions.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;

use super::position::ClosedPosition;

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryMetrics {
    pub total_realized_pl: Decimal,
    pub total_proceeds: Decimal,
    pub total_cost_basis: Decimal,
    pub total_trades: usize,
    pub trades_won: usize,
    /// P/L <= 0, so break-even trades count here too.
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub trades_flagged: usize,
    pub win_rate: f64,
    pub avg_holding_days: f64,
    pub avg_holding_days_won: f64,
    pub avg_holding_days_lost: f64,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub profit_factor: f64,
}

impl SummaryMetrics {
    pub fn compute(closed: &[ClosedPosition]) -> Self {
        let mut total_realized_pl = Decimal::ZERO;
        let mut total_proceeds = Decimal::ZERO;
        let mut total_cost_basis = Decimal::ZERO;
        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut trades_flagged = 0usize;
        let mut gross_profit = Decimal::ZERO;
        let mut gross_loss = Decimal::ZERO;
        let mut largest_win = Decimal::ZERO;
        let mut largest_loss = Decimal::ZERO;
        let mut days_all = 0i64;
        let mut days_won = 0i64;
        let mut days_lost = 0i64;

        for cp in closed {
            let pl = cp.realized_pl;
            total_realized_pl += pl;
            total_proceeds += cp.proceeds;
            total_cost_basis += cp.cost_basis;
            days_all += cp.holding_period_days;

            if cp.is_flagged() {
                trades_flagged += 1;
            }

            if pl > Decimal::ZERO {
                trades_won += 1;
                gross_profit += pl;
                largest_win = largest_win.max(pl);
                days_won += cp.holding_period_days;
            } else {
                trades_lost += 1;
                days_lost += cp.holding_period_days;
                if pl < Decimal::ZERO {
                    gross_loss += pl.abs();
                    largest_loss = largest_loss.max(pl.abs());
                } else {
                    trades_breakeven += 1;
                }
            }
        }

        let total_trades = closed.len();
        let strict_losses = trades_lost - trades_breakeven;

        let win_rate = ratio(trades_won, total_trades);

        let avg_win = if trades_won > 0 {
            gross_profit / Decimal::from(trades_won)
        } else {
            Decimal::ZERO
        };
        let avg_loss = if strict_losses > 0 {
            gross_loss / Decimal::from(strict_losses)
        } else {
            Decimal::ZERO
        };

        let profit_factor = if gross_loss > Decimal::ZERO {
            (gross_profit / gross_loss).to_f64().unwrap_or(0.0)
        } else if gross_profit > Decimal::ZERO {
            f64::INFINITY
        } else {
            0.0
        };

        SummaryMetrics {
            total_realized_pl,
            total_proceeds,
            total_cost_basis,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            trades_flagged,
            win_rate,
            avg_holding_days: mean_days(days_all, total_trades),
            avg_holding_days_won: mean_days(days_won, trades_won),
            avg_holding_days_lost: mean_days(days_lost, trades_lost),
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            profit_factor,
        }
    }
}

/// Per-instrument totals.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentBreakdown {
    pub instrument: String,
    pub total_pl: Decimal,
    pub total_trades: usize,
    pub trades_won: usize,
    pub win_rate: f64,
    pub avg_holding_days: f64,
}

impl InstrumentBreakdown {
    /// Group closed positions by instrument, ordered by symbol.
    pub fn compute_per_instrument(closed: &[ClosedPosition]) -> Vec<InstrumentBreakdown> {
        let mut groups: BTreeMap<&str, (Decimal, usize, usize, i64)> = BTreeMap::new();

        for cp in closed {
            let entry = groups
                .entry(cp.instrument.as_str())
                .or_insert((Decimal::ZERO, 0, 0, 0));
            entry.0 += cp.realized_pl;
            entry.1 += 1;
            if cp.is_win() {
                entry.2 += 1;
            }
            entry.3 += cp.holding_period_days;
        }

        groups
            .into_iter()
            .map(|(instrument, (total_pl, total, won, days))| InstrumentBreakdown {
                instrument: instrument.to_string(),
                total_pl,
                total_trades: total,
                trades_won: won,
                win_rate: ratio(won, total),
                avg_holding_days: mean_days(days, total),
            })
            .collect()
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64
    } else {
        0.0
    }
}

fn mean_days(total_days: i64, count: usize) -> f64 {
    if count > 0 {
        total_days as f64 / count as f64
    } else {
        0.0
    }
}
