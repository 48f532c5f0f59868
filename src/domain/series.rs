//! Chart-ready data series derived from closed positions.
//!
//! Provides:
//! - cumulative realized P/L by disposal date
//! - month-end P/L with running total, empty months filled with zero
//! - top/bottom instruments by total P/L
//! - equal-width histograms (holding periods, per-trade P/L)

use chrono::{Datelike, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;

use super::metrics::InstrumentBreakdown;
use super::position::ClosedPosition;

#[derive(Debug, Clone, PartialEq)]
pub struct CumulativePoint {
    pub disposed_at: NaiveDateTime,
    pub realized_pl: Decimal,
    pub cumulative_pl: Decimal,
}

pub fn cumulative_pl(closed: &[ClosedPosition]) -> Vec<CumulativePoint> {
    let mut ordered: Vec<&ClosedPosition> = closed.iter().collect();
    ordered.sort_by_key(|cp| cp.disposed_at);

    let mut running = Decimal::ZERO;
    ordered
        .into_iter()
        .map(|cp| {
            running += cp.realized_pl;
            CumulativePoint {
                disposed_at: cp.disposed_at,
                realized_pl: cp.realized_pl,
                cumulative_pl: running,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPl {
    pub year: i32,
    pub month: u32,
    pub realized_pl: Decimal,
    pub cumulative_pl: Decimal,
}

pub fn monthly_pl(closed: &[ClosedPosition]) -> Vec<MonthlyPl> {
    let mut buckets: BTreeMap<(i32, u32), Decimal> = BTreeMap::new();
    for cp in closed {
        let key = (cp.disposed_at.year(), cp.disposed_at.month());
        *buckets.entry(key).or_insert(Decimal::ZERO) += cp.realized_pl;
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    let mut running = Decimal::ZERO;
    let (mut year, mut month) = first;
    loop {
        let realized_pl = buckets.get(&(year, month)).copied().unwrap_or(Decimal::ZERO);
        running += realized_pl;
        rows.push(MonthlyPl {
            year,
            month,
            realized_pl,
            cumulative_pl: running,
        });

        if (year, month) == last {
            break;
        }
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    rows
}

/// Best `n` instruments by total P/L, highest first.
pub fn top_instruments(breakdown: &[InstrumentBreakdown], n: usize) -> Vec<InstrumentBreakdown> {
    let mut rows = breakdown.to_vec();
    rows.sort_by(|a, b| {
        b.total_pl
            .cmp(&a.total_pl)
            .then_with(|| a.instrument.cmp(&b.instrument))
    });
    rows.truncate(n);
    rows
}

/// Worst `n` instruments by total P/L, lowest first.
pub fn bottom_instruments(
    breakdown: &[InstrumentBreakdown],
    n: usize,
) -> Vec<InstrumentBreakdown> {
    let mut rows = breakdown.to_vec();
    rows.sort_by(|a, b| {
        a.total_pl
            .cmp(&b.total_pl)
            .then_with(|| a.instrument.cmp(&b.instrument))
    });
    rows.truncate(n);
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    /// `count / (total * width)`, so the bins integrate to 1. A zero-width
    /// bin carries the plain share `count / total`.
    pub density: f64,
}

/// Equal-width bin edges spanning `values`. The last bin is closed on the
/// right so the maximum lands in it.
pub fn bin_edges(values: &[f64], bins: usize) -> Vec<f64> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max <= min {
        return vec![min, min];
    }
    let width = (max - min) / bins as f64;
    (0..=bins)
        .map(|i| if i == bins { max } else { min + width * i as f64 })
        .collect()
}

/// Count `values` into the bins described by `edges`. Values outside the
/// edges are ignored.
pub fn histogram_with_edges(values: &[f64], edges: &[f64]) -> Vec<HistogramBin> {
    if edges.len() < 2 {
        return Vec::new();
    }
    let mut bins: Vec<HistogramBin> = edges
        .windows(2)
        .map(|w| HistogramBin {
            lower: w[0],
            upper: w[1],
            count: 0,
            density: 0.0,
        })
        .collect();
    let last = bins.len() - 1;

    for &v in values {
        if let Some(idx) = bins.iter().enumerate().position(|(i, b)| {
            v >= b.lower && (v < b.upper || (i == last && v <= b.upper))
        }) {
            bins[idx].count += 1;
        }
    }

    let total: usize = bins.iter().map(|b| b.count).sum();
    if total > 0 {
        for b in &mut bins {
            let share = b.count as f64 / total as f64;
            let width = b.upper - b.lower;
            b.density = if width > 0.0 { share / width } else { share };
        }
    }
    bins
}

pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    histogram_with_edges(values, &bin_edges(values, bins))
}

pub fn holding_periods(closed: &[ClosedPosition]) -> Vec<f64> {
    closed.iter().map(|cp| cp.holding_period_days as f64).collect()
}

pub fn realized_pls(closed: &[ClosedPosition]) -> Vec<f64> {
    closed
        .iter()
        .filter_map(|cp| cp.realized_pl.to_f64())
        .collect()
}

/// Winning and losing holding-period histograms over shared bin edges.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingComparison {
    pub winning: Vec<HistogramBin>,
    pub losing: Vec<HistogramBin>,
}

pub fn holding_period_comparison(closed: &[ClosedPosition], bins: usize) -> HoldingComparison {
    let edges = bin_edges(&holding_periods(closed), bins);
    let (won, lost): (Vec<ClosedPosition>, Vec<ClosedPosition>) =
        closed.iter().cloned().partition(ClosedPosition::is_win);
    HoldingComparison {
        winning: histogram_with_edges(&holding_periods(&won), &edges),
        losing: histogram_with_edges(&holding_periods(&lost), &edges),
    }
}
