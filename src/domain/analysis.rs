//! One analysis pass: filter, match, aggregate, build series.

use std::fmt;

use super::error::InsufficientLots;
use super::matching::match_fifo;
use super::metrics::{InstrumentBreakdown, SummaryMetrics};
use super::position::{ClosedPosition, OpenLot};
use super::series::{
    self, CumulativePoint, HistogramBin, HoldingComparison, MonthlyPl,
};
use super::transaction::{filter_trades, Activity, Transaction};

pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_HISTOGRAM_BINS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub top_n: usize,
    pub histogram_bins: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            top_n: DEFAULT_TOP_N,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
        }
    }
}

/// Non-fatal data quality notices.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    EmptyInput,
    InsufficientLots(InsufficientLots),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::EmptyInput => write!(f, "no trade transactions in input"),
            Warning::InsufficientLots(d) => write!(f, "{d}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub trade_count: usize,
    pub non_trade_rows: usize,
    pub incomplete_rows: usize,
    pub closed: Vec<ClosedPosition>,
    pub open_lots: Vec<OpenLot>,
    pub warnings: Vec<Warning>,
    pub summary: SummaryMetrics,
    pub instruments: Vec<InstrumentBreakdown>,
    pub top_instruments: Vec<InstrumentBreakdown>,
    pub bottom_instruments: Vec<InstrumentBreakdown>,
    pub cumulative: Vec<CumulativePoint>,
    pub monthly: Vec<MonthlyPl>,
    pub holding_histogram: Vec<HistogramBin>,
    pub holding_comparison: HoldingComparison,
    pub pl_histogram: Vec<HistogramBin>,
}

impl AnalysisReport {
    pub fn insufficient_lots(&self) -> impl Iterator<Item = &InsufficientLots> {
        self.warnings.iter().filter_map(|w| match w {
            Warning::InsufficientLots(d) => Some(d),
            Warning::EmptyInput => None,
        })
    }
}

/// Run the trade filter then analyse the surviving trades.
pub fn analyze(activities: &[Activity], config: &AnalysisConfig) -> AnalysisReport {
    let filtered = filter_trades(activities);
    log::info!(
        "{} trades kept, {} non-trade rows and {} incomplete rows discarded",
        filtered.trades.len(),
        filtered.non_trade,
        filtered.incomplete
    );
    let mut report = analyze_trades(&filtered.trades, config);
    report.non_trade_rows = filtered.non_trade;
    report.incomplete_rows = filtered.incomplete;
    report
}

/// Analyse already-filtered trades.
pub fn analyze_trades(trades: &[Transaction], config: &AnalysisConfig) -> AnalysisReport {
    let mut warnings = Vec::new();
    if trades.is_empty() {
        log::warn!("no trade transactions to match");
        warnings.push(Warning::EmptyInput);
    }

    let outcome = match_fifo(trades);
    log::info!(
        "matched {} closed positions, {} lots still open",
        outcome.closed.len(),
        outcome.open_lots.len()
    );
    warnings.extend(outcome.diagnostics.into_iter().map(Warning::InsufficientLots));

    let closed = outcome.closed;
    let summary = SummaryMetrics::compute(&closed);
    let instruments = InstrumentBreakdown::compute_per_instrument(&closed);

    AnalysisReport {
        trade_count: trades.len(),
        non_trade_rows: 0,
        incomplete_rows: 0,
        top_instruments: series::top_instruments(&instruments, config.top_n),
        bottom_instruments: series::bottom_instruments(&instruments, config.top_n),
        cumulative: series::cumulative_pl(&closed),
        monthly: series::monthly_pl(&closed),
        holding_histogram: series::histogram(
            &series::holding_periods(&closed),
            config.histogram_bins,
        ),
        holding_comparison: series::holding_period_comparison(&closed, config.histogram_bins),
        pl_histogram: series::histogram(&series::realized_pls(&closed), config.histogram_bins),
        open_lots: outcome.open_lots,
        warnings,
        summary,
        instruments,
        closed,
    }
}
