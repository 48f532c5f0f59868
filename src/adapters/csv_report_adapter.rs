//! CSV report writer.
//!
//! Writes one file per table:
//! - `closed_positions.csv`: every matched slice
//! - `monthly_pl.csv`: month-end P/L with running total
//! - `instrument_performance.csv`: per-instrument totals
//! - `open_lots.csv`: lots left open after matching
//! - `diagnostics.csv`: oversold sells

use crate::domain::analysis::AnalysisReport;
use crate::domain::error::LedgerError;
use crate::domain::position::OpenLot;
use crate::ports::report_port::ReportPort;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CLOSED_POSITIONS_FILE: &str = "closed_positions.csv";
pub const MONTHLY_PL_FILE: &str = "monthly_pl.csv";
pub const INSTRUMENT_PERFORMANCE_FILE: &str = "instrument_performance.csv";
pub const OPEN_LOTS_FILE: &str = "open_lots.csv";
pub const DIAGNOSTICS_FILE: &str = "diagnostics.csv";

#[derive(Serialize)]
struct ClosedPositionRow<'a> {
    instrument: &'a str,
    buy_date: NaiveDateTime,
    sell_date: NaiveDateTime,
    #[serde(with = "rust_decimal::serde::str")]
    quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    cost_basis: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    proceeds: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    realized_profit_loss: Decimal,
    holding_period_days: i64,
    #[serde(with = "rust_decimal::serde::str_option")]
    shortfall: Option<Decimal>,
}

#[derive(Serialize)]
struct MonthlyRow {
    sell_date: NaiveDate,
    #[serde(with = "rust_decimal::serde::str")]
    realized_profit_loss: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    cumulative_pl: Decimal,
}

#[derive(Serialize)]
struct InstrumentRow<'a> {
    instrument: &'a str,
    #[serde(with = "rust_decimal::serde::str")]
    total_pl: Decimal,
    num_trades: usize,
    win_rate: f64,
    avg_holding_period: f64,
}

#[derive(Serialize)]
struct OpenLotRow<'a> {
    instrument: &'a str,
    buy_date: NaiveDateTime,
    #[serde(with = "rust_decimal::serde::str")]
    remaining_quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    unit_cost: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    remaining_cost: Decimal,
}

#[derive(Serialize)]
struct DiagnosticRow<'a> {
    instrument: &'a str,
    sell_date: NaiveDateTime,
    #[serde(with = "rust_decimal::serde::str")]
    requested: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    matched: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    unmatched: Decimal,
}

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn serialize_rows<W: Write, T: Serialize>(
    wtr: &mut csv::Writer<W>,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), csv::Error> {
    for row in rows {
        wtr.serialize(row)?;
    }
    Ok(())
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), LedgerError> {
    let to_err = |e: csv::Error| LedgerError::Report {
        reason: format!("failed to write {}: {}", path.display(), e),
    };
    let mut wtr = csv::Writer::from_path(path).map_err(to_err)?;
    serialize_rows(&mut wtr, rows).map_err(to_err)?;
    wtr.flush()?;
    Ok(())
}

const OPEN_LOT_HEADER: [&str; 5] = [
    "instrument",
    "buy_date",
    "remaining_quantity",
    "unit_cost",
    "remaining_cost",
];

/// Write open lots as CSV to any writer, with the same columns as
/// `open_lots.csv`. The header is written even when `lots` is empty.
pub fn write_open_lots<W: Write>(writer: W, lots: &[OpenLot]) -> Result<(), LedgerError> {
    let to_err = |e: csv::Error| LedgerError::Report {
        reason: format!("failed to write open lots: {}", e),
    };
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(OPEN_LOT_HEADER).map_err(to_err)?;
    serialize_rows(
        &mut wtr,
        lots.iter().map(|lot| OpenLotRow {
            instrument: &lot.instrument,
            buy_date: lot.acquired_at,
            remaining_quantity: lot.remaining,
            unit_cost: lot.unit_cost,
            remaining_cost: lot.remaining_cost,
        }),
    )
    .map_err(to_err)?;
    wtr.flush()?;
    Ok(())
}

/// Last calendar day of the month, the label month-end resampling uses.
fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        report: &AnalysisReport,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, LedgerError> {
        fs::create_dir_all(output_dir)?;
        let mut written = Vec::new();

        let path = output_dir.join(CLOSED_POSITIONS_FILE);
        write_rows(
            &path,
            report.closed.iter().map(|cp| ClosedPositionRow {
                instrument: &cp.instrument,
                buy_date: cp.acquired_at,
                sell_date: cp.disposed_at,
                quantity: cp.quantity,
                cost_basis: cp.cost_basis,
                proceeds: cp.proceeds,
                realized_profit_loss: cp.realized_pl,
                holding_period_days: cp.holding_period_days,
                shortfall: cp.shortfall,
            }),
        )?;
        written.push(path);

        let path = output_dir.join(MONTHLY_PL_FILE);
        write_rows(
            &path,
            report.monthly.iter().filter_map(|m| {
                Some(MonthlyRow {
                    sell_date: month_end(m.year, m.month)?,
                    realized_profit_loss: m.realized_pl,
                    cumulative_pl: m.cumulative_pl,
                })
            }),
        )?;
        written.push(path);

        let path = output_dir.join(INSTRUMENT_PERFORMANCE_FILE);
        write_rows(
            &path,
            report.instruments.iter().map(|ib| InstrumentRow {
                instrument: &ib.instrument,
                total_pl: ib.total_pl,
                num_trades: ib.total_trades,
                win_rate: ib.win_rate,
                avg_holding_period: ib.avg_holding_days,
            }),
        )?;
        written.push(path);

        let path = output_dir.join(OPEN_LOTS_FILE);
        write_open_lots(fs::File::create(&path)?, &report.open_lots)?;
        written.push(path);

        let path = output_dir.join(DIAGNOSTICS_FILE);
        write_rows(
            &path,
            report.insufficient_lots().map(|d| DiagnosticRow {
                instrument: &d.instrument,
                sell_date: d.timestamp,
                requested: d.requested,
                matched: d.matched,
                unmatched: d.unmatched,
            }),
        )?;
        written.push(path);

        for p in &written {
            log::info!("wrote {}", p.display());
        }
        Ok(written)
    }
}
