//! CSV brokerage export adapter.
//!
//! Turns export rows into [`Activity`] records. Columns are addressed by
//! header name so that column order does not matter; the two built-in
//! layouts cover a Robinhood activity export and a plain generic layout.

use crate::domain::error::LedgerError;
use crate::domain::transaction::Activity;
use crate::ports::transaction_port::TransactionPort;
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct CsvLayout {
    pub date_column: String,
    pub instrument_column: String,
    pub code_column: String,
    pub quantity_column: String,
    pub price_column: String,
    pub fees_column: Option<String>,
    pub date_formats: Vec<String>,
}

impl CsvLayout {
    pub fn robinhood() -> Self {
        CsvLayout {
            date_column: "Activity Date".into(),
            instrument_column: "Instrument".into(),
            code_column: "Trans Code".into(),
            quantity_column: "Quantity".into(),
            price_column: "Price".into(),
            fees_column: None,
            date_formats: vec!["%m/%d/%Y".into()],
        }
    }

    pub fn generic() -> Self {
        CsvLayout {
            date_column: "timestamp".into(),
            instrument_column: "instrument".into(),
            code_column: "side".into(),
            quantity_column: "quantity".into(),
            price_column: "price".into(),
            fees_column: Some("fees".into()),
            date_formats: vec!["%Y-%m-%d %H:%M:%S".into(), "%Y-%m-%d".into()],
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "robinhood" => Some(Self::robinhood()),
            "generic" => Some(Self::generic()),
            _ => None,
        }
    }
}

struct ColumnIndex {
    date: usize,
    instrument: usize,
    code: usize,
    quantity: usize,
    price: usize,
    fees: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, layout: &CsvLayout) -> Result<Self, LedgerError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| LedgerError::Input {
                    reason: format!("missing column '{}'", name),
                })
        };
        Ok(ColumnIndex {
            date: find(&layout.date_column)?,
            instrument: find(&layout.instrument_column)?,
            code: find(&layout.code_column)?,
            quantity: find(&layout.quantity_column)?,
            price: find(&layout.price_column)?,
            fees: match &layout.fees_column {
                Some(name) => find(name).ok(),
                None => None,
            },
        })
    }
}

pub struct CsvAdapter {
    path: PathBuf,
    layout: CsvLayout,
}

impl CsvAdapter {
    pub fn new(path: PathBuf, layout: CsvLayout) -> Self {
        Self { path, layout }
    }
}

impl TransactionPort for CsvAdapter {
    fn load_activities(&self) -> Result<Vec<Activity>, LedgerError> {
        let file = File::open(&self.path).map_err(|e| LedgerError::Input {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        log::info!("reading activity from {}", self.path.display());
        parse_activities(file, &self.layout)
    }
}

/// Parse every data row of a CSV export.
///
/// Rows with no date and no instrument (trailing disclaimers, blank lines)
/// are skipped. A row with an unparseable date is a
/// [`LedgerError::MalformedTransaction`]. Unparseable quantities or prices
/// become `None` and are left for the trade filter to discard.
pub fn parse_activities<R: Read>(reader: R, layout: &CsvLayout) -> Result<Vec<Activity>, LedgerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| LedgerError::Input {
            reason: format!("CSV header error: {}", e),
        })?
        .clone();
    let cols = ColumnIndex::resolve(&headers, layout)?;

    let mut activities = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| LedgerError::Input {
            reason: format!("CSV parse error: {}", e),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let date_str = field(cols.date);
        let instrument = field(cols.instrument);
        if date_str.is_empty() && instrument.is_empty() {
            log::debug!("line {}: skipping row without date or instrument", line);
            continue;
        }
        if record.len() <= cols.code.max(cols.date) {
            log::debug!("line {}: skipping short row", line);
            continue;
        }

        let timestamp = parse_timestamp(date_str, &layout.date_formats).ok_or_else(|| {
            LedgerError::MalformedTransaction {
                line,
                reason: format!("invalid date '{}'", date_str),
            }
        })?;

        let fees = cols
            .fees
            .and_then(|idx| parse_amount(field(idx)))
            .map(|f| f.abs())
            .unwrap_or(Decimal::ZERO);

        activities.push(Activity {
            line,
            timestamp,
            instrument: instrument.to_string(),
            code: field(cols.code).to_string(),
            quantity: parse_amount(field(cols.quantity)),
            price: parse_amount(field(cols.price)),
            fees,
        });
    }

    log::info!("parsed {} activity rows", activities.len());
    Ok(activities)
}

/// Parse a brokerage-formatted number: `$1,234.50`, `($12.00)`, `-3`,
/// `10S`. Blank or unparseable text is `None`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let mut s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let negative = s.starts_with('(') && s.ends_with(')');
    if negative {
        s = &s[1..s.len() - 1];
    }

    let cleaned: String = s
        .trim_end_matches(['S', 's'])
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;
    Some(if negative { -value } else { value })
}

/// Try each format as a date-time, then as a bare date at midnight.
pub fn parse_timestamp(raw: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(raw, fmt).ok().or_else(|| {
            NaiveDate::parse_from_str(raw, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}
