#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use lotledger::domain::analysis::AnalysisReport;
use lotledger::domain::error::LedgerError;
pub use lotledger::domain::transaction::{Activity, Side, Transaction};
use lotledger::ports::report_port::ReportPort;
use lotledger::ports::transaction_port::TransactionPort;
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

pub struct MockTransactionPort {
    pub activities: Vec<Activity>,
    pub error: Option<String>,
}

impl MockTransactionPort {
    pub fn new() -> Self {
        Self {
            activities: Vec::new(),
            error: None,
        }
    }

    pub fn with_activities(mut self, activities: Vec<Activity>) -> Self {
        self.activities = activities;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl TransactionPort for MockTransactionPort {
    fn load_activities(&self) -> Result<Vec<Activity>, LedgerError> {
        if let Some(reason) = &self.error {
            return Err(LedgerError::Input {
                reason: reason.clone(),
            });
        }
        Ok(self.activities.clone())
    }
}

/// Keeps every report it is handed instead of touching the filesystem.
pub struct RecordingReportPort {
    pub reports: RefCell<Vec<AnalysisReport>>,
    pub fail_with: Option<String>,
}

impl RecordingReportPort {
    pub fn new() -> Self {
        Self {
            reports: RefCell::new(Vec::new()),
            fail_with: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reports: RefCell::new(Vec::new()),
            fail_with: Some(reason.to_string()),
        }
    }
}

impl ReportPort for RecordingReportPort {
    fn write(
        &self,
        report: &AnalysisReport,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, LedgerError> {
        if let Some(reason) = &self.fail_with {
            return Err(LedgerError::Report {
                reason: reason.clone(),
            });
        }
        self.reports.borrow_mut().push(report.clone());
        Ok(vec![output_dir.join("recorded.csv")])
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn ts(date_str: &str) -> NaiveDateTime {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn make_trade(
    date_str: &str,
    instrument: &str,
    side: Side,
    quantity: Decimal,
    price: Decimal,
) -> Transaction {
    Transaction {
        timestamp: ts(date_str),
        instrument: instrument.to_string(),
        side,
        quantity,
        price,
        fees: Decimal::ZERO,
    }
}

pub fn make_activity(
    line: u64,
    date_str: &str,
    instrument: &str,
    code: &str,
    quantity: Option<Decimal>,
    price: Option<Decimal>,
) -> Activity {
    Activity {
        line,
        timestamp: ts(date_str),
        instrument: instrument.to_string(),
        code: code.to_string(),
        quantity,
        price,
        fees: Decimal::ZERO,
    }
}

pub const SAMPLE_ROBINHOOD_CSV: &str = "\
\"Activity Date\",\"Process Date\",\"Settle Date\",\"Instrument\",\"Description\",\"Trans Code\",\"Quantity\",\"Price\",\"Amount\"
\"3/15/2024\",\"3/15/2024\",\"3/18/2024\",\"AAPL\",\"Apple\",\"Sell\",\"5\",\"$180.00\",\"$900.00\"
\"3/01/2024\",\"3/01/2024\",\"3/04/2024\",\"AAPL\",\"Apple\",\"CDIV\",\"\",\"\",\"$2.40\"
\"2/10/2024\",\"2/10/2024\",\"2/13/2024\",\"TSLA\",\"Tesla\",\"Sell\",\"80\",\"$15.00\",\"$1,200.00\"
\"1/20/2024\",\"1/20/2024\",\"1/23/2024\",\"TSLA\",\"Tesla\",\"Buy\",\"50\",\"$10.00\",\"($500.00)\"
\"1/02/2024\",\"1/02/2024\",\"1/04/2024\",\"AAPL\",\"Apple\",\"Buy\",\"10\",\"$150.00\",\"($1,500.00)\"

\"\",\"\",\"\",\"\",\"\",\"\",\"\",\"\",\"\"
\"The data provided is for informational purposes only.\"
";
