//! Domain error types.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// A Sell that asked for more quantity than the open lots could cover.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "insufficient lots for {instrument} at {timestamp}: sold {requested}, matched {matched}, unmatched {unmatched}"
)]
pub struct InsufficientLots {
    pub instrument: String,
    pub timestamp: NaiveDateTime,
    pub requested: Decimal,
    pub matched: Decimal,
    pub unmatched: Decimal,
}

/// Top-level error type for lotledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("input error: {reason}")]
    Input { reason: String },

    #[error("malformed transaction on line {line}: {reason}")]
    MalformedTransaction { line: u64, reason: String },

    #[error(transparent)]
    InsufficientLots(#[from] InsufficientLots),

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&LedgerError> for std::process::ExitCode {
    fn from(err: &LedgerError) -> Self {
        let code: u8 = match err {
            LedgerError::Io(_) | LedgerError::Report { .. } => 1,
            LedgerError::ConfigParse { .. }
            | LedgerError::ConfigMissing { .. }
            | LedgerError::ConfigInvalid { .. } => 2,
            LedgerError::Input { .. } => 3,
            LedgerError::MalformedTransaction { .. } => 4,
            LedgerError::InsufficientLots(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
