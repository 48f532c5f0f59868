//! Configuration validation.
//!
//! Validates all config fields before an analysis runs.

use crate::domain::error::LedgerError;
use crate::ports::config_port::ConfigPort;
use chrono::format::{Item, StrftimeItems};

pub const INPUT_FORMATS: &[&str] = &["robinhood", "generic"];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    validate_input_format(config)?;
    validate_date_format(config)?;
    validate_input_path(config)?;
    validate_top_n(config)?;
    validate_histogram_bins(config)?;
    validate_output_directory(config)?;
    Ok(())
}

fn validate_input_format(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    match config.get_string("input", "format") {
        None => Ok(()),
        Some(f) if INPUT_FORMATS.contains(&f.trim().to_lowercase().as_str()) => Ok(()),
        Some(f) => Err(LedgerError::ConfigInvalid {
            section: "input".to_string(),
            key: "format".to_string(),
            reason: format!("unknown format '{}', expected one of {}", f, INPUT_FORMATS.join(", ")),
        }),
    }
}

fn validate_date_format(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    let Some(fmt) = config.get_string("input", "date_format") else {
        return Ok(());
    };
    let broken = fmt.trim().is_empty()
        || StrftimeItems::new(&fmt).any(|item| matches!(item, Item::Error));
    if broken {
        return Err(LedgerError::ConfigInvalid {
            section: "input".to_string(),
            key: "date_format".to_string(),
            reason: format!("invalid strftime format '{}'", fmt),
        });
    }
    Ok(())
}

fn validate_input_path(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    match config.get_string("input", "path") {
        Some(p) if p.trim().is_empty() => Err(LedgerError::ConfigInvalid {
            section: "input".to_string(),
            key: "path".to_string(),
            reason: "path must not be empty".to_string(),
        }),
        _ => Ok(()),
    }
}

fn validate_top_n(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    let value = config.get_int("analysis", "top_n", 10);
    if value < 1 {
        return Err(LedgerError::ConfigInvalid {
            section: "analysis".to_string(),
            key: "top_n".to_string(),
            reason: "top_n must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_histogram_bins(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    let value = config.get_int("analysis", "histogram_bins", 50);
    if !(1..=10_000).contains(&value) {
        return Err(LedgerError::ConfigInvalid {
            section: "analysis".to_string(),
            key: "histogram_bins".to_string(),
            reason: "histogram_bins must be between 1 and 10000".to_string(),
        });
    }
    Ok(())
}

fn validate_output_directory(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    match config.get_string("output", "directory") {
        Some(d) if d.trim().is_empty() => Err(LedgerError::ConfigInvalid {
            section: "output".to_string(),
            key: "directory".to_string(),
            reason: "directory must not be empty".to_string(),
        }),
        _ => Ok(()),
    }
}
