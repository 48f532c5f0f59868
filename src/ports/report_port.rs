//! Report output port trait.

use crate::domain::analysis::AnalysisReport;
use crate::domain::error::LedgerError;
use std::path::{Path, PathBuf};

/// Port for writing analysis results. Returns the paths written.
pub trait ReportPort {
    fn write(
        &self,
        report: &AnalysisReport,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, LedgerError>;
}
