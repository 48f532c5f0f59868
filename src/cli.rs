//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvAdapter, CsvLayout};
use crate::adapters::csv_report_adapter::{write_open_lots, CsvReportAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::analysis::{self, AnalysisConfig, AnalysisReport};
use crate::domain::config_validation::validate_config;
use crate::domain::error::LedgerError;
use crate::domain::matching::match_fifo;
use crate::domain::transaction::filter_trades;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;
use crate::ports::transaction_port::TransactionPort;

#[derive(Parser, Debug)]
#[command(name = "lotledger", about = "Realized P/L from a brokerage export using FIFO lots")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Match lots, print a summary and write CSV reports
    Analyze {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        format: Option<String>,
        /// Exit non-zero if any sell could not be fully matched
        #[arg(long)]
        strict: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List lots still open after matching
    OpenLots {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(long)]
        format: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Analyze {
            config,
            input,
            output,
            format,
            strict,
        } => run_analyze(
            config.as_ref(),
            input.as_ref(),
            output.as_ref(),
            format.as_deref(),
            strict,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::OpenLots {
            config,
            input,
            format,
        } => run_open_lots(config.as_ref(), input.as_ref(), format.as_deref()),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        log::error!("{e}");
        ExitCode::from(&e)
    })
}

fn load_validated_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, ExitCode> {
    let adapter = match path {
        Some(p) => {
            log::info!("loading config from {}", p.display());
            load_config(p)?
        }
        None => FileConfigAdapter::default(),
    };
    if let Err(e) = validate_config(&adapter) {
        log::error!("{e}");
        return Err((&e).into());
    }
    Ok(adapter)
}

pub fn build_analysis_config(config: &dyn ConfigPort) -> Result<AnalysisConfig, LedgerError> {
    let top_n = config.get_int("analysis", "top_n", analysis::DEFAULT_TOP_N as i64);
    let bins = config.get_int(
        "analysis",
        "histogram_bins",
        analysis::DEFAULT_HISTOGRAM_BINS as i64,
    );
    let to_usize = |key: &str, value: i64| {
        usize::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| LedgerError::ConfigInvalid {
                section: "analysis".into(),
                key: key.into(),
                reason: "must be a positive integer".into(),
            })
    };
    Ok(AnalysisConfig {
        top_n: to_usize("top_n", top_n)?,
        histogram_bins: to_usize("histogram_bins", bins)?,
    })
}

/// Start from the named layout preset and apply any column overrides.
pub fn build_csv_layout(
    config: &dyn ConfigPort,
    format_override: Option<&str>,
) -> Result<CsvLayout, LedgerError> {
    let format = format_override
        .map(str::to_string)
        .or_else(|| config.get_string("input", "format"))
        .unwrap_or_else(|| "robinhood".to_string());

    let mut layout = CsvLayout::by_name(&format).ok_or_else(|| LedgerError::ConfigInvalid {
        section: "input".into(),
        key: "format".into(),
        reason: format!("unknown format '{}'", format),
    })?;

    let column = |key: &str| config.get_string("input", key).filter(|s| !s.trim().is_empty());
    if let Some(c) = column("date_column") {
        layout.date_column = c;
    }
    if let Some(c) = column("instrument_column") {
        layout.instrument_column = c;
    }
    if let Some(c) = column("code_column") {
        layout.code_column = c;
    }
    if let Some(c) = column("quantity_column") {
        layout.quantity_column = c;
    }
    if let Some(c) = column("price_column") {
        layout.price_column = c;
    }
    if let Some(c) = column("fees_column") {
        layout.fees_column = Some(c);
    }
    if let Some(f) = column("date_format") {
        layout.date_formats = vec![f];
    }
    Ok(layout)
}

pub fn resolve_input(
    input_override: Option<&PathBuf>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, LedgerError> {
    if let Some(p) = input_override {
        return Ok(p.clone());
    }
    config
        .get_path("input", "path")
        .ok_or_else(|| LedgerError::ConfigMissing {
            section: "input".into(),
            key: "path".into(),
        })
}

pub fn resolve_output_dir(output_override: Option<&PathBuf>, config: &dyn ConfigPort) -> PathBuf {
    output_override
        .cloned()
        .or_else(|| config.get_path("output", "directory"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn run_analyze(
    config_path: Option<&PathBuf>,
    input_override: Option<&PathBuf>,
    output_override: Option<&PathBuf>,
    format_override: Option<&str>,
    strict_flag: bool,
) -> ExitCode {
    let adapter = match load_validated_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let prepared = build_analysis_config(&adapter).and_then(|cfg| {
        let layout = build_csv_layout(&adapter, format_override)?;
        let input = resolve_input(input_override, &adapter)?;
        Ok((cfg, layout, input))
    });
    let (analysis_config, layout, input) = match prepared {
        Ok(p) => p,
        Err(e) => {
            log::error!("{e}");
            return (&e).into();
        }
    };

    let strict = strict_flag || adapter.get_bool("analysis", "strict", false);
    let output_dir = resolve_output_dir(output_override, &adapter);
    let source = CsvAdapter::new(input, layout);

    run_analysis_pipeline(
        &source,
        &CsvReportAdapter::new(),
        &analysis_config,
        &output_dir,
        strict,
    )
}

/// Load, analyse, summarise, write reports. Under `strict`, any oversold
/// sell turns into an `InsufficientLots` exit after the reports are written.
pub fn run_analysis_pipeline(
    source: &dyn TransactionPort,
    reporter: &dyn ReportPort,
    config: &AnalysisConfig,
    output_dir: &Path,
    strict: bool,
) -> ExitCode {
    let activities = match source.load_activities() {
        Ok(a) => a,
        Err(e) => {
            log::error!("{e}");
            return (&e).into();
        }
    };

    let report = analysis::analyze(&activities, config);
    print_summary(&report);

    if let Err(e) = reporter.write(&report, output_dir) {
        log::error!("{e}");
        return (&e).into();
    }
    eprintln!("\nReports written to: {}", output_dir.display());

    if strict {
        if let Some(diag) = report.insufficient_lots().next() {
            let err = LedgerError::from(diag.clone());
            log::error!("strict mode: {err}");
            return (&err).into();
        }
    }
    ExitCode::SUCCESS
}

fn signed(value: Decimal) -> String {
    if value >= Decimal::ZERO {
        format!("+${:.2}", value)
    } else {
        format!("-${:.2}", value.abs())
    }
}

pub fn print_summary(report: &AnalysisReport) {
    let m = &report.summary;

    eprintln!("\n=== Overall Performance ===");
    eprintln!("Trades loaded:      {}", report.trade_count);
    eprintln!("Total Realized P/L: {}", signed(m.total_realized_pl));
    eprintln!("Closed Positions:   {}", m.total_trades);
    eprintln!("Win Rate:           {:.2}%", m.win_rate * 100.0);
    eprintln!("Avg Holding Period: {:.0} days", m.avg_holding_days);
    eprintln!(
        "  winners {:.0} days, losers {:.0} days",
        m.avg_holding_days_won, m.avg_holding_days_lost
    );
    eprintln!("Profit Factor:      {:.2}", m.profit_factor);
    eprintln!("Largest Win:        {}", signed(m.largest_win));
    eprintln!("Largest Loss:       {}", signed(-m.largest_loss));

    if !report.top_instruments.is_empty() {
        eprintln!("\n=== Most Profitable ===");
        for ib in &report.top_instruments {
            eprintln!(
                "  {}:  {} trades, {:.1}% win rate, {}",
                ib.instrument,
                ib.total_trades,
                ib.win_rate * 100.0,
                signed(ib.total_pl),
            );
        }
        eprintln!("\n=== Least Profitable ===");
        for ib in &report.bottom_instruments {
            eprintln!(
                "  {}:  {} trades, {:.1}% win rate, {}",
                ib.instrument,
                ib.total_trades,
                ib.win_rate * 100.0,
                signed(ib.total_pl),
            );
        }
    }

    if !report.warnings.is_empty() {
        eprintln!("\n=== Data Quality ===");
        for w in &report.warnings {
            eprintln!("  {}", w);
        }
    }
    if report.non_trade_rows > 0 || report.incomplete_rows > 0 {
        eprintln!(
            "  {} non-trade rows skipped, {} incomplete trade rows dropped",
            report.non_trade_rows, report.incomplete_rows
        );
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    log::info!("validating {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&adapter) {
        log::error!("{e}");
        return (&e).into();
    }

    let layout = match build_csv_layout(&adapter, None) {
        Ok(l) => l,
        Err(e) => {
            log::error!("{e}");
            return (&e).into();
        }
    };
    let analysis_config = match build_analysis_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return (&e).into();
        }
    };

    eprintln!("\nInput:");
    match adapter.get_path("input", "path") {
        Some(p) => eprintln!("  path:        {}", p.display()),
        None => eprintln!("  path:        (pass --input)"),
    }
    eprintln!("  date:        {}", layout.date_column);
    eprintln!("  instrument:  {}", layout.instrument_column);
    eprintln!("  code:        {}", layout.code_column);
    eprintln!("  quantity:    {}", layout.quantity_column);
    eprintln!("  price:       {}", layout.price_column);
    eprintln!(
        "  fees:        {}",
        layout.fees_column.as_deref().unwrap_or("(none)")
    );
    eprintln!("  date format: {}", layout.date_formats.join(" | "));

    eprintln!("\nAnalysis:");
    eprintln!("  top_n:          {}", analysis_config.top_n);
    eprintln!("  histogram_bins: {}", analysis_config.histogram_bins);
    eprintln!(
        "  strict:         {}",
        adapter.get_bool("analysis", "strict", false)
    );

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_open_lots(
    config_path: Option<&PathBuf>,
    input_override: Option<&PathBuf>,
    format_override: Option<&str>,
) -> ExitCode {
    let adapter = match load_validated_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let source = match build_csv_layout(&adapter, format_override).and_then(|layout| {
        resolve_input(input_override, &adapter).map(|input| CsvAdapter::new(input, layout))
    }) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{e}");
            return (&e).into();
        }
    };

    run_open_lots_pipeline(&source, std::io::stdout().lock())
}

/// Match the source's trades and write the lots still open as CSV to `out`.
pub fn run_open_lots_pipeline<W: Write>(source: &dyn TransactionPort, out: W) -> ExitCode {
    let activities = match source.load_activities() {
        Ok(a) => a,
        Err(e) => {
            log::error!("{e}");
            return (&e).into();
        }
    };

    let outcome = match_fifo(&filter_trades(&activities).trades);
    if let Err(e) = write_open_lots(out, &outcome.open_lots) {
        log::error!("{e}");
        return (&e).into();
    }
    eprintln!("{} open lots", outcome.open_lots.len());
    ExitCode::SUCCESS
}
