//! Re-print a saved report

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use sitegate_runner::SuiteReport;

use crate::output::{print_report, OutputFormat};

#[derive(Args)]
pub struct ReportArgs {
    /// Path to test-results.json
    #[arg(default_value = "test-results/test-results.json")]
    pub path: PathBuf,

    /// Recommendations to print
    #[arg(long, default_value_t = 5)]
    pub top: usize,
}

/// Prints the report; returns whether it had passed
pub fn execute(args: ReportArgs, format: OutputFormat) -> Result<bool> {
    let report = SuiteReport::load(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    print_report(&report, args.top, format);
    Ok(report.passed())
}
