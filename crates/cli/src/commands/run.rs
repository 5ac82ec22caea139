//! Suite runs
//!
//! Loads configuration, applies flag overrides, validates once, then hands the
//! suite to the orchestrator. The report is written by the orchestrator before
//! anything is printed here.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use sitegate_common::{Category, WcagLevel};
use sitegate_runner::inspector::{BrowserLauncher, FixtureLauncher, FixtureSite, PlaywrightLauncher};
use sitegate_runner::{build_client, AnalysisMode, Orchestrator, SuiteConfig};

use crate::logging;
use crate::output::{print_report, OutputFormat};

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Page to test
    pub url: String,

    /// Reference page for layout comparison
    #[arg(long)]
    pub reference_url: Option<String>,

    /// WCAG conformance level for accessibility checks (A, AA, AAA)
    #[arg(long)]
    pub wcag_level: Option<WcagLevel>,

    /// Minimum content quality score (0-10)
    #[arg(long)]
    pub min_quality_score: Option<f64>,

    /// Stop a phase after its first failing checker
    #[arg(long)]
    pub fail_fast: bool,

    /// Run every checker one after another
    #[arg(long)]
    pub sequential: bool,

    /// Report and log directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Analysis backend (mock, local, http, disabled)
    #[arg(long)]
    pub analysis_mode: Option<AnalysisMode>,

    /// Analysis service base URL, for http mode
    #[arg(long)]
    pub analysis_endpoint: Option<String>,

    /// Only run these categories (repeatable)
    #[arg(long = "only")]
    pub only: Vec<Category>,

    /// Serve pages from a JSON fixture instead of a real browser
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Recommendations to print
    #[arg(long)]
    pub top: Option<usize>,
}

impl RunArgs {
    /// Fold flag values over file configuration
    pub fn apply(&self, config: &mut SuiteConfig) {
        if let Some(reference) = &self.reference_url {
            config.reference_url = Some(reference.clone());
        }
        if let Some(level) = self.wcag_level {
            config.accessibility.wcag_level = level;
        }
        if let Some(score) = self.min_quality_score {
            config.content.min_quality_score = score;
        }
        if self.fail_fast {
            config.fail_fast = true;
        }
        if self.sequential {
            config.parallel = false;
        }
        if let Some(dir) = &self.output_dir {
            config.browser.screenshot_dir = dir.join("screenshots");
            config.output_dir = dir.clone();
        }
        if let Some(mode) = self.analysis_mode {
            config.analysis.mode = mode;
        }
        if let Some(endpoint) = &self.analysis_endpoint {
            config.analysis.endpoint = Some(endpoint.clone());
        }
        if !self.only.is_empty() {
            config.only = self.only.clone();
        }
        if let Some(top) = self.top {
            config.top_recommendations = top;
        }
    }
}

pub async fn execute(args: RunArgs, config_path: &Path, format: OutputFormat, verbose: bool) -> Result<bool> {
    let mut config = SuiteConfig::load(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    args.apply(&mut config);
    run_suite(config, &args, format, verbose).await
}

/// Validate, run and print; `Ok(false)` means the suite ran and failed
pub async fn run_suite(config: SuiteConfig, args: &RunArgs, format: OutputFormat, verbose: bool) -> Result<bool> {
    logging::init_suite(verbose, &config.log_path())?;
    config.validate().context("invalid configuration")?;

    let launcher: Arc<dyn BrowserLauncher> = match &args.fixture {
        Some(path) => {
            info!("Using fixture site {}", path.display());
            let site = FixtureSite::load(path).with_context(|| format!("loading fixture {}", path.display()))?;
            Arc::new(FixtureLauncher::new(site))
        }
        None => Arc::new(PlaywrightLauncher::new(config.browser.clone())),
    };
    let analysis = build_client(&config.analysis).context("configuring analysis client")?;
    info!("Analysis backend: {}", analysis.name());

    let top = config.top_recommendations;
    let orchestrator = Orchestrator::new(config, launcher, analysis);
    let report = orchestrator.run(&args.url).await?;

    print_report(&report, top, format);
    Ok(report.passed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RunArgs,
    }

    #[test]
    fn test_flags_override_file_values() {
        let harness = Harness::parse_from([
            "sitegate",
            "https://example.com",
            "--wcag-level",
            "AAA",
            "--sequential",
            "--only",
            "seo",
            "--only",
            "a11y",
            "--output-dir",
            "/tmp/out",
            "--analysis-mode",
            "disabled",
        ]);
        let mut config = SuiteConfig::default();
        harness.args.apply(&mut config);

        assert_eq!(config.accessibility.wcag_level, WcagLevel::AAA);
        assert!(!config.parallel);
        assert!(!config.fail_fast);
        assert_eq!(config.only, vec![Category::Seo, Category::Accessibility]);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.analysis.mode, AnalysisMode::Disabled);
    }

    #[test]
    fn test_unset_flags_keep_defaults() {
        let harness = Harness::parse_from(["sitegate", "https://example.com"]);
        let mut config = SuiteConfig::default();
        harness.args.apply(&mut config);
        assert!(config.parallel);
        assert!(config.only.is_empty());
        assert_eq!(config.top_recommendations, 5);
    }
}
