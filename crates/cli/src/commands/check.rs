//! Single-checker runs

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

use sitegate_common::Category;
use sitegate_runner::SuiteConfig;

use super::run::{run_suite, RunArgs};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct CheckArgs {
    /// Checker to run (accessibility, seo, security, performance, content, images,
    /// typography, interactivity, responsive, cross-browser, layout)
    pub category: Category,

    #[command(flatten)]
    pub run: RunArgs,
}

pub async fn execute(args: CheckArgs, config_path: &Path, format: OutputFormat, verbose: bool) -> Result<bool> {
    let mut config = SuiteConfig::load(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    args.run.apply(&mut config);
    config.only = vec![args.category];
    enable(&mut config, args.category);
    run_suite(config, &args.run, format, verbose).await
}

/// Asking for a checker by name runs it even if the file disabled it
fn enable(config: &mut SuiteConfig, category: Category) {
    match category {
        Category::Accessibility => config.accessibility.enabled = true,
        Category::Seo => config.seo.enabled = true,
        Category::Security => config.security.enabled = true,
        Category::Performance => config.performance.enabled = true,
        Category::ContentQuality => config.content.enabled = true,
        Category::Images => config.images.enabled = true,
        Category::Typography => config.typography.enabled = true,
        Category::Interactivity => config.interactivity.enabled = true,
        Category::Responsive => config.responsive.enabled = true,
        Category::CrossBrowser => config.cross_browser.enabled = true,
        Category::LayoutMatch => config.layout.enabled = true,
    }
}
