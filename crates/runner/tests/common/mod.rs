//! Shared helpers for fixture-driven tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sitegate_runner::analysis::MockAnalysisClient;
use sitegate_runner::checkers::CheckContext;
use sitegate_runner::config::BrowserConfig;
use sitegate_runner::inspector::{BrowserLauncher, Engine, FixtureLauncher, FixtureSite};
use url::Url;

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

pub fn load_site(name: &str) -> FixtureSite {
    FixtureSite::load(&fixture_path(name)).expect("fixture should load")
}

/// Check context over a fixture site, plus the launcher for close assertions
pub async fn context(site: FixtureSite, target: &str) -> (CheckContext, FixtureLauncher) {
    let launcher = FixtureLauncher::new(site);
    let session = launcher.launch().await.expect("fixture launch");
    let browser = BrowserConfig::default();
    let ctx = CheckContext {
        target: Url::parse(target).expect("valid target"),
        reference: None,
        session,
        analysis: Arc::new(MockAnalysisClient::default()),
        engine: Engine::Chromium,
        navigation: browser.navigate_options(),
        performance_timeout: browser.performance_timeout(),
        artifacts_dir: None,
    };
    (ctx, launcher)
}
