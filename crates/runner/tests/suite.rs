//! Whole-suite runs through the orchestrator over fixture sites

mod common;

use std::sync::Arc;

use sitegate_common::{Category, IssueType, Severity, SeverityCounts};
use sitegate_runner::analysis::MockAnalysisClient;
use sitegate_runner::inspector::FixtureLauncher;
use sitegate_runner::{Orchestrator, SuiteConfig, SuiteReport};

use common::load_site;

fn config(dir: &tempfile::TempDir) -> SuiteConfig {
    let mut config = SuiteConfig {
        output_dir: dir.path().join("results"),
        ..Default::default()
    };
    config.browser.screenshot_dir = dir.path().join("screenshots");
    config
}

async fn run(config: SuiteConfig, fixture: &str, target: &str) -> (SuiteReport, FixtureLauncher) {
    let launcher = FixtureLauncher::new(load_site(fixture));
    let orchestrator = Orchestrator::new(
        config,
        Arc::new(launcher.clone()),
        Arc::new(MockAnalysisClient::default()),
    );
    let report = orchestrator.run(target).await.expect("suite should run");
    (report, launcher)
}

#[tokio::test]
async fn test_full_suite_invariants() {
    let dir = tempfile::tempdir().unwrap();
    let (report, launcher) = run(config(&dir), "well_formed.json", "https://studio.example/").await;

    let order: Vec<Category> = report.tests.iter().map(|t| t.category).collect();
    let expected: Vec<Category> = Category::ALL
        .iter()
        .copied()
        .filter(|c| *c != Category::LayoutMatch)
        .collect();
    assert_eq!(order, expected);

    // tallies are an exact partition of the issue population
    let recount: SeverityCounts = report
        .tests
        .iter()
        .flat_map(|t| t.result.issues())
        .map(|i| &i.severity)
        .collect();
    assert_eq!(report.summary.issue_counts, recount);
    assert_eq!(report.summary.total_issues, report.issue_population());

    for test in &report.tests {
        if test.passed {
            assert_eq!(test.result.blocking_issues().count(), 0, "{}", test.name);
        }
    }
    assert_eq!(
        report.summary.passed_tests + report.summary.failed_tests,
        report.summary.total_tests
    );
    assert_eq!(launcher.close_count(), 1);

    let written = SuiteReport::load(&dir.path().join("results/test-results.json")).unwrap();
    assert_eq!(written.run_id, report.run_id);
    assert_eq!(written.summary, report.summary);
    assert_eq!(written.tests.len(), report.tests.len());
}

#[tokio::test]
async fn test_layout_match_with_reference() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&dir);
    cfg.reference_url = Some("https://studio.example/".into());
    cfg.only = vec![Category::LayoutMatch];

    let (report, _) = run(cfg, "well_formed.json", "https://studio.example/").await;
    assert_eq!(report.tests.len(), 1);
    let result = &report.tests[0].result;
    assert!(!result.passed());
    assert!(result.issues().iter().any(|i| i.kind == IssueType::LayoutMismatch));
    assert!(dir.path().join("screenshots/layout-target.png").exists());
    assert_eq!(report.reference_url.as_deref(), Some("https://studio.example/"));
}

#[tokio::test]
async fn test_gates_fail_despite_passing_tests() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&dir);
    cfg.only = vec![Category::Security];
    cfg.security.blocking_severity = Severity::Error;

    let (report, _) = run(cfg, "plain_http.json", "http://legacy.example/").await;
    assert!(report.tests[0].passed);
    assert!(report.summary.issue_counts.critical >= 1);
    assert!(!report.summary.quality_gates_passed);
    assert!(!report.summary.overall_passed);
    assert!(report.summary.gate_violations[0].contains("critical"));
}

#[tokio::test]
async fn test_recommendations_follow_issues() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&dir);
    cfg.only = vec![Category::Seo, Category::Images];

    let (report, _) = run(cfg, "bare_page.json", "https://bare.example/").await;
    let first = &report.recommendations[0];
    assert_eq!(first.priority, sitegate_runner::Priority::Critical);
    let alt = report
        .recommendations
        .iter()
        .find(|r| r.issue_type == IssueType::MissingAlt)
        .unwrap();
    assert_eq!(alt.categories, vec![Category::Images]);
    assert!(report
        .recommendations
        .windows(2)
        .all(|w| w[0].priority <= w[1].priority));
}

#[tokio::test]
async fn test_navigation_failure_becomes_test_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&dir);
    cfg.only = vec![Category::Images, Category::Typography];

    let (report, launcher) = run(cfg, "bare_page.json", "https://missing.example/").await;
    assert_eq!(report.tests.len(), 2);
    for test in &report.tests {
        assert!(!test.passed);
        assert!(test.error.is_some());
        assert_eq!(test.result.issues()[0].kind, IssueType::TestError);
        assert_eq!(test.result.issues()[0].severity, Severity::Error);
    }
    assert_eq!(launcher.close_count(), 1);
    assert!(!report.passed());
}
