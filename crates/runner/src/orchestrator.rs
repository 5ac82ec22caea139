//! Suite orchestrator
//!
//! Launches one browser session, runs the selected checkers phase by phase and
//! hands every outcome to the aggregator. Phase N+1 starts only after every
//! checker of phase N has settled. Fast and medium phases run their checkers
//! concurrently unless the run is sequential or fail-fast; the slow phase is
//! always sequential.
//!
//! A checker error never escapes: it becomes a failing entry in the report.
//! Only a browser that cannot be launched, an invalid URL or an unwritable
//! report end the run with an error. The session is closed exactly once,
//! whatever the checkers did.

use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use sitegate_common::{CategoryResult, Issue, IssueType, Metrics, Phase, Severity};

use crate::aggregator::{aggregate, RunInfo, SuiteReport, TestEntry};
use crate::analysis::AnalysisClient;
use crate::checkers::{self, CheckContext, Checker};
use crate::config::SuiteConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::inspector::BrowserLauncher;

pub struct Orchestrator {
    config: SuiteConfig,
    launcher: Arc<dyn BrowserLauncher>,
    analysis: Arc<dyn AnalysisClient>,
    checkers: Vec<Box<dyn Checker>>,
}

impl Orchestrator {
    /// Orchestrator over every checker the configuration selects
    pub fn new(config: SuiteConfig, launcher: Arc<dyn BrowserLauncher>, analysis: Arc<dyn AnalysisClient>) -> Self {
        let checkers = checkers::from_config(&config);
        Self {
            config,
            launcher,
            analysis,
            checkers,
        }
    }

    /// Replace the checker list; dispatch order is the order given here
    pub fn with_checkers(mut self, checkers: Vec<Box<dyn Checker>>) -> Self {
        self.checkers = checkers;
        self
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Run the suite against `target` and write the report
    pub async fn run(&self, target: &str) -> RunnerResult<SuiteReport> {
        let target_url = parse_url(target)?;
        let reference = self.config.reference_url.as_deref().map(parse_url).transpose()?;
        let run = RunInfo::start(target_url.as_str(), reference.as_ref().map(Url::to_string));

        info!("Running {} checker(s) against {}", self.checkers.len(), target_url);
        let session = self.launcher.launch().await.map_err(RunnerError::BrowserLaunch)?;

        let ctx = CheckContext {
            target: target_url,
            reference,
            session: session.clone(),
            analysis: self.analysis.clone(),
            engine: self.config.browser.engine,
            navigation: self.config.browser.navigate_options(),
            performance_timeout: self.config.browser.performance_timeout(),
            artifacts_dir: Some(self.artifacts_dir()),
        };

        let entries = self.run_phases(&ctx).await;
        session.close().await;

        let report = aggregate(run, entries, &self.config.gates);
        info!(
            "Test Results: {} passed, {} failed, {} issues ({} ms)",
            report.summary.passed_tests,
            report.summary.failed_tests,
            report.summary.total_issues,
            report.summary.duration_ms
        );
        for violation in &report.summary.gate_violations {
            warn!("Quality gate: {}", violation);
        }
        report.write(&self.config.output_dir)?;
        Ok(report)
    }

    fn artifacts_dir(&self) -> PathBuf {
        self.config.browser.screenshot_dir.clone()
    }

    async fn run_phases(&self, ctx: &CheckContext) -> Vec<TestEntry> {
        let mut entries = Vec::with_capacity(self.checkers.len());
        for phase in Phase::ALL {
            let members: Vec<&dyn Checker> = self
                .checkers
                .iter()
                .map(Box::as_ref)
                .filter(|c| c.category().phase() == phase)
                .collect();
            if members.is_empty() {
                continue;
            }

            let concurrent = self.config.parallel && !self.config.fail_fast && phase != Phase::Slow;
            info!("Phase {}: {} checker(s){}", phase, members.len(), if concurrent { " in parallel" } else { "" });

            if concurrent {
                // join_all yields in submission order, not completion order
                entries.extend(join_all(members.iter().map(|c| self.run_checker(*c, ctx))).await);
            } else {
                for (i, checker) in members.iter().enumerate() {
                    let entry = self.run_checker(*checker, ctx).await;
                    let stop = self.config.fail_fast && !entry_passed(&entry);
                    entries.push(entry);
                    if stop {
                        let skipped = members.len() - i - 1;
                        if skipped > 0 {
                            warn!("Fail-fast: skipping {} remaining {} checker(s)", skipped, phase);
                        }
                        break;
                    }
                }
            }
        }
        entries
    }

    async fn run_checker(&self, checker: &dyn Checker, ctx: &CheckContext) -> TestEntry {
        let category = checker.category();
        let started = Instant::now();
        debug!("Running {}", category.title());

        let outcome = tokio::time::timeout(self.config.checker_timeout(), checker.check(ctx)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let entry = match outcome {
            Ok(Ok(result)) => TestEntry::completed(result, elapsed_ms),
            Ok(Err(e)) => TestEntry::failed(category, e.to_string(), elapsed_ms),
            Err(_) => {
                let issue = Issue::new(
                    IssueType::OperationTimeout,
                    Severity::Info,
                    format!(
                        "{} did not finish within {} ms",
                        category.title(),
                        self.config.checker_timeout_ms
                    ),
                );
                let result = CategoryResult::evaluate(category, checker.blocking_severity(), vec![issue], Metrics::new());
                TestEntry::completed(result, elapsed_ms)
            }
        };

        match &entry.outcome {
            Ok(result) if result.passed() => info!("✓ {} ({} ms)", category.title(), elapsed_ms),
            Ok(result) => error!(
                "✗ {} - {} blocking issue(s) ({} ms)",
                category.title(),
                result.blocking_issues().count(),
                elapsed_ms
            ),
            Err(message) => error!("✗ {} - {}", category.title(), message),
        }
        entry
    }
}

fn entry_passed(entry: &TestEntry) -> bool {
    matches!(&entry.outcome, Ok(result) if result.passed())
}

fn parse_url(raw: &str) -> RunnerResult<Url> {
    let url = Url::parse(raw).map_err(|e| RunnerError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(RunnerError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sitegate_common::Category;
    use std::time::Duration;

    use crate::analysis::MockAnalysisClient;
    use crate::error::{InspectorError, InspectorResult};
    use crate::inspector::{DomSnapshot, FixtureLauncher, FixtureSite, PageFixture};

    const URL: &str = "https://example.com/";

    #[derive(Clone, Copy)]
    enum Behaviour {
        Pass,
        Fail,
        Error,
        Sleep(u64),
        /// Opens the target and never finishes
        Hang,
    }

    struct StubChecker {
        category: Category,
        behaviour: Behaviour,
        log: Arc<Mutex<Vec<Category>>>,
    }

    #[async_trait]
    impl Checker for StubChecker {
        fn category(&self) -> Category {
            self.category
        }

        fn blocking_severity(&self) -> Severity {
            Severity::Serious
        }

        async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult> {
            self.log.lock().push(self.category);
            let issues = match self.behaviour {
                Behaviour::Pass => vec![],
                Behaviour::Fail => vec![Issue::new(IssueType::NoMain, Severity::Serious, "no main")],
                Behaviour::Error => {
                    return Err(InspectorError::Evaluation {
                        script: "snapshot".into(),
                        message: "boom".into(),
                    })
                }
                Behaviour::Sleep(ms) => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    vec![]
                }
                Behaviour::Hang => {
                    let (_page, _) = ctx.open_target().await?;
                    std::future::pending::<()>().await;
                    vec![]
                }
            };
            Ok(CategoryResult::evaluate(self.category, Severity::Serious, issues, Metrics::new()))
        }
    }

    fn stubs(plan: &[(Category, Behaviour)], log: &Arc<Mutex<Vec<Category>>>) -> Vec<Box<dyn Checker>> {
        plan.iter()
            .map(|(category, behaviour)| {
                Box::new(StubChecker {
                    category: *category,
                    behaviour: *behaviour,
                    log: log.clone(),
                }) as Box<dyn Checker>
            })
            .collect()
    }

    fn orchestrator(config: SuiteConfig, site: FixtureSite) -> (Orchestrator, FixtureLauncher) {
        let launcher = FixtureLauncher::new(site);
        let orch = Orchestrator::new(config, Arc::new(launcher.clone()), Arc::new(MockAnalysisClient::default()));
        (orch, launcher)
    }

    fn site() -> FixtureSite {
        FixtureSite::from_page(PageFixture::new(URL, DomSnapshot::default()))
    }

    fn config(dir: &tempfile::TempDir) -> SuiteConfig {
        SuiteConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_checker_error_does_not_cascade() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (orch, launcher) = orchestrator(config(&dir), site());
        let orch = orch.with_checkers(stubs(
            &[
                (Category::Images, Behaviour::Pass),
                (Category::Typography, Behaviour::Error),
                (Category::Interactivity, Behaviour::Pass),
                (Category::ContentQuality, Behaviour::Pass),
            ],
            &log,
        ));

        let report = orch.run(URL).await.unwrap();
        assert_eq!(report.tests.len(), 4);
        assert!(!report.tests[1].passed);
        assert!(report.tests[1].error.as_deref().unwrap_or_default().contains("boom"));
        assert!(report.tests.iter().enumerate().filter(|(i, _)| *i != 1).all(|(_, t)| t.passed));
        assert_eq!(launcher.close_count(), 1);
        assert!(dir.path().join(crate::aggregator::REPORT_FILE).exists());
    }

    #[tokio::test]
    async fn test_parallel_results_keep_dispatch_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (orch, _) = orchestrator(config(&dir), site());
        let orch = orch.with_checkers(stubs(
            &[
                (Category::Images, Behaviour::Sleep(40)),
                (Category::Typography, Behaviour::Sleep(1)),
                (Category::Accessibility, Behaviour::Pass),
            ],
            &log,
        ));

        let report = orch.run(URL).await.unwrap();
        let order: Vec<Category> = report.tests.iter().map(|t| t.category).collect();
        assert_eq!(order, vec![Category::Images, Category::Typography, Category::Accessibility]);
        // the medium phase starts only after the fast phase settled
        assert_eq!(log.lock().last(), Some(&Category::Accessibility));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_current_phase_only() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let cfg = SuiteConfig {
            fail_fast: true,
            ..config(&dir)
        };
        let (orch, _) = orchestrator(cfg, site());
        let orch = orch.with_checkers(stubs(
            &[
                (Category::Images, Behaviour::Fail),
                (Category::Typography, Behaviour::Pass),
                (Category::Seo, Behaviour::Pass),
            ],
            &log,
        ));

        let report = orch.run(URL).await.unwrap();
        let order: Vec<Category> = report.tests.iter().map(|t| t.category).collect();
        assert_eq!(order, vec![Category::Images, Category::Seo]);
        assert!(!report.passed());
    }

    #[tokio::test]
    async fn test_checker_timeout_is_informational() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let cfg = SuiteConfig {
            checker_timeout_ms: 10,
            ..config(&dir)
        };
        let (orch, _) = orchestrator(cfg, site());
        let orch = orch.with_checkers(stubs(&[(Category::Performance, Behaviour::Sleep(500))], &log));

        let report = orch.run(URL).await.unwrap();
        let result = &report.tests[0].result;
        assert!(result.passed());
        assert_eq!(result.issues()[0].kind, IssueType::OperationTimeout);
    }

    #[tokio::test]
    async fn test_timed_out_checker_releases_its_page() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let cfg = SuiteConfig {
            checker_timeout_ms: 20,
            ..config(&dir)
        };
        let (orch, launcher) = orchestrator(cfg, site());
        let orch = orch.with_checkers(stubs(&[(Category::Images, Behaviour::Hang)], &log));

        let report = orch.run(URL).await.unwrap();
        assert_eq!(report.tests[0].result.issues()[0].kind, IssueType::OperationTimeout);
        assert_eq!(launcher.pages_opened(), 1);
        assert_eq!(launcher.pages_open(), 0);
        assert_eq!(launcher.close_count(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let broken = FixtureSite {
            launch_error: Some("no browser".into()),
            ..site()
        };
        let (orch, launcher) = orchestrator(config(&dir), broken);
        let err = orch.run(URL).await.unwrap_err();
        assert!(matches!(err, RunnerError::BrowserLaunch(_)));
        assert_eq!(launcher.close_count(), 0);
    }

    #[tokio::test]
    async fn test_rejects_non_http_target() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, _) = orchestrator(config(&dir), site());
        assert!(matches!(orch.run("ftp://example.com").await, Err(RunnerError::InvalidUrl { .. })));
        assert!(matches!(orch.run("not a url").await, Err(RunnerError::InvalidUrl { .. })));
    }
}
