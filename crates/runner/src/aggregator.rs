//! Suite report assembly
//!
//! The orchestrator hands over one [`TestEntry`] per dispatched checker, in
//! dispatch order. Aggregation never fails: an entry whose checker errored is
//! folded in as a failing result carrying a `test_error` issue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use sitegate_common::{Category, CategoryResult, GateLimits, SeverityCounts};

use crate::error::{RunnerError, RunnerResult};
use crate::recommendations::{recommend, Recommendation};

pub const REPORT_FILE: &str = "test-results.json";

/// What one checker produced
#[derive(Debug, Clone)]
pub struct TestEntry {
    pub category: Category,
    pub outcome: Result<CategoryResult, String>,
    pub elapsed_ms: u64,
}

impl TestEntry {
    pub fn completed(result: CategoryResult, elapsed_ms: u64) -> Self {
        Self {
            category: result.category(),
            outcome: Ok(result),
            elapsed_ms,
        }
    }

    pub fn failed(category: Category, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            category,
            outcome: Err(error.into()),
            elapsed_ms,
        }
    }
}

/// One line of the report's `tests` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub name: String,
    pub category: Category,
    pub passed: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub result: CategoryResult,
}

impl From<TestEntry> for TestReport {
    fn from(entry: TestEntry) -> Self {
        let (result, error) = match entry.outcome {
            Ok(result) => (result, None),
            Err(message) => (CategoryResult::from_error(entry.category, message.clone()), Some(message)),
        };
        Self {
            name: entry.category.title().to_string(),
            category: entry.category,
            passed: result.passed(),
            duration_ms: entry.elapsed_ms,
            error,
            result,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub total_issues: usize,
    pub issue_counts: SeverityCounts,
    pub quality_gates_passed: bool,
    pub gate_violations: Vec<String>,
    pub overall_passed: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
    pub tests: Vec<TestReport>,
    pub summary: Summary,
    pub recommendations: Vec<Recommendation>,
}

/// Run-level facts that are not derived from checker output
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub url: String,
    pub reference_url: Option<String>,
}

impl RunInfo {
    pub fn start(url: impl Into<String>, reference_url: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            url: url.into(),
            reference_url,
        }
    }
}

/// Fold checker entries into a report
pub fn aggregate(info: RunInfo, entries: Vec<TestEntry>, gates: &GateLimits) -> SuiteReport {
    let tests: Vec<TestReport> = entries.into_iter().map(TestReport::from).collect();

    let counts: SeverityCounts = tests
        .iter()
        .flat_map(|t| t.result.issues())
        .map(|issue| &issue.severity)
        .collect();
    let gate = gates.evaluate(&counts);
    let passed_tests = tests.iter().filter(|t| t.passed).count();
    let finished_at = Utc::now();

    let summary = Summary {
        total_tests: tests.len(),
        passed_tests,
        failed_tests: tests.len() - passed_tests,
        total_issues: counts.total(),
        issue_counts: counts,
        quality_gates_passed: gate.passed,
        overall_passed: passed_tests == tests.len() && gate.passed,
        gate_violations: gate.violations,
        duration_ms: (finished_at - info.started_at).num_milliseconds().max(0) as u64,
    };
    let recommendations = recommend(tests.iter().map(|t| &t.result));

    SuiteReport {
        run_id: info.run_id,
        timestamp: info.started_at,
        finished_at,
        url: info.url,
        reference_url: info.reference_url,
        tests,
        summary,
        recommendations,
    }
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.summary.overall_passed
    }

    /// Issue total recomputed from the test results
    pub fn issue_population(&self) -> usize {
        self.tests.iter().map(|t| t.result.issues().len()).sum()
    }

    pub fn load(path: &Path) -> RunnerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the report as pretty JSON into `output_dir`
    pub fn write(&self, output_dir: &Path) -> RunnerResult<PathBuf> {
        let path = output_dir.join(REPORT_FILE);
        let write_err = |source| RunnerError::ReportWrite {
            path: path.display().to_string(),
            source,
        };
        std::fs::create_dir_all(output_dir).map_err(write_err)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(write_err)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitegate_common::{Issue, IssueType, Metrics, Severity};

    fn info() -> RunInfo {
        RunInfo::start("https://example.com/", None)
    }

    fn result(category: Category, severities: &[Severity]) -> CategoryResult {
        let issues = severities
            .iter()
            .map(|s| Issue::new(IssueType::MissingFavicon, *s, "x"))
            .collect();
        CategoryResult::evaluate(category, category.default_blocking_severity(), issues, Metrics::new())
    }

    #[test]
    fn test_counts_match_population() {
        let entries = vec![
            TestEntry::completed(result(Category::Seo, &[Severity::Minor, Severity::Moderate]), 10),
            TestEntry::failed(Category::Security, "page crashed", 5),
            TestEntry::completed(result(Category::Images, &[Severity::Info, Severity::Serious, Severity::High]), 7),
        ];
        let report = aggregate(info(), entries, &GateLimits::default());

        assert_eq!(report.summary.total_issues, report.issue_population());
        assert_eq!(report.summary.total_issues, 6);
        assert_eq!(report.summary.issue_counts.error, 1);
        assert_eq!(report.summary.issue_counts.serious, 1);
        assert_eq!(report.summary.issue_counts.high, 1);
    }

    #[test]
    fn test_error_entry_keeps_order() {
        let entries = vec![
            TestEntry::completed(result(Category::Images, &[]), 1),
            TestEntry::failed(Category::Typography, "boom", 2),
            TestEntry::completed(result(Category::Interactivity, &[]), 3),
        ];
        let report = aggregate(info(), entries, &GateLimits::default());
        let categories: Vec<Category> = report.tests.iter().map(|t| t.category).collect();
        assert_eq!(categories, vec![Category::Images, Category::Typography, Category::Interactivity]);

        let failed = &report.tests[1];
        assert!(!failed.passed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert_eq!(failed.result.issues()[0].kind, IssueType::TestError);
        assert_eq!(report.summary.failed_tests, 1);
        assert!(!report.passed());
    }

    #[test]
    fn test_gate_independent_of_pass_flags() {
        // blocking only at error lets a critical issue through the per-test flag
        let lenient = CategoryResult::evaluate(
            Category::Security,
            Severity::Error,
            vec![Issue::new(IssueType::NoHttps, Severity::Critical, "http only")],
            Metrics::new(),
        );
        assert!(lenient.passed());

        let report = aggregate(info(), vec![TestEntry::completed(lenient, 1)], &GateLimits::default());
        assert_eq!(report.summary.passed_tests, 1);
        assert!(!report.summary.quality_gates_passed);
        assert!(!report.summary.overall_passed);
        assert_eq!(report.summary.gate_violations.len(), 1);
    }

    #[test]
    fn test_write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let report = aggregate(info(), vec![TestEntry::completed(result(Category::Seo, &[]), 1)], &GateLimits::default());
        let path = report.write(&dir.path().join("out")).unwrap();
        assert!(path.ends_with(REPORT_FILE));
        assert_eq!(SuiteReport::load(&path).unwrap(), report);
    }
}
