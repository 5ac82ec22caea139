//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use sitegate_common::Severity;
use sitegate_runner::{Recommendation, SuiteReport, TestReport};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for TestReport {
    fn headers() -> Vec<&'static str> {
        vec!["Test", "Status", "Issues", "Blocking", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            if self.passed { "PASS" } else { "FAIL" }.to_string(),
            self.result.issues().len().to_string(),
            self.result.blocking_issues().count().to_string(),
            format!("{} ms", self.duration_ms),
        ]
    }
}

impl TableDisplay for Recommendation {
    fn headers() -> Vec<&'static str> {
        vec!["Priority", "Issue", "Count", "Advice"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.priority.to_string(),
            self.issue_type.to_string(),
            self.count.to_string(),
            self.advice.clone(),
        ]
    }
}

fn table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table
}

/// Severity buckets as (label, count) in report order
pub fn severity_rows(report: &SuiteReport) -> Vec<(&'static str, usize)> {
    Severity::ALL
        .iter()
        .map(|s| (s.as_str(), report.summary.issue_counts.get(*s)))
        .collect()
}

/// Print a suite report: per-test table, severity tally, gates, recommendations
pub fn print_report(report: &SuiteReport, top: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Yaml => print_serialized(report, format),
        OutputFormat::Table => print_report_table(report, top),
        OutputFormat::Plain => print_report_plain(report, top),
    }
}

fn print_report_table(report: &SuiteReport, top: usize) {
    let summary = &report.summary;
    println!("{} {}", "Sitegate report for".bold(), report.url);
    println!();

    let mut tests = Table::new();
    tests
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    tests.set_header(TestReport::headers());
    for test in &report.tests {
        let color = if test.passed { Color::Green } else { Color::Red };
        let cells: Vec<Cell> = test
            .row()
            .into_iter()
            .enumerate()
            .map(|(i, value)| if i == 1 { Cell::new(value).fg(color) } else { Cell::new(value) })
            .collect();
        tests.add_row(cells);
    }
    println!("{tests}");

    let mut counts = Table::new();
    counts.load_preset(UTF8_FULL);
    counts.set_header(vec!["Severity", "Issues"]);
    for (label, count) in severity_rows(report) {
        let cell = if count > 0 && matches!(label, "critical" | "error") {
            Cell::new(count).fg(Color::Red)
        } else {
            Cell::new(count)
        };
        counts.add_row(vec![Cell::new(label), cell]);
    }
    println!("{counts}");

    println!(
        "Tests: {} passed, {} failed, {} total ({} ms)",
        summary.passed_tests.to_string().green(),
        summary.failed_tests.to_string().red(),
        summary.total_tests,
        summary.duration_ms
    );
    print_gates(report);

    let recommendations: Vec<Recommendation> = report.recommendations.iter().take(top).cloned().collect();
    if !recommendations.is_empty() {
        println!();
        println!("{}", "Top recommendations".bold());
        println!("{}", table(&recommendations));
    }
    print_verdict(report);
}

fn print_report_plain(report: &SuiteReport, top: usize) {
    let summary = &report.summary;
    println!("url: {}", report.url);
    for test in &report.tests {
        let row = test.row();
        println!("{}: {} ({} issues)", row[0], row[1], row[2]);
        if let Some(error) = &test.error {
            println!("  error: {}", error);
        }
    }
    for (label, count) in severity_rows(report) {
        println!("{}: {}", label, count);
    }
    println!("passed: {}/{}", summary.passed_tests, summary.total_tests);
    for violation in &summary.gate_violations {
        println!("gate: {}", violation);
    }
    for (i, rec) in report.recommendations.iter().take(top).enumerate() {
        println!("{}. [{}] {} ({}x)", i + 1, rec.priority, rec.advice, rec.count);
    }
    println!("overall: {}", if summary.overall_passed { "PASS" } else { "FAIL" });
}

fn print_gates(report: &SuiteReport) {
    if report.summary.quality_gates_passed {
        println!("Quality gates: {}", "passed".green());
        return;
    }
    println!("Quality gates: {}", "failed".red());
    for violation in &report.summary.gate_violations {
        println!("  - {}", violation);
    }
}

fn print_verdict(report: &SuiteReport) {
    println!();
    if report.passed() {
        print_success("All quality gates passed");
    } else {
        print_error("Quality gates failed");
    }
}

/// Print any serializable value as JSON or YAML; other formats fall back to JSON
pub fn print_serialized<T: Serialize>(value: &T, format: OutputFormat) {
    let text = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).unwrap_or_default(),
        _ => serde_json::to_string_pretty(value).unwrap_or_default(),
    };
    println!("{}", text);
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitegate_common::{Category, CategoryResult, GateLimits, Issue, IssueType, Metrics};
    use sitegate_runner::aggregator::{aggregate, RunInfo, TestEntry};

    fn report() -> SuiteReport {
        let result = CategoryResult::evaluate(
            Category::Seo,
            Severity::Critical,
            vec![
                Issue::new(IssueType::MissingTitle, Severity::Critical, "no title"),
                Issue::new(IssueType::MissingFavicon, Severity::Minor, "no favicon"),
            ],
            Metrics::new(),
        );
        aggregate(
            RunInfo::start("https://example.com/", None),
            vec![TestEntry::completed(result, 12), TestEntry::failed(Category::Images, "boom", 3)],
            &GateLimits::default(),
        )
    }

    #[test]
    fn test_rows() {
        let report = report();
        assert_eq!(
            report.tests[0].row(),
            vec!["SEO Tester", "FAIL", "2", "1", "12 ms"].into_iter().map(String::from).collect::<Vec<_>>()
        );
        assert_eq!(report.recommendations[0].row()[0], "critical");
    }

    #[test]
    fn test_severity_rows_cover_every_bucket() {
        let rows = severity_rows(&report());
        assert_eq!(rows.len(), Severity::ALL.len());
        assert_eq!(rows[0], ("critical", 1));
        assert!(rows.contains(&("error", 1)));
        assert_eq!(rows.iter().map(|(_, n)| n).sum::<usize>(), 3);
    }
}
