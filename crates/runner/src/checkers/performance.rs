//! Performance checker
//!
//! Core Web Vitals are graded against two thresholds: above "good" is a
//! moderate issue, above "needs improvement" is serious and blocks by default.
//!
//! After the main load the target is reloaded in fresh pages throttled to 3G
//! and 4G profiles. Engines without network emulation skip that step.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use sitegate_common::gates::VitalThreshold;
use sitegate_common::{Category, CategoryResult, Issue, IssueType, Severity};

use super::{round2, CheckContext, Checker, Findings};
use crate::config::PerformanceConfig;
use crate::error::{InspectorError, InspectorResult};
use crate::inspector::{
    evaluate_as, scripts, NavigateOptions, NetworkConditions, PageInspector, ResourceEntry, WaitUntil,
};

const VITALS: &str = "web_vitals";
const TIMING: &str = "timing";
const RESOURCES: &str = "resources";
const JAVASCRIPT: &str = "javascript";
const NETWORK: &str = "network";

/// Browser-reported timing; `None` when the browser did not produce a value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebVitals {
    pub lcp_ms: Option<f64>,
    pub cls: Option<f64>,
    pub fid_ms: Option<f64>,
    pub fcp_ms: Option<f64>,
    pub first_paint_ms: Option<f64>,
    pub ttfb_ms: Option<f64>,
    pub dom_content_loaded_ms: Option<f64>,
    pub load_ms: Option<f64>,
    pub js_heap_bytes: Option<f64>,
    /// Script time spent in long frames or tasks
    pub js_execution_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
    NotMeasured,
}

impl Rating {
    pub fn of(value: Option<f64>, threshold: &VitalThreshold) -> Self {
        match value {
            None => Rating::NotMeasured,
            Some(v) if v > threshold.needs_improvement => Rating::Poor,
            Some(v) if v > threshold.good => Rating::NeedsImprovement,
            Some(_) => Rating::Good,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Rating::Good => "good",
            Rating::NeedsImprovement => "needs-improvement",
            Rating::Poor => "poor",
            Rating::NotMeasured => "not-measured",
        }
    }
}

/// Issue types for one vital: poor, needs improvement, not measured
struct Vital {
    name: &'static str,
    unit: &'static str,
    kinds: [IssueType; 3],
    not_measured: Severity,
}

const LCP: Vital = Vital {
    name: "LCP",
    unit: "ms",
    kinds: [IssueType::LcpPoor, IssueType::LcpNeedsImprovement, IssueType::LcpNotMeasured],
    not_measured: Severity::Minor,
};
const CLS: Vital = Vital {
    name: "CLS",
    unit: "",
    kinds: [IssueType::ClsPoor, IssueType::ClsNeedsImprovement, IssueType::ClsNotMeasured],
    not_measured: Severity::Minor,
};
// FID needs a real user interaction, so a missing value is expected
const FID: Vital = Vital {
    name: "FID",
    unit: "ms",
    kinds: [IssueType::FidPoor, IssueType::FidNeedsImprovement, IssueType::FidNotMeasured],
    not_measured: Severity::Info,
};

/// A throttled reload: network profile, budget and the issues it raises
#[derive(Debug, Clone, PartialEq)]
pub struct Throttle {
    pub label: &'static str,
    pub conditions: NetworkConditions,
    pub max_load_ms: f64,
    pub timeout: Duration,
    slow: IssueType,
    failed: IssueType,
    severity: Severity,
}

/// How a throttled reload ended
#[derive(Debug, Clone, PartialEq)]
pub enum ThrottledLoad {
    Loaded { elapsed_ms: f64 },
    Failed(String),
}

pub struct PerformanceChecker {
    config: PerformanceConfig,
}

impl PerformanceChecker {
    pub fn new(config: PerformanceConfig) -> Self {
        Self { config }
    }

    pub fn inspect_vitals(&self, vitals: &WebVitals, findings: &mut Findings) {
        let cfg = &self.config;
        grade(&LCP, vitals.lcp_ms, &cfg.lcp, findings);
        grade(&CLS, vitals.cls, &cfg.cls, findings);
        grade(&FID, vitals.fid_ms, &cfg.fid, findings);

        let limits = [
            (vitals.fcp_ms, cfg.fcp_max_ms, IssueType::FcpSlow, Severity::Serious, "First Contentful Paint"),
            (vitals.ttfb_ms, cfg.ttfb_max_ms, IssueType::TtfbSlow, Severity::Moderate, "Time to First Byte"),
            (vitals.first_paint_ms, cfg.first_paint_max_ms, IssueType::FirstPaintSlow, Severity::Serious, "First Paint"),
        ];
        for (value, max, kind, severity, label) in limits {
            if let Some(value) = value.filter(|v| *v > max) {
                findings.push(
                    Issue::new(kind, severity, format!("{} is {:.0} ms (budget {:.0} ms)", label, value, max))
                        .in_check(TIMING)
                        .with_value(round2(value)),
                );
            }
        }

        if let Some(js) = vitals.js_execution_ms.filter(|v| *v > cfg.max_js_execution_ms) {
            findings.push(
                Issue::new(
                    IssueType::JsSlow,
                    Severity::Moderate,
                    format!("JavaScript ran for {:.0} ms (max {:.0} ms)", js, cfg.max_js_execution_ms),
                )
                .in_check(JAVASCRIPT)
                .with_value(round2(js)),
            );
        }

        if let Some(heap) = vitals.js_heap_bytes.filter(|h| *h > cfg.max_js_heap_bytes as f64) {
            findings.push(
                Issue::new(
                    IssueType::JsHeapHigh,
                    Severity::Moderate,
                    format!("JS heap is {:.1} MB", heap / (1024.0 * 1024.0)),
                )
                .in_check(TIMING)
                .with_value(heap as u64),
            );
        }

        let measured = [
            ("lcp_ms", vitals.lcp_ms),
            ("cls", vitals.cls),
            ("fid_ms", vitals.fid_ms),
            ("fcp_ms", vitals.fcp_ms),
            ("first_paint_ms", vitals.first_paint_ms),
            ("ttfb_ms", vitals.ttfb_ms),
            ("dom_content_loaded_ms", vitals.dom_content_loaded_ms),
            ("load_ms", vitals.load_ms),
            ("js_execution_ms", vitals.js_execution_ms),
        ];
        for (key, value) in measured {
            if let Some(value) = value {
                findings.metric(key, round2(value));
            }
        }
        findings.metric("lcp_rating", Rating::of(vitals.lcp_ms, &cfg.lcp).as_str());
        findings.metric("cls_rating", Rating::of(vitals.cls, &cfg.cls).as_str());
    }

    pub fn inspect_resources(&self, resources: &[ResourceEntry], findings: &mut Findings) {
        let cfg = &self.config;
        let js_bytes: u64 = resources.iter().filter(|r| r.kind == "script").map(|r| r.transfer_size).sum();
        let total_bytes: u64 = resources.iter().filter(|r| r.kind != "image").map(|r| r.transfer_size).sum();
        let failed: Vec<&ResourceEntry> = resources.iter().filter(|r| r.is_failure()).collect();
        let slow = resources.iter().filter(|r| r.duration_ms > cfg.slow_resource_ms).count();

        if js_bytes > cfg.js_budget_bytes {
            findings.push(
                Issue::new(
                    IssueType::JsTooLarge,
                    Severity::Serious,
                    format!("JavaScript weighs {} KB (budget {} KB)", js_bytes / 1000, cfg.js_budget_bytes / 1000),
                )
                .in_check(RESOURCES)
                .with_value(js_bytes),
            );
        }
        if total_bytes > cfg.total_budget_bytes {
            findings.push(
                Issue::new(
                    IssueType::TotalTooLarge,
                    Severity::Serious,
                    format!(
                        "Non-image resources weigh {} KB (budget {} KB)",
                        total_bytes / 1000,
                        cfg.total_budget_bytes / 1000
                    ),
                )
                .in_check(RESOURCES)
                .with_value(total_bytes),
            );
        }
        if !failed.is_empty() {
            let sample: Vec<String> = failed.iter().take(5).map(|r| r.url.clone()).collect();
            findings.push(
                Issue::new(
                    IssueType::FailedResources,
                    Severity::Serious,
                    format!("{} resources failed to load", failed.len()),
                )
                .in_check(RESOURCES)
                .with_count(failed.len())
                .with_value(sample),
            );
        }
        if slow > cfg.max_slow_resources {
            findings.push(
                Issue::new(
                    IssueType::ManySlowResources,
                    Severity::Moderate,
                    format!("{} resources took longer than {:.0} ms", slow, cfg.slow_resource_ms),
                )
                .in_check(RESOURCES)
                .with_count(slow),
            );
        }
        if resources.len() > cfg.max_resources {
            findings.push(
                Issue::new(
                    IssueType::TooManyResources,
                    Severity::Moderate,
                    format!("{} resources requested (limit {})", resources.len(), cfg.max_resources),
                )
                .in_check(RESOURCES)
                .with_count(resources.len()),
            );
        }

        findings.metric("resource_count", resources.len());
        findings.metric("js_bytes", js_bytes);
        findings.metric("total_bytes", total_bytes);
        findings.metric("failed_resources", failed.len());
        findings.metric("slow_resources", slow);
    }

    /// The 3G and 4G reloads, slowest first
    pub fn throttles(&self) -> [Throttle; 2] {
        let cfg = &self.config;
        [
            Throttle {
                label: "3G",
                conditions: NetworkConditions::SLOW_3G,
                max_load_ms: cfg.max_3g_load_ms,
                timeout: Duration::from_millis(cfg.timeout_3g_ms),
                slow: IssueType::Slow3g,
                failed: IssueType::Timeout3g,
                severity: Severity::Serious,
            },
            Throttle {
                label: "4G",
                conditions: NetworkConditions::FAST_4G,
                max_load_ms: cfg.max_4g_load_ms,
                timeout: Duration::from_millis(cfg.timeout_4g_ms),
                slow: IssueType::Slow4g,
                failed: IssueType::Timeout4g,
                severity: Severity::Moderate,
            },
        ]
    }

    pub fn inspect_throttled(&self, throttle: &Throttle, load: &ThrottledLoad, findings: &mut Findings) {
        match load {
            ThrottledLoad::Loaded { elapsed_ms } => {
                findings.metric(&format!("load_{}_ms", throttle.label.to_lowercase()), round2(*elapsed_ms));
                if *elapsed_ms > throttle.max_load_ms {
                    findings.push(
                        Issue::new(
                            throttle.slow,
                            throttle.severity,
                            format!(
                                "Page took {:.1} s to load on {} (max {:.1} s)",
                                elapsed_ms / 1000.0,
                                throttle.label,
                                throttle.max_load_ms / 1000.0
                            ),
                        )
                        .in_check(NETWORK)
                        .with_value(round2(*elapsed_ms)),
                    );
                }
            }
            ThrottledLoad::Failed(reason) => findings.push(
                Issue::new(
                    throttle.failed,
                    throttle.severity,
                    format!(
                        "Page failed to load on {} within {} ms: {}",
                        throttle.label,
                        throttle.timeout.as_millis(),
                        reason
                    ),
                )
                .in_check(NETWORK),
            ),
        }
    }

    async fn run_network(&self, ctx: &CheckContext, findings: &mut Findings) -> InspectorResult<()> {
        for throttle in self.throttles() {
            let page = ctx.session.open_page(ctx.engine).await?;
            if let Err(e) = page.emulate_network(&throttle.conditions).await {
                page.close().await;
                if let InspectorError::Unsupported(what) = &e {
                    debug!("Skipping throttled loads: {} not supported", what);
                    findings.metric("network_emulation", "unsupported");
                    return Ok(());
                }
                return Err(e);
            }

            let options = NavigateOptions {
                wait_until: WaitUntil::NetworkIdle,
                timeout: throttle.timeout,
            };
            let started = Instant::now();
            let outcome = page.navigate(&ctx.target, &options).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            page.close().await;

            let load = match outcome {
                Ok(_) => ThrottledLoad::Loaded { elapsed_ms },
                Err(e @ (InspectorError::NavigationTimeout { .. } | InspectorError::Navigation(_))) => {
                    ThrottledLoad::Failed(e.to_string())
                }
                Err(e) => return Err(e),
            };
            info!("  {} load: {:?}", throttle.label, load);
            self.inspect_throttled(&throttle, &load, findings);
        }
        findings.metric("network_emulation", "applied");
        Ok(())
    }

    async fn run(&self, page: &dyn PageInspector, findings: &mut Findings) -> InspectorResult<()> {
        let vitals = evaluate_as::<WebVitals>(page, &scripts::WEB_VITALS).await;
        if let Some(vitals) = findings.tolerate(VITALS, vitals)? {
            self.inspect_vitals(&vitals, findings);
        }
        let resources = page.resources().await;
        if let Some(resources) = findings.tolerate(RESOURCES, resources)? {
            self.inspect_resources(&resources, findings);
        }
        Ok(())
    }
}

fn grade(vital: &Vital, value: Option<f64>, threshold: &VitalThreshold, findings: &mut Findings) {
    let [poor, needs_improvement, not_measured] = vital.kinds;
    let issue = match (Rating::of(value, threshold), value) {
        (Rating::Poor, Some(v)) => Issue::new(
            poor,
            Severity::Serious,
            format!("{} is {}{} (poor above {}{})", vital.name, round2(v), vital.unit, threshold.needs_improvement, vital.unit),
        )
        .with_value(round2(v)),
        (Rating::NeedsImprovement, Some(v)) => Issue::new(
            needs_improvement,
            Severity::Moderate,
            format!("{} is {}{} (good at or below {}{})", vital.name, round2(v), vital.unit, threshold.good, vital.unit),
        )
        .with_value(round2(v)),
        (Rating::NotMeasured, _) => Issue::new(
            not_measured,
            vital.not_measured,
            format!("{} could not be measured", vital.name),
        ),
        _ => return,
    };
    findings.push(issue.in_check(VITALS));
}

#[async_trait]
impl Checker for PerformanceChecker {
    fn category(&self) -> Category {
        Category::Performance
    }

    fn blocking_severity(&self) -> Severity {
        self.config.blocking_severity
    }

    async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult> {
        info!("Measuring performance of {}", ctx.target);
        let options = NavigateOptions {
            wait_until: WaitUntil::Load,
            timeout: ctx.performance_timeout,
        };
        let (page, _) = ctx.open_url(ctx.engine, &ctx.target, &options).await?;
        let mut findings = Findings::new();
        let outcome = self.run(page.as_ref(), &mut findings).await;
        page.close().await;
        outcome?;
        if self.config.network_checks {
            self.run_network(ctx, &mut findings).await?;
        }
        Ok(findings.into_result(Category::Performance, self.config.blocking_severity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitegate_common::gates;
    use test_case::test_case;

    fn run_vitals(vitals: WebVitals) -> CategoryResult {
        let checker = PerformanceChecker::new(PerformanceConfig::default());
        let mut findings = Findings::new();
        checker.inspect_vitals(&vitals, &mut findings);
        findings.into_result(Category::Performance, Severity::Serious)
    }

    #[test_case(Some(2000.0), Rating::Good)]
    #[test_case(Some(2500.0), Rating::Good ; "boundary is good")]
    #[test_case(Some(3000.0), Rating::NeedsImprovement)]
    #[test_case(Some(4000.0), Rating::NeedsImprovement ; "boundary needs improvement")]
    #[test_case(Some(4001.0), Rating::Poor)]
    #[test_case(None, Rating::NotMeasured)]
    fn test_lcp_rating(value: Option<f64>, expected: Rating) {
        assert_eq!(Rating::of(value, &gates::LCP), expected);
    }

    #[test]
    fn test_needs_improvement_does_not_block() {
        let result = run_vitals(WebVitals {
            lcp_ms: Some(3200.0),
            cls: Some(0.15),
            fid_ms: Some(50.0),
            ..Default::default()
        });
        assert!(result.passed());
        let kinds: Vec<IssueType> = result.issues().iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueType::LcpNeedsImprovement, IssueType::ClsNeedsImprovement]);
    }

    #[test]
    fn test_poor_vitals_block() {
        let result = run_vitals(WebVitals {
            lcp_ms: Some(5200.0),
            cls: Some(0.3),
            ..Default::default()
        });
        assert!(!result.passed());
        assert_eq!(result.issues()[0].kind, IssueType::LcpPoor);
        assert_eq!(result.issues()[1].kind, IssueType::ClsPoor);
        let fid = result.issues().iter().find(|i| i.kind == IssueType::FidNotMeasured).unwrap();
        assert_eq!(fid.severity, Severity::Info);
        assert_eq!(result.metrics()["lcp_rating"], "poor");
    }

    #[test]
    fn test_unmeasured_lcp_is_minor() {
        let result = run_vitals(WebVitals::default());
        assert!(result.passed());
        let lcp = result.issues().iter().find(|i| i.kind == IssueType::LcpNotMeasured).unwrap();
        assert_eq!(lcp.severity, Severity::Minor);
    }

    #[test]
    fn test_timing_budgets() {
        let result = run_vitals(WebVitals {
            lcp_ms: Some(1000.0),
            cls: Some(0.0),
            fid_ms: Some(10.0),
            fcp_ms: Some(3500.0),
            ttfb_ms: Some(900.0),
            first_paint_ms: Some(1500.0),
            js_heap_bytes: Some(200.0 * 1024.0 * 1024.0),
            ..Default::default()
        });
        let kinds: Vec<IssueType> = result.issues().iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueType::FcpSlow, IssueType::TtfbSlow, IssueType::JsHeapHigh]);
        assert!(!result.passed());
    }

    #[test_case(2000.0, 0 ; "at budget")]
    #[test_case(2000.5, 1 ; "over budget")]
    fn test_js_execution_budget(js: f64, expected: usize) {
        let checker = PerformanceChecker::new(PerformanceConfig::default());
        let mut findings = Findings::new();
        let vitals = WebVitals {
            js_execution_ms: Some(js),
            ..Default::default()
        };
        checker.inspect_vitals(&vitals, &mut findings);
        assert_eq!(findings.count(IssueType::JsSlow), expected);
        if expected == 1 {
            let issue = findings.issues().iter().find(|i| i.kind == IssueType::JsSlow).unwrap();
            assert_eq!(issue.severity, Severity::Moderate);
        }
    }

    fn throttled(label: &str, load: ThrottledLoad) -> Findings {
        let checker = PerformanceChecker::new(PerformanceConfig::default());
        let throttle = checker.throttles().into_iter().find(|t| t.label == label).unwrap();
        let mut findings = Findings::new();
        checker.inspect_throttled(&throttle, &load, &mut findings);
        findings
    }

    #[test_case("3G", 10_000.0, None ; "3g at budget")]
    #[test_case("3G", 10_001.0, Some((IssueType::Slow3g, Severity::Serious)) ; "3g over budget")]
    #[test_case("4G", 4000.0, None ; "4g at budget")]
    #[test_case("4G", 4001.0, Some((IssueType::Slow4g, Severity::Moderate)) ; "4g over budget")]
    fn test_throttled_load_budget(label: &str, elapsed_ms: f64, expected: Option<(IssueType, Severity)>) {
        let findings = throttled(label, ThrottledLoad::Loaded { elapsed_ms });
        let got: Vec<(IssueType, Severity)> = findings.issues().iter().map(|i| (i.kind, i.severity)).collect();
        assert_eq!(got, expected.into_iter().collect::<Vec<_>>());
        let key = format!("load_{}_ms", label.to_lowercase());
        let result = findings.into_result(Category::Performance, Severity::Serious);
        assert_eq!(result.metrics()[key.as_str()], round2(elapsed_ms));
    }

    #[test_case("3G", IssueType::Timeout3g, false ; "3g failure blocks")]
    #[test_case("4G", IssueType::Timeout4g, true ; "4g failure does not block")]
    fn test_throttled_load_failure(label: &str, kind: IssueType, passes: bool) {
        let findings = throttled(label, ThrottledLoad::Failed("Navigation timed out".into()));
        assert_eq!(findings.count(kind), 1);
        let result = findings.into_result(Category::Performance, Severity::Serious);
        assert_eq!(result.passed(), passes);
    }

    #[test]
    fn test_resource_budgets() {
        let checker = PerformanceChecker::new(PerformanceConfig::default());
        let mut resources = vec![
            ResourceEntry {
                url: "https://example.com/app.js".into(),
                kind: "script".into(),
                transfer_size: 350_000,
                duration_ms: 200.0,
                ..Default::default()
            },
            ResourceEntry {
                url: "https://example.com/hero.jpg".into(),
                kind: "image".into(),
                transfer_size: 2_000_000,
                duration_ms: 100.0,
                ..Default::default()
            },
            ResourceEntry {
                url: "https://example.com/missing.css".into(),
                kind: "stylesheet".into(),
                status: Some(404),
                ..Default::default()
            },
        ];
        for i in 0..11 {
            resources.push(ResourceEntry {
                url: format!("https://example.com/slow-{}.png", i),
                kind: "image".into(),
                duration_ms: 3500.0,
                ..Default::default()
            });
        }
        let mut findings = Findings::new();
        checker.inspect_resources(&resources, &mut findings);
        assert_eq!(findings.count(IssueType::JsTooLarge), 1);
        // images are excluded from the total budget
        assert_eq!(findings.count(IssueType::TotalTooLarge), 0);
        assert_eq!(findings.count(IssueType::FailedResources), 1);
        assert_eq!(findings.count(IssueType::ManySlowResources), 1);
        assert_eq!(findings.count(IssueType::TooManyResources), 0);
    }
}
