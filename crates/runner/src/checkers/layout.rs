//! Layout match against a reference page

use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

use sitegate_common::{Category, CategoryResult, Issue, IssueType, Severity};

use super::{round2, CheckContext, Checker, Findings};
use crate::analysis::{AnalysisClient, VisualDiffReport};
use crate::config::LayoutConfig;
use crate::error::InspectorResult;
use crate::inspector::{Region, Screenshot};

pub struct LayoutChecker {
    config: LayoutConfig,
}

impl LayoutChecker {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, report: &VisualDiffReport, findings: &mut Findings) {
        let percentage = round2(report.match_percentage);
        findings.metric("match_percentage", percentage);
        findings.metric("differences", report.differences.len());
        findings.metric("suggested_fixes", serde_json::to_value(&report.fixes).unwrap_or_default());

        if report.match_percentage < self.config.match_threshold_percent {
            findings.push(
                Issue::new(
                    IssueType::LayoutMismatch,
                    Severity::Serious,
                    format!(
                        "Layout matches the reference at {}% (threshold {}%)",
                        percentage, self.config.match_threshold_percent
                    ),
                )
                .with_value(percentage),
            );
        }
        for diff in &report.differences {
            let mut message = format!("{} difference", diff.kind);
            if let Some(selector) = &diff.selector {
                message.push_str(&format!(" at {}", selector));
            }
            if let (Some(expected), Some(actual)) = (&diff.expected, &diff.actual) {
                message.push_str(&format!(": expected `{}`, found `{}`", expected, actual));
            }
            let mut issue = Issue::new(IssueType::LayoutDifference, Severity::Minor, message);
            if let Some(selector) = &diff.selector {
                issue = issue.with_selector(selector.clone());
            }
            findings.push(issue);
        }
    }

    pub async fn compare(
        &self,
        analysis: &dyn AnalysisClient,
        target: &Screenshot,
        reference: &Screenshot,
        findings: &mut Findings,
    ) {
        match analysis.visual_diff(reference, target, &self.config.prompt).await {
            Ok(report) => self.assess(&report, findings),
            Err(e) => {
                warn!("Layout comparison unavailable: {}", e);
                findings.push(Issue::new(
                    IssueType::AnalysisUnavailable,
                    Severity::Info,
                    format!("Layout comparison via {} failed: {}", analysis.name(), e),
                ));
            }
        }
    }

    async fn capture(&self, ctx: &CheckContext, url: &url::Url) -> InspectorResult<Screenshot> {
        let (page, _) = ctx.open_url(ctx.engine, url, &ctx.navigation).await?;
        let shot = page.screenshot(Region::FullPage).await;
        page.close().await;
        shot
    }
}

fn keep(dir: &Path, name: &str, shot: &Screenshot) {
    if let Err(e) = shot.save(&dir.join(name)) {
        warn!("Could not keep {}: {}", name, e);
    }
}

#[async_trait]
impl Checker for LayoutChecker {
    fn category(&self) -> Category {
        Category::LayoutMatch
    }

    fn blocking_severity(&self) -> Severity {
        self.config.blocking_severity
    }

    async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult> {
        let mut findings = Findings::new();
        let Some(reference_url) = &ctx.reference else {
            findings.metric("skipped", json!("no reference url"));
            return Ok(findings.into_result(Category::LayoutMatch, self.config.blocking_severity));
        };
        info!("Comparing {} against {}", ctx.target, reference_url);

        let target = self.capture(ctx, &ctx.target).await;
        let Some(target) = findings.tolerate("target screenshot", target)? else {
            return Ok(findings.into_result(Category::LayoutMatch, self.config.blocking_severity));
        };
        let reference = self.capture(ctx, reference_url).await;
        let Some(reference) = findings.tolerate("reference screenshot", reference)? else {
            return Ok(findings.into_result(Category::LayoutMatch, self.config.blocking_severity));
        };

        if let Some(dir) = &ctx.artifacts_dir {
            keep(dir, "layout-target.png", &target);
            keep(dir, "layout-reference.png", &reference);
        }

        self.compare(ctx.analysis.as_ref(), &target, &reference, &mut findings).await;
        Ok(findings.into_result(Category::LayoutMatch, self.config.blocking_severity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DisabledAnalysisClient, MockAnalysisClient, VisualDifference};
    use crate::visual::solid_png;

    fn checker() -> LayoutChecker {
        LayoutChecker::new(LayoutConfig::default())
    }

    fn shot() -> Screenshot {
        Screenshot::from_png(solid_png(16, 16, [240, 240, 240, 255])).unwrap()
    }

    #[tokio::test]
    async fn test_mock_mismatch() {
        let mut findings = Findings::new();
        checker()
            .compare(&MockAnalysisClient::default(), &shot(), &shot(), &mut findings)
            .await;
        assert_eq!(findings.count(IssueType::LayoutMismatch), 1);
        assert_eq!(findings.count(IssueType::LayoutDifference), 4);
        let result = findings.into_result(Category::LayoutMatch, Severity::Serious);
        assert!(!result.passed());
    }

    #[tokio::test]
    async fn test_unavailable_is_informational() {
        let mut findings = Findings::new();
        checker()
            .compare(&DisabledAnalysisClient, &shot(), &shot(), &mut findings)
            .await;
        let result = findings.into_result(Category::LayoutMatch, Severity::Serious);
        assert!(result.passed());
        assert_eq!(result.issues()[0].kind, IssueType::AnalysisUnavailable);
    }

    #[test]
    fn test_threshold_boundary() {
        let report = VisualDiffReport {
            match_achieved: true,
            match_percentage: 98.0,
            differences: vec![VisualDifference {
                kind: "spacing".into(),
                selector: Some(".hero".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut findings = Findings::new();
        checker().assess(&report, &mut findings);
        assert_eq!(findings.count(IssueType::LayoutMismatch), 0);
        assert_eq!(findings.issues()[0].selector.as_deref(), Some(".hero"));
    }
}
