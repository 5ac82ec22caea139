//! Cross-browser checker
//!
//! Loads the target in every configured engine. Each engine is tested on its
//! own; a missing engine or a broken load is an issue, never an abort. The
//! first engine that renders becomes the visual baseline for the others.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{info, warn};

use sitegate_common::{Category, CategoryResult, Issue, IssueType, Severity};

use super::{round2, timeout_issue, CheckContext, Checker, Findings};
use crate::config::CrossBrowserConfig;
use crate::error::{InspectorError, InspectorResult};
use crate::inspector::{evaluate_as, scripts, ConsoleMessage, DomSnapshot, Engine, PageInspector, Region, Screenshot};
use crate::visual;

const SAMPLE: usize = 5;

/// Result of the feature-support probe, feature name to supported
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSupport {
    pub css: BTreeMap<String, bool>,
    pub js: BTreeMap<String, bool>,
}

impl FeatureSupport {
    fn missing(features: &BTreeMap<String, bool>) -> Vec<String> {
        features.iter().filter(|(_, ok)| !**ok).map(|(name, _)| name.clone()).collect()
    }
}

pub struct CrossBrowserChecker {
    config: CrossBrowserConfig,
}

impl CrossBrowserChecker {
    pub fn new(config: CrossBrowserConfig) -> Self {
        Self { config }
    }

    pub fn inspect_features(&self, engine: Engine, support: &FeatureSupport, findings: &mut Findings) {
        let css = FeatureSupport::missing(&support.css);
        if !css.is_empty() {
            findings.push(
                Issue::new(
                    IssueType::CssIncompatibility,
                    Severity::Minor,
                    format!("{} lacks CSS support for: {}", engine, css.join(", ")),
                )
                .in_check(engine.as_str())
                .with_count(css.len())
                .with_value(css),
            );
        }
        let js = FeatureSupport::missing(&support.js);
        if !js.is_empty() {
            findings.push(
                Issue::new(
                    IssueType::JsIncompatibility,
                    Severity::Minor,
                    format!("{} lacks JavaScript APIs: {}", engine, js.join(", ")),
                )
                .in_check(engine.as_str())
                .with_count(js.len())
                .with_value(js),
            );
        }
    }

    pub fn inspect_console(&self, engine: Engine, messages: &[ConsoleMessage], findings: &mut Findings) {
        let errors: Vec<&ConsoleMessage> = messages.iter().filter(|m| m.is_error()).collect();
        if errors.is_empty() {
            return;
        }
        let sample: Vec<String> = errors.iter().take(SAMPLE).map(|m| m.text.clone()).collect();
        findings.push(
            Issue::new(
                IssueType::ConsoleErrors,
                Severity::Error,
                format!("{} logged {} console errors", engine, errors.len()),
            )
            .in_check(engine.as_str())
            .with_count(errors.len())
            .with_value(sample),
        );
    }

    /// Negative margins and heavy float use tend to render differently per engine
    pub fn inspect_layout(&self, engine: Engine, snapshot: &DomSnapshot, findings: &mut Findings) {
        let limit = -self.config.max_negative_margin_px;
        let negative = snapshot
            .iter()
            .filter(|(_, e)| {
                let s = &e.style;
                s.margin_left < limit || s.margin_right < limit || s.margin_top < limit
            })
            .count();
        let floats = snapshot
            .iter()
            .filter(|(_, e)| !e.style.float.is_empty() && e.style.float != "none")
            .count();

        let mut problems = Vec::new();
        if negative > 0 {
            problems.push(format!(
                "{} elements with margins below -{}px",
                negative, self.config.max_negative_margin_px
            ));
        }
        if floats > self.config.max_floats {
            problems.push(format!("{} floated elements (max {})", floats, self.config.max_floats));
        }
        if !problems.is_empty() {
            findings.push(
                Issue::new(
                    IssueType::LayoutIssues,
                    Severity::Minor,
                    format!("{}: {}", engine, problems.join("; ")),
                )
                .in_check(engine.as_str())
                .with_count(negative + floats),
            );
        }
    }

    pub fn compare_to_baseline(
        &self,
        baseline: (Engine, &Screenshot),
        engine: Engine,
        shot: &Screenshot,
        findings: &mut Findings,
    ) -> InspectorResult<f64> {
        let diff = visual::compare(baseline.1, shot)?;
        if diff.match_percentage < self.config.min_visual_match_percent {
            findings.push(
                Issue::new(
                    IssueType::VisualDifference,
                    Severity::Info,
                    format!(
                        "{} rendering matches {} at {:.1}% (expected at least {}%)",
                        engine, baseline.0, diff.match_percentage, self.config.min_visual_match_percent
                    ),
                )
                .in_check(engine.as_str())
                .with_value(round2(diff.match_percentage)),
            );
        }
        Ok(diff.match_percentage)
    }

    async fn test_engine(
        &self,
        ctx: &CheckContext,
        engine: Engine,
        page: &dyn PageInspector,
        findings: &mut Findings,
    ) -> InspectorResult<Option<Screenshot>> {
        page.navigate(&ctx.target, &ctx.navigation).await?;

        let support = evaluate_as::<FeatureSupport>(page, &scripts::FEATURE_SUPPORT).await;
        if let Some(support) = findings.tolerate(engine.as_str(), support)? {
            self.inspect_features(engine, &support, findings);
        }
        let console = page.console_messages().await;
        if let Some(console) = findings.tolerate(engine.as_str(), console)? {
            self.inspect_console(engine, &console, findings);
        }
        let snapshot = page.snapshot().await;
        if let Some(snapshot) = findings.tolerate(engine.as_str(), snapshot)? {
            self.inspect_layout(engine, &snapshot, findings);
        }
        let shot = page.screenshot(Region::FullPage).await;
        findings.tolerate(engine.as_str(), shot)
    }
}

#[async_trait]
impl Checker for CrossBrowserChecker {
    fn category(&self) -> Category {
        Category::CrossBrowser
    }

    fn blocking_severity(&self) -> Severity {
        self.config.blocking_severity
    }

    async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult> {
        info!("Testing {} engines against {}", self.config.engines.len(), ctx.target);
        let mut findings = Findings::new();
        let mut baseline: Option<(Engine, Screenshot)> = None;
        let mut tested = BTreeMap::new();

        for &engine in &self.config.engines {
            let page = match ctx.session.open_page(engine).await {
                Ok(page) => page,
                Err(InspectorError::EngineUnavailable(reason)) => {
                    warn!("{} unavailable: {}", engine, reason);
                    findings.push(
                        Issue::new(IssueType::BrowserUnavailable, Severity::Minor, format!("{} is not available: {}", engine, reason))
                            .in_check(engine.as_str()),
                    );
                    continue;
                }
                Err(e) => {
                    findings.push(browser_error(engine, &e));
                    continue;
                }
            };

            let outcome = self.test_engine(ctx, engine, page.as_ref(), &mut findings).await;
            page.close().await;
            let shot = match outcome {
                Ok(shot) => shot,
                Err(e) if e.is_timeout() => {
                    warn!("{} timed out: {}", engine, e);
                    findings.push(timeout_issue(engine.as_str(), &e));
                    continue;
                }
                Err(e) => {
                    warn!("{} failed: {}", engine, e);
                    findings.push(browser_error(engine, &e));
                    continue;
                }
            };

            let mut entry = json!({ "loaded": true });
            if let Some(shot) = shot {
                let matched = match &baseline {
                    Some((base_engine, base_shot)) => {
                        Some(self.compare_to_baseline((*base_engine, base_shot), engine, &shot, &mut findings)?)
                    }
                    None => None,
                };
                match matched {
                    Some(matched) => entry["match_percentage"] = json!(round2(matched)),
                    None => baseline = Some((engine, shot)),
                }
            }
            tested.insert(engine.to_string(), entry);
        }

        findings.metric("engines_tested", tested.len());
        findings.metric("engines", serde_json::to_value(tested)?);
        Ok(findings.into_result(Category::CrossBrowser, self.config.blocking_severity))
    }
}

fn browser_error(engine: Engine, err: &InspectorError) -> Issue {
    Issue::new(IssueType::BrowserError, Severity::Error, format!("{} failed: {}", engine, err)).in_check(engine.as_str())
}

#[cfg(test)]
mod tests {
    use super::super::testing::body;
    use super::*;
    use crate::config::CrossBrowserConfig;
    use crate::inspector::DomElement;
    use crate::visual::solid_png;

    fn checker() -> CrossBrowserChecker {
        CrossBrowserChecker::new(CrossBrowserConfig::default())
    }

    #[test]
    fn test_missing_features() {
        let support = FeatureSupport {
            css: [("grid".to_string(), true), ("has_selector".to_string(), false)].into_iter().collect(),
            js: [("fetch".to_string(), true)].into_iter().collect(),
        };
        let mut findings = Findings::new();
        checker().inspect_features(Engine::Webkit, &support, &mut findings);
        assert_eq!(findings.count(IssueType::CssIncompatibility), 1);
        assert_eq!(findings.count(IssueType::JsIncompatibility), 0);
        assert!(findings.issues()[0].message.contains("has_selector"));
    }

    #[test]
    fn test_console_errors_fail() {
        let messages = vec![
            ConsoleMessage { level: "log".into(), text: "hello".into() },
            ConsoleMessage { level: "error".into(), text: "Uncaught TypeError".into() },
        ];
        let mut findings = Findings::new();
        checker().inspect_console(Engine::Firefox, &messages, &mut findings);
        let result = findings.into_result(Category::CrossBrowser, Severity::Serious);
        assert!(!result.passed());
        assert_eq!(result.issues()[0].count, Some(1));
    }

    #[test]
    fn test_layout_risks() {
        let mut pulled = DomElement::new("div");
        pulled.style.margin_left = -40.0;
        let mut elements = vec![pulled];
        for _ in 0..11 {
            let mut floated = DomElement::new("div");
            floated.style.float = "left".into();
            elements.push(floated);
        }
        let mut findings = Findings::new();
        checker().inspect_layout(Engine::Chromium, &body(elements), &mut findings);
        assert_eq!(findings.count(IssueType::LayoutIssues), 1);
        assert_eq!(findings.issues()[0].count, Some(12));

        let mut clean = Findings::new();
        checker().inspect_layout(Engine::Chromium, &body(vec![DomElement::new("div")]), &mut clean);
        assert!(clean.issues().is_empty());
    }

    #[test]
    fn test_visual_baseline() {
        let white = Screenshot::from_png(solid_png(20, 20, [255, 255, 255, 255])).unwrap();
        let black = Screenshot::from_png(solid_png(20, 20, [0, 0, 0, 255])).unwrap();
        let mut findings = Findings::new();
        let same = checker()
            .compare_to_baseline((Engine::Chromium, &white), Engine::Firefox, &white, &mut findings)
            .unwrap();
        assert_eq!(same, 100.0);
        assert!(findings.issues().is_empty());

        checker()
            .compare_to_baseline((Engine::Chromium, &white), Engine::Webkit, &black, &mut findings)
            .unwrap();
        assert_eq!(findings.count(IssueType::VisualDifference), 1);
        assert_eq!(findings.issues()[0].severity, Severity::Info);
    }
}
