//! Responsive layout checker
//!
//! Loads the target once per configured viewport and checks each rendering
//! on its own. A viewport that cannot be loaded is reported and skipped.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use sitegate_common::{Category, CategoryResult, Issue, IssueType, Severity};

use super::{text_elements, CheckContext, Checker, Findings, Tally};
use crate::config::{ResponsiveConfig, ViewportSpec};
use crate::error::InspectorResult;
use crate::inspector::{DomElement, DomSnapshot, PageInspector};

/// Overlap is only checked among this many interactive elements
const MAX_OVERLAP_CANDIDATES: usize = 100;

pub struct ResponsiveChecker {
    config: ResponsiveConfig,
}

fn is_button(el: &DomElement) -> bool {
    match el.tag.as_str() {
        "button" => true,
        "input" => matches!(el.attr("type"), Some("submit" | "button" | "reset")),
        _ => el.role() == Some("button"),
    }
}

impl ResponsiveChecker {
    pub fn new(config: ResponsiveConfig) -> Self {
        Self { config }
    }

    fn is_mobile(&self, spec: &ViewportSpec) -> bool {
        spec.width <= self.config.mobile_max_width
    }

    /// Checks for one rendering; issues are tagged with the viewport name
    pub fn inspect_viewport(&self, spec: &ViewportSpec, snapshot: &DomSnapshot, findings: &mut Findings) {
        let cfg = &self.config;
        let check = spec.name.as_str();
        let mobile = self.is_mobile(spec);
        let width = spec.width as f64;

        if snapshot.scroll_width > width + cfg.overflow_tolerance_px {
            findings.push(
                Issue::new(
                    IssueType::HorizontalScroll,
                    Severity::Critical,
                    format!(
                        "{} ({}px): page is {}px wide and scrolls horizontally",
                        spec.name, spec.width, snapshot.scroll_width
                    ),
                )
                .in_check(check)
                .with_value(snapshot.scroll_width),
            );
        }

        let min_font = if mobile { cfg.min_mobile_font } else { cfg.min_desktop_font };
        let mut unreadable = Tally::default();
        for (_, el) in text_elements(snapshot) {
            if el.style.font_size < min_font {
                unreadable.add(el.selector());
            }
        }
        unreadable.report(
            findings,
            IssueType::TextNotReadable,
            Severity::Minor,
            check,
            format!("{}: text smaller than {} px", spec.name, min_font),
        );

        if mobile {
            let mut cramped = Tally::default();
            for (_, el) in snapshot.iter().filter(|(_, e)| is_button(e) && e.is_rendered()) {
                if el.rect.width < cfg.min_tappable_px || el.rect.height < cfg.min_tappable_px {
                    cramped.add(el.selector());
                }
            }
            cramped.report(
                findings,
                IssueType::ButtonsNotTappable,
                Severity::Critical,
                check,
                format!("{}: buttons smaller than {} px", spec.name, cfg.min_tappable_px),
            );
        }

        let mut overflowing = Tally::default();
        for (_, img) in snapshot.by_tag("img").filter(|(_, e)| e.is_rendered()) {
            if img.rect.right() > width + cfg.overflow_tolerance_px {
                overflowing.add(img.selector());
            }
        }
        overflowing.report(
            findings,
            IssueType::LayoutBreak,
            Severity::Critical,
            check,
            format!("{}: images overflow the viewport", spec.name),
        );

        let mut overlapping = Tally::default();
        let candidates: Vec<(usize, &DomElement)> = snapshot
            .iter()
            .filter(|(_, e)| e.is_interactive() && e.is_rendered())
            .take(MAX_OVERLAP_CANDIDATES)
            .collect();
        for (pos, (i, a)) in candidates.iter().enumerate() {
            let collides = candidates.iter().skip(pos + 1).any(|(j, b)| {
                a.rect.intersects(&b.rect) && !snapshot.is_descendant(*j, *i) && !snapshot.is_descendant(*i, *j)
            });
            if collides {
                overlapping.add(a.selector());
            }
        }
        overlapping.report(
            findings,
            IssueType::OverlappingElements,
            Severity::Minor,
            check,
            format!("{}: interactive elements overlap", spec.name),
        );
    }

    /// Missing viewport meta breaks every mobile rendering; reported once
    pub fn inspect_document(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        let has_mobile = self.config.viewports.iter().any(|v| self.is_mobile(v));
        if has_mobile && snapshot.meta("viewport").is_none() {
            findings.push(
                Issue::new(
                    IssueType::LayoutBreak,
                    Severity::Critical,
                    "No viewport meta tag; mobile browsers will render at desktop width",
                )
                .in_check("viewport_meta"),
            );
        }
    }

    async fn render(&self, ctx: &CheckContext, spec: &ViewportSpec) -> InspectorResult<DomSnapshot> {
        let page = ctx.session.open_page(ctx.engine).await?;
        let outcome = render_on(page.as_ref(), ctx, spec).await;
        page.close().await;
        outcome
    }
}

async fn render_on(page: &dyn PageInspector, ctx: &CheckContext, spec: &ViewportSpec) -> InspectorResult<DomSnapshot> {
    page.set_viewport(spec.viewport()).await?;
    page.navigate(&ctx.target, &ctx.navigation).await?;
    page.snapshot().await
}

#[async_trait]
impl Checker for ResponsiveChecker {
    fn category(&self) -> Category {
        Category::Responsive
    }

    fn blocking_severity(&self) -> Severity {
        self.config.blocking_severity
    }

    async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult> {
        info!("Testing {} viewports on {}", self.config.viewports.len(), ctx.target);
        let mut findings = Findings::new();
        let mut tested = Vec::new();
        let mut document_checked = false;

        for spec in &self.config.viewports {
            match self.render(ctx, spec).await {
                Ok(snapshot) => {
                    if !document_checked {
                        self.inspect_document(&snapshot, &mut findings);
                        document_checked = true;
                    }
                    self.inspect_viewport(spec, &snapshot, &mut findings);
                    tested.push(json!({
                        "name": spec.name,
                        "width": spec.width,
                        "height": spec.height,
                        "scroll_width": snapshot.scroll_width,
                    }));
                }
                Err(e) if e.is_timeout() => {
                    findings.tolerate::<()>(&spec.name, Err(e))?;
                }
                Err(e) => {
                    warn!("Viewport {} failed: {}", spec.name, e);
                    findings.push(
                        Issue::new(
                            IssueType::ViewportError,
                            Severity::Error,
                            format!("{} ({}x{}) could not be tested: {}", spec.name, spec.width, spec.height, e),
                        )
                        .in_check(&spec.name),
                    );
                }
            }
        }

        findings.metric("viewports_tested", tested.len());
        findings.metric("viewports", tested);
        Ok(findings.into_result(Category::Responsive, self.config.blocking_severity))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{body, sized};
    use super::*;
    use crate::inspector::Rect;

    fn spec(name: &str, width: u32) -> ViewportSpec {
        ViewportSpec {
            name: name.into(),
            width,
            height: 800,
        }
    }

    fn at(el: DomElement, x: f64, y: f64, width: f64, height: f64) -> DomElement {
        let mut el = el;
        el.rect = Rect { x, y, width, height };
        el
    }

    fn run(spec: &ViewportSpec, snapshot: &DomSnapshot) -> CategoryResult {
        let mut findings = Findings::new();
        ResponsiveChecker::new(ResponsiveConfig::default()).inspect_viewport(spec, snapshot, &mut findings);
        findings.into_result(Category::Responsive, Severity::Critical)
    }

    #[test]
    fn test_horizontal_scroll_beyond_tolerance() {
        let mut snap = body(vec![DomElement::new("p").with_text("Hello")]);
        snap.scroll_width = 379.0;
        assert!(run(&spec("mobile", 375), &snap).passed());
        snap.scroll_width = 420.0;
        let result = run(&spec("mobile", 375), &snap);
        assert!(!result.passed());
        assert_eq!(result.issues()[0].kind, IssueType::HorizontalScroll);
        assert_eq!(result.issues()[0].check.as_deref(), Some("mobile"));
    }

    #[test]
    fn test_font_threshold_depends_on_viewport() {
        let mut small = DomElement::new("p").with_text("Fine print");
        small.style.font_size = 15.0;
        let mut snap = body(vec![small]);
        snap.scroll_width = 0.0;
        assert_eq!(run(&spec("mobile", 375), &snap).issues().len(), 0);
        let desktop = run(&spec("desktop", 1280), &snap);
        assert_eq!(desktop.issues()[0].kind, IssueType::TextNotReadable);
        assert!(desktop.passed());
    }

    #[test]
    fn test_small_buttons_only_matter_on_mobile() {
        let mut snap = body(vec![sized(DomElement::new("button").with_text("Go"), 30.0, 30.0)]);
        snap.scroll_width = 0.0;
        let mobile = run(&spec("mobile", 375), &snap);
        assert_eq!(mobile.issues()[0].kind, IssueType::ButtonsNotTappable);
        assert!(!mobile.passed());
        assert!(run(&spec("desktop", 1280), &snap).issues().is_empty());
    }

    #[test]
    fn test_overflowing_image_and_overlap() {
        let mut snap = body(vec![
            at(DomElement::new("img").with_attr("alt", "Wide"), 0.0, 0.0, 600.0, 300.0),
            at(DomElement::new("a").with_attr("href", "/a").with_text("A"), 10.0, 400.0, 100.0, 44.0),
            at(DomElement::new("a").with_attr("href", "/b").with_text("B"), 50.0, 420.0, 100.0, 44.0),
            at(DomElement::new("a").with_attr("href", "/c").with_text("C"), 10.0, 600.0, 100.0, 44.0),
        ]);
        snap.scroll_width = 375.0;
        let result = run(&spec("mobile", 375), &snap);
        let kinds: Vec<IssueType> = result.issues().iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueType::LayoutBreak, IssueType::OverlappingElements]);
        let overlap = result.issues().iter().find(|i| i.kind == IssueType::OverlappingElements).unwrap();
        assert_eq!(overlap.count, Some(1));
    }

    #[test]
    fn test_missing_viewport_meta_reported_once() {
        let checker = ResponsiveChecker::new(ResponsiveConfig::default());
        let snap = body(vec![]);
        let mut findings = Findings::new();
        checker.inspect_document(&snap, &mut findings);
        assert_eq!(findings.count(IssueType::LayoutBreak), 1);

        let with_meta = body(vec![DomElement::new("meta")
            .with_attr("name", "viewport")
            .with_attr("content", "width=device-width")]);
        let mut clean = Findings::new();
        checker.inspect_document(&with_meta, &mut clean);
        assert!(clean.issues().is_empty());
    }
}
