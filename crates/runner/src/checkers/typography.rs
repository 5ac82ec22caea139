//! Typography checker
//!
//! Text-level findings are aggregated: one issue per kind carrying the number
//! of offending elements and a few sample selectors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use sitegate_common::gates::typography::WEB_SAFE_FONTS;
use sitegate_common::{is_large_text, Category, CategoryResult, Issue, IssueType, Severity};

use super::{heading_skips, round2, text_contrast, text_elements, CheckContext, Checker, Findings, Tally};
use crate::config::TypographyConfig;
use crate::error::InspectorResult;
use crate::inspector::{evaluate_as, scripts, DomSnapshot};

const SIZE: &str = "font_size";
const SPACING: &str = "spacing";
const CONTRAST: &str = "contrast";
const HEADINGS: &str = "headings";
const FONTS: &str = "fonts";

/// Entry of `document.fonts`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontFace {
    pub family: String,
    /// unloaded, loading, loaded, error
    pub status: String,
}

pub struct TypographyChecker {
    config: TypographyConfig,
}

impl TypographyChecker {
    pub fn new(config: TypographyConfig) -> Self {
        Self { config }
    }

    pub fn inspect(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        let cfg = &self.config;
        let mut small = Tally::default();
        let mut line_height = Tally::default();
        let mut letter_spacing = Tally::default();
        let mut contrast = Tally::default();
        let mut families = BTreeSet::new();
        let mut smallest: Option<f64> = None;
        let mut texts = 0;

        for (index, el) in text_elements(snapshot) {
            texts += 1;
            let style = &el.style;
            let is_heading = el.heading_level().is_some();
            families.insert(style.font_family.trim().to_string());

            if !is_heading {
                smallest = Some(smallest.map_or(style.font_size, |s: f64| s.min(style.font_size)));
                if style.font_size < cfg.min_font_size {
                    small.add(el.selector());
                }
                if let Some(lh) = style.line_height.filter(|_| style.font_size > 0.0) {
                    let ratio = lh / style.font_size;
                    if ratio < cfg.line_height_min || ratio > cfg.line_height_max {
                        line_height.add(el.selector());
                    }
                }
            }
            if style.letter_spacing.map(|ls| ls < cfg.min_letter_spacing).unwrap_or(false) {
                letter_spacing.add(el.selector());
            }

            let required = if is_large_text(style.font_size, style.font_weight) {
                3.0
            } else {
                cfg.min_contrast
            };
            if let Some(ratio) = text_contrast(snapshot, index) {
                if ratio < required {
                    contrast.add(el.selector());
                }
            }
        }

        small.report(
            findings,
            IssueType::FontTooSmall,
            Severity::Minor,
            SIZE,
            format!("Body text smaller than {} px", cfg.min_font_size),
        );
        line_height.report(
            findings,
            IssueType::PoorLineHeight,
            Severity::Minor,
            SPACING,
            format!("Line height outside {}-{}", cfg.line_height_min, cfg.line_height_max),
        );
        letter_spacing.report(
            findings,
            IssueType::PoorLetterSpacing,
            Severity::Info,
            SPACING,
            format!("Letter spacing tighter than {} px", cfg.min_letter_spacing),
        );
        contrast.report(
            findings,
            IssueType::PoorContrast,
            Severity::Critical,
            CONTRAST,
            format!("Text contrast below {}:1 (3:1 for large text)", cfg.min_contrast),
        );

        self.inspect_headings(snapshot, findings);

        let missing_fallback: Vec<String> = families.iter().filter(|f| !has_fallback(f)).cloned().collect();
        if !missing_fallback.is_empty() {
            findings.push(
                Issue::new(
                    IssueType::NoFallbackFont,
                    Severity::Minor,
                    format!("Font stacks without a fallback: {}", missing_fallback.join("; ")),
                )
                .in_check(FONTS)
                .with_count(missing_fallback.len())
                .with_value(missing_fallback),
            );
        }

        findings.metric("text_elements", texts);
        findings.metric("font_families", families.into_iter().collect::<Vec<_>>());
        if let Some(smallest) = smallest {
            findings.metric("smallest_font_px", round2(smallest));
        }
    }

    fn inspect_headings(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        let h1s: Vec<_> = snapshot.by_tag("h1").collect();
        for (_, h1) in &h1s {
            if h1.style.font_size > self.config.max_h1_size {
                findings.push(
                    Issue::new(
                        IssueType::H1TooLarge,
                        Severity::Minor,
                        format!("H1 is {} px (max {} px)", h1.style.font_size, self.config.max_h1_size),
                    )
                    .in_check(HEADINGS)
                    .with_selector(h1.selector())
                    .with_value(h1.style.font_size),
                );
            }
        }
        if h1s.len() > 1 {
            findings.push(
                Issue::new(IssueType::MultipleH1, Severity::Minor, format!("{} H1 headings", h1s.len()))
                    .in_check(HEADINGS)
                    .with_count(h1s.len()),
            );
        }
        for (index, previous, level) in heading_skips(snapshot) {
            findings.push(
                Issue::new(
                    IssueType::SkippedHeadingLevel,
                    Severity::Minor,
                    format!("Heading jumps from h{} to h{}", previous, level),
                )
                .in_check(HEADINGS)
                .with_selector(snapshot.elements[index].selector()),
            );
        }
    }

    pub fn inspect_fonts(&self, faces: &[FontFace], findings: &mut Findings) {
        let failed: BTreeSet<&str> = faces
            .iter()
            .filter(|f| f.status == "error")
            .map(|f| f.family.as_str())
            .collect();
        for family in &failed {
            findings.push(
                Issue::new(IssueType::FontNotLoaded, Severity::Minor, format!("Web font '{}' failed to load", family))
                    .in_check(FONTS)
                    .with_value(*family),
            );
        }
        findings.metric("web_fonts", faces.len());
    }
}

/// A stack with more than one family, or a single web-safe/generic family
fn has_fallback(stack: &str) -> bool {
    let families: Vec<String> = stack
        .split(',')
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').to_ascii_lowercase())
        .filter(|f| !f.is_empty())
        .collect();
    match families.as_slice() {
        [] => true,
        [only] => WEB_SAFE_FONTS.contains(&only.as_str()),
        _ => true,
    }
}

#[async_trait]
impl Checker for TypographyChecker {
    fn category(&self) -> Category {
        Category::Typography
    }

    fn blocking_severity(&self) -> Severity {
        self.config.blocking_severity
    }

    async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult> {
        info!("Checking typography on {}", ctx.target);
        let (page, _) = ctx.open_target().await?;
        let snapshot = page.snapshot().await;
        let faces = if self.config.check_fonts {
            Some(evaluate_as::<Vec<FontFace>>(page.as_ref(), &scripts::FONT_FACES).await)
        } else {
            None
        };
        page.close().await;

        let mut findings = Findings::new();
        if let Some(snapshot) = findings.tolerate("snapshot", snapshot)? {
            self.inspect(&snapshot, &mut findings);
        }
        if let Some(faces) = faces {
            if let Some(faces) = findings.tolerate(FONTS, faces)? {
                self.inspect_fonts(&faces, &mut findings);
            }
        }
        Ok(findings.into_result(Category::Typography, self.config.blocking_severity))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::body;
    use super::*;
    use crate::inspector::DomElement;
    use test_case::test_case;

    fn text(tag: &str, size: f64) -> DomElement {
        let mut el = DomElement::new(tag).with_text("Readable words");
        el.style.font_size = size;
        el.style.line_height = Some(size * 1.5);
        el.style.font_family = "Inter, sans-serif".into();
        el
    }

    fn run(snapshot: &DomSnapshot) -> CategoryResult {
        let mut findings = Findings::new();
        TypographyChecker::new(TypographyConfig::default()).inspect(snapshot, &mut findings);
        findings.into_result(Category::Typography, Severity::Critical)
    }

    #[test]
    fn test_clean_page() {
        let snap = body(vec![text("h1", 40.0), text("p", 16.0), text("h2", 28.0)]);
        let result = run(&snap);
        assert!(result.issues().is_empty(), "{:?}", result.issues());
        assert!(result.passed());
    }

    #[test]
    fn test_small_text_aggregated_headings_exempt() {
        let snap = body(vec![text("p", 12.0), text("p", 14.0), text("h6", 12.0), text("p", 16.0)]);
        let result = run(&snap);
        let small = result.issues().iter().find(|i| i.kind == IssueType::FontTooSmall).unwrap();
        assert_eq!(small.count, Some(2));
        assert_eq!(small.severity, Severity::Minor);
        assert!(result.passed());
    }

    #[test]
    fn test_poor_contrast_blocks() {
        let mut faint = text("p", 16.0);
        faint.style.color = "#aaaaaa".into();
        let mut large = text("p", 24.0);
        // 3.54:1 is enough for large text
        large.style.color = "#888888".into();
        let result = run(&body(vec![faint, large]));
        let contrast = result.issues().iter().find(|i| i.kind == IssueType::PoorContrast).unwrap();
        assert_eq!(contrast.count, Some(1));
        assert!(!result.passed());
    }

    #[test]
    fn test_line_height_and_spacing() {
        let mut tight = text("p", 16.0);
        tight.style.line_height = Some(18.0);
        tight.style.letter_spacing = Some(-1.0);
        let mut heading = text("h2", 32.0);
        heading.style.line_height = Some(32.0);
        let result = run(&body(vec![text("h1", 40.0), tight, heading]));
        let kinds: Vec<IssueType> = result.issues().iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueType::PoorLineHeight, IssueType::PoorLetterSpacing]);
    }

    #[test]
    fn test_heading_findings() {
        let snap = body(vec![text("h1", 72.0), text("h3", 24.0), text("h1", 40.0)]);
        let result = run(&snap);
        let kinds: Vec<IssueType> = result.issues().iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![IssueType::H1TooLarge, IssueType::MultipleH1, IssueType::SkippedHeadingLevel]
        );
    }

    #[test_case("Inter, sans-serif", true)]
    #[test_case("\"Brand Sans\"", false)]
    #[test_case("Georgia", true)]
    #[test_case("system-ui", true)]
    fn test_has_fallback(stack: &str, expected: bool) {
        assert_eq!(has_fallback(stack), expected);
    }

    #[test]
    fn test_failed_web_fonts() {
        let checker = TypographyChecker::new(TypographyConfig::default());
        let faces = vec![
            FontFace { family: "Brand".into(), status: "error".into() },
            FontFace { family: "Brand".into(), status: "error".into() },
            FontFace { family: "Inter".into(), status: "loaded".into() },
        ];
        let mut findings = Findings::new();
        checker.inspect_fonts(&faces, &mut findings);
        assert_eq!(findings.count(IssueType::FontNotLoaded), 1);
    }
}
