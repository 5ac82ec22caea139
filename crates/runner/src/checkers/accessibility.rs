//! Accessibility checker
//!
//! Heuristic WCAG checks over a DOM snapshot. Sub-checks run in a fixed order
//! (semantic structure, colour contrast, ARIA, keyboard, forms, skip links,
//! screen-reader basics) so issue order is stable.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use sitegate_common::{is_large_text, Category, CategoryResult, Issue, IssueType, Severity};

use super::{heading_skips, round2, text_contrast, text_elements, CheckContext, Checker, Findings};
use crate::config::AccessibilityConfig;
use crate::error::InspectorResult;
use crate::inspector::{DomElement, DomSnapshot};

const SEMANTIC: &str = "semantic";
const CONTRAST: &str = "contrast";
const ARIA: &str = "aria";
const KEYBOARD: &str = "keyboard";
const FORMS: &str = "forms";
const SKIP_LINKS: &str = "skip_links";
const SCREEN_READER: &str = "screen_reader";

const VALID_ROLES: &[&str] = &[
    "alert", "alertdialog", "application", "article", "banner", "blockquote", "button", "caption",
    "cell", "checkbox", "code", "columnheader", "combobox", "complementary", "contentinfo",
    "definition", "deletion", "dialog", "directory", "document", "emphasis", "feed", "figure",
    "form", "generic", "grid", "gridcell", "group", "heading", "img", "insertion", "link", "list",
    "listbox", "listitem", "log", "main", "marquee", "math", "menu", "menubar", "menuitem",
    "menuitemcheckbox", "menuitemradio", "meter", "navigation", "none", "note", "option",
    "paragraph", "presentation", "progressbar", "radio", "radiogroup", "region", "row",
    "rowgroup", "rowheader", "scrollbar", "search", "searchbox", "separator", "slider",
    "spinbutton", "status", "strong", "subscript", "superscript", "switch", "tab", "table",
    "tablist", "tabpanel", "term", "textbox", "time", "timer", "toolbar", "tooltip", "tree",
    "treegrid", "treeitem",
];

const LANDMARK_TAGS: &[&str] = &["main", "nav", "header", "footer", "aside"];
const LANDMARK_ROLES: &[&str] = &[
    "main", "navigation", "banner", "contentinfo", "complementary", "region", "search",
];

/// Input types that never need a label
const UNLABELLED_INPUT_TYPES: &[&str] = &["hidden", "submit", "button", "reset", "image"];

pub struct AccessibilityChecker {
    config: AccessibilityConfig,
}

impl AccessibilityChecker {
    pub fn new(config: AccessibilityConfig) -> Self {
        Self { config }
    }

    /// Run every enabled sub-check against a snapshot
    pub fn inspect(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        findings.metric("wcag_level", self.config.wcag_level.as_str());
        if self.config.check_semantic {
            self.check_semantic(snapshot, findings);
        }
        if self.config.check_contrast {
            self.check_contrast(snapshot, findings);
        }
        if self.config.check_aria {
            self.check_aria(snapshot, findings);
        }
        if self.config.check_keyboard {
            self.check_keyboard(snapshot, findings);
        }
        if self.config.check_forms {
            self.check_forms(snapshot, findings);
        }
        if self.config.check_skip_links {
            self.check_skip_links(snapshot, findings);
        }
        if self.config.check_screen_reader {
            self.check_screen_reader(snapshot, findings);
        }
    }

    fn check_semantic(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        let h1_count = snapshot.by_tag("h1").count();
        if h1_count == 0 {
            findings.push(Issue::new(IssueType::NoH1, Severity::Serious, "Page has no <h1> heading").in_check(SEMANTIC));
        } else if h1_count > 1 {
            findings.push(
                Issue::new(IssueType::MultipleH1, Severity::Moderate, format!("Page has {} <h1> headings", h1_count))
                    .in_check(SEMANTIC)
                    .with_count(h1_count),
            );
        }

        for (index, previous, level) in heading_skips(snapshot) {
            findings.push(
                Issue::new(
                    IssueType::HeadingSkip,
                    Severity::Moderate,
                    format!("Heading level skipped: h{} followed by h{}", previous, level),
                )
                .in_check(SEMANTIC)
                .with_selector(snapshot.elements[index].selector()),
            );
        }

        let has_main = snapshot
            .iter()
            .any(|(_, e)| e.is("main") || e.role() == Some("main"));
        if !has_main {
            findings.push(
                Issue::new(IssueType::NoMain, Severity::Serious, "Page has no <main> landmark").in_check(SEMANTIC),
            );
        }

        for (_, el) in snapshot.iter() {
            if matches!(el.tag.as_str(), "div" | "span") && el.has_click_handler && el.role().is_none() {
                findings.push(
                    Issue::new(
                        IssueType::NonSemanticClickable,
                        Severity::Moderate,
                        format!("<{}> with a click handler should be a <button> or carry a role", el.tag),
                    )
                    .in_check(SEMANTIC)
                    .with_selector(el.selector()),
                );
            }
        }

        for (index, el) in snapshot.by_tag("a") {
            if el.has_attr("href") && snapshot.accessible_name(index).is_none() {
                findings.push(
                    Issue::new(IssueType::EmptyLink, Severity::Serious, "Link has no accessible text")
                        .in_check(SEMANTIC)
                        .with_selector(el.selector()),
                );
            }
        }

        for (_, el) in snapshot.by_tag("img") {
            if !el.has_attr("alt") {
                findings.push(
                    Issue::new(IssueType::MissingAlt, Severity::Serious, "Image has no alt attribute")
                        .in_check(SEMANTIC)
                        .with_selector(el.selector()),
                );
            }
        }
    }

    fn check_contrast(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        let mut checked = 0usize;
        let mut failures = 0usize;

        for (index, el) in text_elements(snapshot) {
            let Some(ratio) = text_contrast(snapshot, index) else { continue };
            checked += 1;
            let large = is_large_text(el.style.font_size, el.style.font_weight);
            let required = self.config.wcag_level.required_contrast(large);
            if ratio >= required {
                continue;
            }
            failures += 1;
            if failures <= self.config.max_contrast_issues {
                findings.push(
                    Issue::new(
                        IssueType::LowContrast,
                        Severity::Serious,
                        format!(
                            "Text contrast {:.2}:1 is below the {} requirement of {}:1",
                            ratio, self.config.wcag_level, required
                        ),
                    )
                    .in_check(CONTRAST)
                    .with_selector(el.selector())
                    .with_value(round2(ratio)),
                );
            }
        }

        findings.metric("contrast_checks", checked);
        findings.metric("contrast_failures", failures);
    }

    fn check_aria(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        for (index, el) in snapshot.iter() {
            if let Some(role) = el.role() {
                // a role attribute may list fallbacks; the first token is used
                let primary = role.split_whitespace().next().unwrap_or_default();
                if !VALID_ROLES.contains(&primary.to_ascii_lowercase().as_str()) {
                    findings.push(
                        Issue::new(IssueType::InvalidRole, Severity::Moderate, format!("Invalid ARIA role '{}'", role))
                            .in_check(ARIA)
                            .with_selector(el.selector()),
                    );
                }
            }

            if needs_name(el) && el.is_rendered() && snapshot.accessible_name(index).is_none() {
                findings.push(
                    Issue::new(
                        IssueType::InteractiveNoLabel,
                        Severity::Serious,
                        "Interactive element has no accessible name",
                    )
                    .in_check(ARIA)
                    .with_selector(el.selector()),
                );
            }

            if el.attr("aria-hidden") == Some("true") && el.is_focusable() {
                findings.push(
                    Issue::new(
                        IssueType::HiddenFocusable,
                        Severity::Moderate,
                        "Focusable element is hidden from assistive technology",
                    )
                    .in_check(ARIA)
                    .with_selector(el.selector()),
                );
            }

            if let Some(expanded) = el.attr("aria-expanded") {
                if !matches!(expanded.trim(), "true" | "false") {
                    findings.push(
                        Issue::new(
                            IssueType::InvalidAriaExpanded,
                            Severity::Moderate,
                            format!("aria-expanded must be \"true\" or \"false\", found \"{}\"", expanded),
                        )
                        .in_check(ARIA)
                        .with_selector(el.selector()),
                    );
                }
            }
        }
    }

    fn check_keyboard(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        for (_, el) in snapshot.iter() {
            if el.has_click_handler && !el.is_focusable() {
                findings.push(
                    Issue::new(
                        IssueType::ClickOnlyInteractive,
                        Severity::Moderate,
                        "Clickable element cannot be reached with the keyboard",
                    )
                    .in_check(KEYBOARD)
                    .with_selector(el.selector()),
                );
            }
            if let Some(tab_index) = el.tab_index().filter(|t| *t > 0) {
                findings.push(
                    Issue::new(
                        IssueType::PositiveTabindex,
                        Severity::Minor,
                        format!("tabindex=\"{}\" overrides the natural focus order", tab_index),
                    )
                    .in_check(KEYBOARD)
                    .with_selector(el.selector()),
                );
            }
        }
    }

    fn check_forms(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        for (index, el) in snapshot.iter() {
            let is_control = match el.tag.as_str() {
                "select" | "textarea" => true,
                "input" => !UNLABELLED_INPUT_TYPES.contains(&el.attr("type").unwrap_or("text")),
                _ => false,
            };
            if is_control && !has_control_label(snapshot, index, el) {
                findings.push(
                    Issue::new(IssueType::UnlabeledInput, Severity::Serious, "Form control has no label")
                        .in_check(FORMS)
                        .with_selector(el.selector()),
                );
            }
        }

        for (index, form) in snapshot.by_tag("form") {
            let has_submit = snapshot.descendants(index).any(|(_, d)| match d.tag.as_str() {
                "button" => matches!(d.attr("type").unwrap_or("submit"), "submit"),
                "input" => matches!(d.attr("type"), Some("submit" | "image")),
                _ => false,
            });
            if !has_submit {
                findings.push(
                    Issue::new(IssueType::NoSubmitButton, Severity::Moderate, "Form has no submit button")
                        .in_check(FORMS)
                        .with_selector(form.selector()),
                );
            }
            let labelled = ["aria-label", "aria-labelledby", "title"]
                .iter()
                .any(|a| form.non_empty_attr(a).is_some());
            if !labelled {
                findings.push(
                    Issue::new(IssueType::UnlabeledForm, Severity::Minor, "Form has no accessible name")
                        .in_check(FORMS)
                        .with_selector(form.selector()),
                );
            }
        }
    }

    fn check_skip_links(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        // a skip link has to be among the first few links to be useful
        let skip_link = snapshot
            .by_tag("a")
            .take(3)
            .map(|(_, e)| e)
            .find(|e| {
                e.attr("href").map(|h| h.starts_with('#')).unwrap_or(false)
                    && (e.trimmed_text().to_ascii_lowercase().contains("skip")
                        || e.classes().any(|c| c.to_ascii_lowercase().contains("skip")))
            });

        match skip_link {
            None => findings.push(
                Issue::new(IssueType::NoSkipLink, Severity::Moderate, "No skip-to-content link found").in_check(SKIP_LINKS),
            ),
            Some(link) => {
                let target = link.attr("href").unwrap_or_default().trim_start_matches('#');
                if target.is_empty() || snapshot.find_by_id(target).is_none() {
                    findings.push(
                        Issue::new(
                            IssueType::BrokenSkipLink,
                            Severity::Moderate,
                            format!("Skip link target '#{}' does not exist", target),
                        )
                        .in_check(SKIP_LINKS)
                        .with_selector(link.selector()),
                    );
                }
            }
        }
    }

    fn check_screen_reader(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        let lang = snapshot.lang.as_deref().map(str::trim).unwrap_or_default();
        if lang.is_empty() {
            findings.push(
                Issue::new(IssueType::NoLangAttribute, Severity::Serious, "<html> has no lang attribute")
                    .in_check(SCREEN_READER),
            );
        }
        if snapshot.title_text().is_none() {
            findings.push(
                Issue::new(IssueType::NoPageTitle, Severity::Serious, "Document has no title").in_check(SCREEN_READER),
            );
        }

        let headings = snapshot.headings().count();
        if headings == 0 {
            findings.push(
                Issue::new(IssueType::NoHeadings, Severity::Moderate, "Page has no headings").in_check(SCREEN_READER),
            );
        }

        let landmarks = snapshot
            .iter()
            .filter(|(_, e)| {
                LANDMARK_TAGS.contains(&e.tag.as_str())
                    || e.role().map(|r| LANDMARK_ROLES.contains(&r)).unwrap_or(false)
            })
            .count();
        if landmarks == 0 {
            findings.push(
                Issue::new(IssueType::NoLandmarks, Severity::Moderate, "Page has no landmark regions")
                    .in_check(SCREEN_READER),
            );
        }

        findings.metric("headings", headings);
        findings.metric("landmarks", landmarks);
    }
}

/// Widgets named by their content rather than a `<label>`
fn needs_name(el: &DomElement) -> bool {
    match el.tag.as_str() {
        "button" => true,
        "a" | "input" | "select" | "textarea" => false,
        _ => matches!(
            el.role(),
            Some("button" | "checkbox" | "tab" | "menuitem" | "switch" | "link")
        ),
    }
}

fn has_control_label(snapshot: &DomSnapshot, index: usize, el: &DomElement) -> bool {
    ["aria-label", "aria-labelledby", "title"]
        .iter()
        .any(|a| el.non_empty_attr(a).is_some())
        || snapshot.label_for(index).map(|l| !l.is_empty()).unwrap_or(false)
}

#[async_trait]
impl Checker for AccessibilityChecker {
    fn category(&self) -> Category {
        Category::Accessibility
    }

    fn blocking_severity(&self) -> Severity {
        self.config.blocking_severity
    }

    async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult> {
        info!("Checking accessibility (WCAG {})", self.config.wcag_level);
        let (page, _) = ctx.open_target().await?;
        let snapshot = page.snapshot().await;
        page.close().await;

        let mut findings = Findings::new();
        if let Some(snapshot) = findings.tolerate("snapshot", snapshot)? {
            self.inspect(&snapshot, &mut findings);
            findings.metric("elements", json!(snapshot.elements.len()));
        }
        Ok(findings.into_result(Category::Accessibility, self.config.blocking_severity))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::body;
    use super::*;
    use sitegate_common::WcagLevel;

    fn run(snapshot: &DomSnapshot) -> CategoryResult {
        let checker = AccessibilityChecker::new(AccessibilityConfig::default());
        let mut findings = Findings::new();
        checker.inspect(snapshot, &mut findings);
        findings.into_result(Category::Accessibility, Severity::Serious)
    }

    fn kinds(result: &CategoryResult) -> Vec<IssueType> {
        result.issues().iter().map(|i| i.kind).collect()
    }

    fn accessible_page() -> DomSnapshot {
        body(vec![
            DomElement::new("a").with_attr("href", "#content").with_attr("class", "skip-link").with_text("Skip to content"),
            DomElement::new("header"),
            DomElement::new("main").with_attr("id", "content"),
            DomElement::new("h1").with_parent(4).with_text("Welcome"),
            DomElement::new("p").with_parent(4).with_text("Plain black text on white."),
            DomElement::new("img").with_parent(4).with_attr("alt", "Team photo"),
        ])
    }

    #[test]
    fn test_accessible_page_passes_cleanly() {
        let result = run(&accessible_page());
        assert!(result.passed(), "{:?}", result.issues());
        assert!(result.issues().is_empty(), "{:?}", result.issues());
    }

    #[test]
    fn test_image_without_alt_is_serious() {
        let mut snap = accessible_page();
        snap.elements.push(DomElement::new("img").with_parent(4).with_attr("src", "/hero.jpg"));
        let result = run(&snap);
        assert!(!result.passed());
        let issue = result.issues().iter().find(|i| i.kind == IssueType::MissingAlt).unwrap();
        assert_eq!(issue.severity, Severity::Serious);
        assert_eq!(issue.check.as_deref(), Some("semantic"));
    }

    #[test]
    fn test_decorative_image_with_empty_alt_is_fine() {
        let mut snap = accessible_page();
        snap.elements.push(DomElement::new("img").with_parent(4).with_attr("alt", ""));
        assert!(!kinds(&run(&snap)).contains(&IssueType::MissingAlt));
    }

    #[test]
    fn test_missing_structure() {
        let mut snap = body(vec![DomElement::new("p").with_text("Hello")]);
        snap.lang = None;
        snap.title = None;
        let result = run(&snap);
        let kinds = kinds(&result);
        for expected in [
            IssueType::NoH1,
            IssueType::NoMain,
            IssueType::NoSkipLink,
            IssueType::NoLangAttribute,
            IssueType::NoPageTitle,
            IssueType::NoHeadings,
            IssueType::NoLandmarks,
        ] {
            assert!(kinds.contains(&expected), "missing {:?} in {:?}", expected, kinds);
        }
        assert!(!result.passed());
    }

    #[test]
    fn test_contrast_depends_on_wcag_level() {
        let mut grey = DomElement::new("p").with_parent(4).with_text("Subtle");
        grey.style.color = "#767676".into(); // 4.54:1 on white
        let mut snap = accessible_page();
        snap.elements.push(grey);

        assert!(!kinds(&run(&snap)).contains(&IssueType::LowContrast));

        let checker = AccessibilityChecker::new(AccessibilityConfig {
            wcag_level: WcagLevel::AAA,
            ..Default::default()
        });
        let mut findings = Findings::new();
        checker.inspect(&snap, &mut findings);
        assert_eq!(findings.count(IssueType::LowContrast), 1);
    }

    #[test]
    fn test_contrast_issues_are_capped_but_counted() {
        let mut snap = accessible_page();
        for _ in 0..5 {
            let mut faint = DomElement::new("p").with_parent(4).with_text("faint");
            faint.style.color = "#dddddd".into();
            snap.elements.push(faint);
        }
        let checker = AccessibilityChecker::new(AccessibilityConfig {
            max_contrast_issues: 2,
            ..Default::default()
        });
        let mut findings = Findings::new();
        checker.inspect(&snap, &mut findings);
        assert_eq!(findings.count(IssueType::LowContrast), 2);
        let result = findings.into_result(Category::Accessibility, Severity::Serious);
        assert_eq!(result.metrics()["contrast_failures"], json!(5));
    }

    #[test]
    fn test_form_labelling() {
        let mut snap = accessible_page();
        let form = snap.elements.len();
        snap.elements.push(DomElement::new("form").with_parent(4).with_attr("aria-label", "Signup"));
        snap.elements.push(DomElement::new("input").with_parent(form).with_attr("type", "email"));
        snap.elements.push(DomElement::new("input").with_parent(form).with_attr("type", "hidden"));
        let result = run(&snap);
        let kinds = kinds(&result);
        assert_eq!(kinds.iter().filter(|k| **k == IssueType::UnlabeledInput).count(), 1);
        assert!(kinds.contains(&IssueType::NoSubmitButton));
        assert!(!kinds.contains(&IssueType::UnlabeledForm));
    }

    #[test]
    fn test_aria_and_keyboard_findings() {
        let mut snap = accessible_page();
        let mut clickable = DomElement::new("div").with_parent(4).with_text("Open");
        clickable.has_click_handler = true;
        snap.elements.push(clickable);
        snap.elements.push(DomElement::new("span").with_parent(4).with_attr("role", "buton"));
        snap.elements.push(DomElement::new("a").with_parent(4).with_attr("href", "/x").with_attr("aria-hidden", "true").with_text("x"));
        snap.elements.push(DomElement::new("button").with_parent(4).with_attr("aria-expanded", "yes").with_text("Menu"));
        snap.elements.push(DomElement::new("input").with_parent(4).with_attr("tabindex", "3").with_attr("aria-label", "q"));
        let kinds = kinds(&run(&snap));
        for expected in [
            IssueType::NonSemanticClickable,
            IssueType::ClickOnlyInteractive,
            IssueType::InvalidRole,
            IssueType::HiddenFocusable,
            IssueType::InvalidAriaExpanded,
            IssueType::PositiveTabindex,
        ] {
            assert!(kinds.contains(&expected), "missing {:?} in {:?}", expected, kinds);
        }
    }

    #[test]
    fn test_broken_skip_link() {
        let mut snap = accessible_page();
        snap.elements[2] = snap.elements[2].clone().with_attr("href", "#missing");
        let kinds = kinds(&run(&snap));
        assert!(kinds.contains(&IssueType::BrokenSkipLink));
    }

    #[test]
    fn test_identical_snapshots_give_identical_issues() {
        let mut snap = accessible_page();
        snap.elements.push(DomElement::new("img").with_parent(4));
        assert_eq!(run(&snap).issues(), run(&snap).issues());
    }
}
