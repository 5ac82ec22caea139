//! Interactive element tester
//!
//! Samples buttons, links, form controls and `role=button` elements and
//! checks that each can be seen, tapped, reached by keyboard and read.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use sitegate_common::{is_large_text, Category, CategoryResult, IssueType, Severity};

use super::{text_contrast, CheckContext, Checker, Findings, Tally};
use crate::config::InteractivityConfig;
use crate::error::InspectorResult;
use crate::inspector::{evaluate_as, scripts, DomElement, DomSnapshot, HoverState};

const VISIBILITY: &str = "visibility";
const TOUCH: &str = "touch_targets";
const KEYBOARD: &str = "keyboard";
const STATES: &str = "states";
const HOVER: &str = "hover";
const CONTRAST: &str = "contrast";

/// Focus feedback reported by the focus script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusState {
    pub index: usize,
    pub focus_visible: bool,
}

/// Hover/focus feedback for the element at `index` in the snapshot; `None`
/// when that interaction was not measured
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionState {
    pub index: usize,
    pub hover_changes: Option<bool>,
    pub focus_visible: Option<bool>,
}

/// Join focus and hover measurements by snapshot index
pub fn merge_states(focus: &[FocusState], hover: &[HoverState]) -> Vec<InteractionState> {
    let mut merged: BTreeMap<usize, InteractionState> = BTreeMap::new();
    for f in focus {
        let entry = merged.entry(f.index).or_insert_with(|| InteractionState {
            index: f.index,
            ..Default::default()
        });
        entry.focus_visible = Some(f.focus_visible);
    }
    for h in hover {
        let entry = merged.entry(h.index).or_insert_with(|| InteractionState {
            index: h.index,
            ..Default::default()
        });
        entry.hover_changes = Some(h.changed);
    }
    merged.into_values().collect()
}

pub struct InteractivityChecker {
    config: InteractivityConfig,
}

fn is_candidate(el: &DomElement) -> bool {
    el.is_interactive() || el.role() == Some("button")
}

impl InteractivityChecker {
    pub fn new(config: InteractivityConfig) -> Self {
        Self { config }
    }

    /// `states` is `None` when state measurement is off or unavailable
    pub fn inspect(&self, snapshot: &DomSnapshot, states: Option<&[InteractionState]>, findings: &mut Findings) {
        let cfg = &self.config;
        let states: Option<BTreeMap<usize, &InteractionState>> =
            states.map(|s| s.iter().map(|st| (st.index, st)).collect());

        let mut hidden = Tally::default();
        let mut small = Tally::default();
        let mut unfocusable = Tally::default();
        let mut no_hover = Tally::default();
        let mut no_focus = Tally::default();
        let mut contrast = Tally::default();
        let mut sampled = 0;

        let candidates = snapshot
            .iter()
            .filter(|(_, e)| is_candidate(e) && !e.is_disabled())
            .take(cfg.max_elements);
        for (index, el) in candidates {
            sampled += 1;
            let selector = el.selector();
            if !el.is_rendered() {
                hidden.add(selector);
                continue;
            }
            if el.rect.width < cfg.min_tappable_px || el.rect.height < cfg.min_tappable_px {
                small.add(selector.clone());
            }
            if !el.is_focusable() {
                unfocusable.add(selector.clone());
            }
            if let Some(state) = states.as_ref().and_then(|s| s.get(&index)) {
                if state.hover_changes == Some(false) {
                    no_hover.add(selector.clone());
                }
                if state.focus_visible == Some(false) {
                    no_focus.add(selector.clone());
                }
            }
            if !el.trimmed_text().is_empty() {
                let required = if is_large_text(el.style.font_size, el.style.font_weight) {
                    3.0
                } else {
                    cfg.min_contrast
                };
                if text_contrast(snapshot, index).map(|r| r < required).unwrap_or(false) {
                    contrast.add(selector);
                }
            }
        }

        hidden.report(
            findings,
            IssueType::ElementNotVisible,
            Severity::Minor,
            VISIBILITY,
            "Interactive elements are not visible".to_string(),
        );
        small.report(
            findings,
            IssueType::TouchTargetTooSmall,
            Severity::Minor,
            TOUCH,
            format!("Touch targets smaller than {0}x{0} px", cfg.min_tappable_px),
        );
        unfocusable.report(
            findings,
            IssueType::NotFocusable,
            Severity::Serious,
            KEYBOARD,
            "Interactive elements cannot be reached with the keyboard".to_string(),
        );
        no_hover.report(
            findings,
            IssueType::NoHoverState,
            Severity::Info,
            STATES,
            "Interactive elements have no hover style".to_string(),
        );
        no_focus.report(
            findings,
            IssueType::NoFocusStyle,
            Severity::Info,
            STATES,
            "Interactive elements show no visible focus indicator".to_string(),
        );
        contrast.report(
            findings,
            IssueType::PoorContrast,
            Severity::Serious,
            CONTRAST,
            format!("Interactive text contrast below {}:1", cfg.min_contrast),
        );
        findings.metric("interactive_elements", sampled);
    }
}

#[async_trait]
impl Checker for InteractivityChecker {
    fn category(&self) -> Category {
        Category::Interactivity
    }

    fn blocking_severity(&self) -> Severity {
        self.config.blocking_severity
    }

    async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult> {
        info!("Testing interactive elements on {}", ctx.target);
        let (page, _) = ctx.open_target().await?;
        let snapshot = page.snapshot().await;
        let measured = if self.config.check_states {
            let focus = evaluate_as::<Vec<FocusState>>(page.as_ref(), &scripts::FOCUS_STATES).await;
            let hover = page.hover_states(self.config.max_elements).await;
            Some((focus, hover))
        } else {
            None
        };
        page.close().await;

        let mut findings = Findings::new();
        let states = match measured {
            Some((focus, hover)) => {
                let focus = findings.tolerate(STATES, focus)?.unwrap_or_default();
                let hover = findings.tolerate(HOVER, hover)?.unwrap_or_default();
                Some(merge_states(&focus, &hover))
            }
            None => None,
        };
        // an engine that reports nothing gives no basis for hover/focus findings
        let states = states.filter(|s| !s.is_empty());
        if states.is_none() {
            debug!("No interaction state data, skipping hover/focus checks");
        }
        if let Some(snapshot) = findings.tolerate("snapshot", snapshot)? {
            self.inspect(&snapshot, states.as_deref(), &mut findings);
        }
        Ok(findings.into_result(Category::Interactivity, self.config.blocking_severity))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{body, sized};
    use super::*;

    fn button(text: &str) -> DomElement {
        sized(DomElement::new("button").with_text(text), 120.0, 48.0)
    }

    fn run(snapshot: &DomSnapshot, states: Option<&[InteractionState]>) -> CategoryResult {
        let mut findings = Findings::new();
        InteractivityChecker::new(InteractivityConfig::default()).inspect(snapshot, states, &mut findings);
        findings.into_result(Category::Interactivity, Severity::Serious)
    }

    #[test]
    fn test_good_controls_pass() {
        let snap = body(vec![button("Buy"), sized(DomElement::new("a").with_attr("href", "/").with_text("Home"), 80.0, 44.0)]);
        let states = vec![
            InteractionState { index: 2, hover_changes: Some(true), focus_visible: Some(true) },
            InteractionState { index: 3, hover_changes: Some(true), focus_visible: Some(true) },
        ];
        let result = run(&snap, Some(&states));
        assert!(result.issues().is_empty(), "{:?}", result.issues());
        assert_eq!(result.metrics()["interactive_elements"], 2);
    }

    #[test]
    fn test_div_button_is_not_focusable() {
        let div = sized(DomElement::new("div").with_attr("role", "button").with_text("Open"), 60.0, 60.0);
        let result = run(&body(vec![div]), None);
        assert!(!result.passed());
        assert_eq!(result.issues()[0].kind, IssueType::NotFocusable);
    }

    #[test]
    fn test_small_hidden_and_stateless() {
        let mut hidden = button("Hidden");
        hidden.style.display = "none".into();
        let tiny = sized(DomElement::new("a").with_attr("href", "/x").with_text("x"), 20.0, 20.0);
        let snap = body(vec![hidden, tiny, button("Plain")]);
        let states = vec![InteractionState { index: 4, hover_changes: Some(false), focus_visible: Some(false) }];
        let result = run(&snap, Some(&states));
        let kinds: Vec<IssueType> = result.issues().iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                IssueType::ElementNotVisible,
                IssueType::TouchTargetTooSmall,
                IssueType::NoHoverState,
                IssueType::NoFocusStyle
            ]
        );
        assert!(result.passed());
    }

    #[test]
    fn test_merge_keeps_unmeasured_as_none() {
        let focus = vec![FocusState { index: 2, focus_visible: true }, FocusState { index: 3, focus_visible: false }];
        let hover = vec![HoverState { index: 3, changed: false }, HoverState { index: 5, changed: true }];
        let merged = merge_states(&focus, &hover);
        assert_eq!(
            merged,
            vec![
                InteractionState { index: 2, hover_changes: None, focus_visible: Some(true) },
                InteractionState { index: 3, hover_changes: Some(false), focus_visible: Some(false) },
                InteractionState { index: 5, hover_changes: Some(true), focus_visible: None },
            ]
        );
    }

    #[test]
    fn test_unmeasured_hover_is_not_reported() {
        let snap = body(vec![button("Save")]);
        let states = vec![InteractionState { index: 2, hover_changes: None, focus_visible: Some(true) }];
        let result = run(&snap, Some(&states));
        assert!(result.issues().is_empty(), "{:?}", result.issues());
    }

    #[test]
    fn test_low_contrast_button_blocks() {
        let mut faint = button("Subscribe");
        faint.style.color = "#bbbbbb".into();
        let result = run(&body(vec![faint]), None);
        assert_eq!(result.issues()[0].kind, IssueType::PoorContrast);
        assert!(!result.passed());
    }

    #[test]
    fn test_sample_size_is_capped() {
        let buttons: Vec<DomElement> = (0..80).map(|i| button(&format!("B{}", i))).collect();
        let result = run(&body(buttons), None);
        assert_eq!(result.metrics()["interactive_elements"], 50);
    }
}
