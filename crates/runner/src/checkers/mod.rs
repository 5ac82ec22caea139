//! Quality checkers
//!
//! Each checker inspects the target for one quality dimension and returns
//! exactly one [`CategoryResult`]. Checkers open their own page from the shared
//! browser session and always close it before returning.
//!
//! Error policy inside a checker:
//!
//! - a sub-check that times out becomes an `operation_timeout` info issue and
//!   the checker carries on ([`Findings::tolerate`]);
//! - any other inspector error aborts the checker; the orchestrator turns it
//!   into a `test_error` result.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use sitegate_common::{Category, CategoryResult, Issue, IssueType, Metrics, Rgba, Severity};

use crate::analysis::AnalysisClient;
use crate::config::SuiteConfig;
use crate::error::{InspectorError, InspectorResult};
use crate::inspector::{
    BrowserSession, DomElement, DomSnapshot, Engine, FetchedResource, NavigateOptions,
    NavigationResponse, PageInspector,
};

pub mod accessibility;
pub mod content;
pub mod cross_browser;
pub mod images;
pub mod interactivity;
pub mod layout;
pub mod performance;
pub mod responsive;
pub mod security;
pub mod seo;
pub mod typography;

pub use accessibility::AccessibilityChecker;
pub use content::ContentChecker;
pub use cross_browser::CrossBrowserChecker;
pub use images::ImagesChecker;
pub use interactivity::InteractivityChecker;
pub use layout::LayoutChecker;
pub use performance::PerformanceChecker;
pub use responsive::ResponsiveChecker;
pub use security::SecurityChecker;
pub use seo::SeoChecker;
pub use typography::TypographyChecker;

/// Everything a checker needs besides its own configuration
#[derive(Clone)]
pub struct CheckContext {
    pub target: Url,
    pub reference: Option<Url>,
    pub session: Arc<dyn BrowserSession>,
    pub analysis: Arc<dyn AnalysisClient>,
    /// Engine for single-engine checkers
    pub engine: Engine,
    pub navigation: NavigateOptions,
    /// Navigation timeout for the performance checker
    pub performance_timeout: Duration,
    /// Where screenshots are kept, if anywhere
    pub artifacts_dir: Option<PathBuf>,
}

impl CheckContext {
    /// Open a page on the default engine and load the target
    pub async fn open_target(&self) -> InspectorResult<(Box<dyn PageInspector>, NavigationResponse)> {
        self.open_url(self.engine, &self.target, &self.navigation).await
    }

    /// Open a page and navigate it; the page is closed again if navigation fails
    pub async fn open_url(
        &self,
        engine: Engine,
        url: &Url,
        options: &NavigateOptions,
    ) -> InspectorResult<(Box<dyn PageInspector>, NavigationResponse)> {
        let page = self.session.open_page(engine).await?;
        match page.navigate(url, options).await {
            Ok(response) => Ok((page, response)),
            Err(e) => {
                page.close().await;
                Err(e)
            }
        }
    }

    /// `path` resolved against the target's origin
    pub fn origin_url(&self, path: &str) -> Option<Url> {
        self.target.join(path).ok()
    }
}

/// One quality dimension
#[async_trait]
pub trait Checker: Send + Sync {
    fn category(&self) -> Category;

    fn blocking_severity(&self) -> Severity;

    async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult>;
}

/// Build the checker for one category
pub fn build(category: Category, config: &SuiteConfig) -> Box<dyn Checker> {
    match category {
        Category::Accessibility => Box::new(AccessibilityChecker::new(config.accessibility.clone())),
        Category::Seo => Box::new(SeoChecker::new(config.seo.clone())),
        Category::Security => Box::new(SecurityChecker::new(config.security.clone())),
        Category::Performance => Box::new(PerformanceChecker::new(config.performance.clone())),
        Category::ContentQuality => Box::new(ContentChecker::new(config.content.clone())),
        Category::Images => Box::new(ImagesChecker::new(config.images.clone())),
        Category::Typography => Box::new(TypographyChecker::new(config.typography.clone())),
        Category::Interactivity => Box::new(InteractivityChecker::new(config.interactivity.clone())),
        Category::Responsive => Box::new(ResponsiveChecker::new(config.responsive.clone())),
        Category::CrossBrowser => Box::new(CrossBrowserChecker::new(config.cross_browser.clone())),
        Category::LayoutMatch => Box::new(LayoutChecker::new(config.layout.clone())),
    }
}

/// Every enabled and selected checker, in dispatch order
pub fn from_config(config: &SuiteConfig) -> Vec<Box<dyn Checker>> {
    Category::ALL
        .iter()
        .copied()
        .filter(|c| config.is_selected(*c))
        .map(|c| build(c, config))
        .collect()
}

/// Issues and metrics accumulated by one checker run, in sub-check order
#[derive(Debug, Default)]
pub struct Findings {
    issues: Vec<Issue>,
    metrics: Metrics,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn metric(&mut self, key: &str, value: impl Into<Value>) {
        self.metrics.insert(key.to_string(), value.into());
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn count(&self, kind: IssueType) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    /// Keep going past a timed-out sub-check; any other error aborts the checker
    pub fn tolerate<T>(&mut self, check: &str, result: InspectorResult<T>) -> InspectorResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_timeout() => {
                warn!("{} timed out: {}", check, e);
                self.push(timeout_issue(check, &e));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Out-of-page fetch that treats network failures as "not there"
    pub async fn fetch_optional(
        &mut self,
        check: &str,
        page: &dyn PageInspector,
        url: &Url,
    ) -> InspectorResult<Option<FetchedResource>> {
        match page.fetch(url).await {
            Ok(resource) => Ok(Some(resource)),
            Err(InspectorError::Http(e)) => {
                debug!("Fetch of {} failed: {}", url, e);
                Ok(None)
            }
            Err(e) => self.tolerate(check, Err(e)),
        }
    }

    pub fn into_result(self, category: Category, blocking: Severity) -> CategoryResult {
        CategoryResult::evaluate(category, blocking, self.issues, self.metrics)
    }
}

/// Non-blocking marker for an operation that ran out of time
pub fn timeout_issue(check: &str, err: &InspectorError) -> Issue {
    Issue::new(
        IssueType::OperationTimeout,
        Severity::Info,
        format!("{} did not complete: {}", check, err),
    )
    .in_check(check)
}

/// Rendered elements that carry their own visible text
pub(crate) fn text_elements(snapshot: &DomSnapshot) -> impl Iterator<Item = (usize, &DomElement)> {
    snapshot.iter().filter(move |(i, e)| {
        e.has_direct_text
            && e.is_rendered()
            && !matches!(
                e.tag.as_str(),
                "script" | "style" | "noscript" | "title" | "head" | "meta" | "option"
            )
            && !snapshot.has_ancestor_tag(*i, "head")
    })
}

/// Contrast of an element's text against its effective background
pub(crate) fn text_contrast(snapshot: &DomSnapshot, index: usize) -> Option<f64> {
    let el = snapshot.elements.get(index)?;
    let background = snapshot.effective_background(index);
    let foreground: Rgba = el.style.color.parse().ok()?;
    Some(sitegate_common::contrast_ratio(foreground.over(background), background))
}

/// `h1 → h3` style skips, checked in document order
pub(crate) fn heading_skips(snapshot: &DomSnapshot) -> Vec<(usize, u8, u8)> {
    let mut skips = Vec::new();
    let mut previous: Option<u8> = None;
    for (index, _, level) in snapshot.headings() {
        if let Some(prev) = previous {
            if level > prev + 1 {
                skips.push((index, prev, level));
            }
        }
        previous = Some(level);
    }
    skips
}

const TALLY_SAMPLES: usize = 5;

/// Offending elements of one kind
#[derive(Default)]
pub(crate) struct Tally {
    count: usize,
    samples: Vec<String>,
}

impl Tally {
    pub(crate) fn add(&mut self, selector: String) {
        self.count += 1;
        if self.samples.len() < TALLY_SAMPLES {
            self.samples.push(selector);
        }
    }

    pub(crate) fn report(self, findings: &mut Findings, kind: IssueType, severity: Severity, check: &str, message: String) {
        if self.count == 0 {
            return;
        }
        findings.push(
            Issue::new(kind, severity, message)
                .in_check(check)
                .with_count(self.count)
                .with_value(self.samples),
        );
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
pub(crate) mod testing {
    //! Snapshot builders shared by checker tests

    use crate::inspector::{DomElement, DomSnapshot, Rect, Viewport};

    pub fn page(elements: Vec<DomElement>) -> DomSnapshot {
        DomSnapshot {
            url: "https://example.com/".into(),
            title: Some("Example page".into()),
            lang: Some("en".into()),
            viewport: Viewport::new(1280, 720),
            scroll_width: 1280.0,
            scroll_height: 2000.0,
            elements,
        }
    }

    pub fn sized(el: DomElement, width: f64, height: f64) -> DomElement {
        let mut el = el;
        el.rect = Rect {
            x: 0.0,
            y: 0.0,
            width,
            height,
        };
        el
    }

    /// html > body, with `children` parented to body
    pub fn body(children: Vec<DomElement>) -> DomSnapshot {
        let mut elements = vec![
            sized(DomElement::new("html").with_attr("lang", "en"), 1280.0, 2000.0),
            sized(DomElement::new("body").with_parent(0), 1280.0, 2000.0),
        ];
        for child in children {
            let child = if child.parent.is_none() { child.with_parent(1) } else { child };
            let child = if child.rect.is_empty() { sized(child, 200.0, 48.0) } else { child };
            elements.push(child);
        }
        page(elements)
    }
}
