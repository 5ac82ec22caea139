//! Core types for sitegate
//!
//! Issues, severities, categories and the per-checker result value. Everything
//! here is plain data: checkers build these, the aggregator folds them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::Error;

/// Issue severity
///
/// `warning`/`low` deserialize as [`Severity::Minor`] and `medium` as
/// [`Severity::Moderate`]. `Serious` and `High` share a rank: accessibility
/// tools say "serious", security tools say "high".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    #[serde(alias = "warning", alias = "low")]
    Minor,
    #[serde(alias = "medium")]
    Moderate,
    High,
    Serious,
    Critical,
    /// The check itself failed to run
    Error,
}

impl Severity {
    /// Every severity bucket, in report order
    pub const ALL: [Severity; 7] = [
        Severity::Critical,
        Severity::Serious,
        Severity::High,
        Severity::Moderate,
        Severity::Minor,
        Severity::Info,
        Severity::Error,
    ];

    pub fn rank(self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Minor => 1,
            Severity::Moderate => 2,
            Severity::High | Severity::Serious => 3,
            Severity::Critical => 4,
            Severity::Error => 5,
        }
    }

    /// True if `self` is at or above `threshold`
    pub fn at_least(self, threshold: Severity) -> bool {
        self.rank() >= threshold.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Serious => "serious",
            Severity::Critical => "critical",
            Severity::Error => "error",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Info
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "minor" | "warning" | "low" => Ok(Severity::Minor),
            "moderate" | "medium" => Ok(Severity::Moderate),
            "high" => Ok(Severity::High),
            "serious" => Ok(Severity::Serious),
            "critical" => Ok(Severity::Critical),
            "error" => Ok(Severity::Error),
            other => Err(Error::UnknownVariant {
                kind: "severity",
                value: other.to_string(),
            }),
        }
    }
}

/// Orchestration phase a checker belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No network-timing dependency
    Fast,
    /// One extra navigation/evaluation pass
    Medium,
    /// Multiple page loads, viewports or engines. Always sequential.
    Slow,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Fast, Phase::Medium, Phase::Slow];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Fast => "fast",
            Phase::Medium => "medium",
            Phase::Slow => "slow",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality dimension inspected by one checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Images,
    Typography,
    Interactivity,
    ContentQuality,
    Accessibility,
    Seo,
    Security,
    Responsive,
    CrossBrowser,
    Performance,
    LayoutMatch,
}

impl Category {
    /// Dispatch order: phase by phase, in the order each phase schedules its checkers
    pub const ALL: [Category; 11] = [
        Category::Images,
        Category::Typography,
        Category::Interactivity,
        Category::ContentQuality,
        Category::Accessibility,
        Category::Seo,
        Category::Security,
        Category::Responsive,
        Category::CrossBrowser,
        Category::Performance,
        Category::LayoutMatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Images => "images",
            Category::Typography => "typography",
            Category::Interactivity => "interactivity",
            Category::ContentQuality => "content-quality",
            Category::Accessibility => "accessibility",
            Category::Seo => "seo",
            Category::Security => "security",
            Category::Responsive => "responsive",
            Category::CrossBrowser => "cross-browser",
            Category::Performance => "performance",
            Category::LayoutMatch => "layout-match",
        }
    }

    /// Human-readable test name used in reports and logs
    pub fn title(&self) -> &'static str {
        match self {
            Category::Images => "Image Validator",
            Category::Typography => "Typography Checker",
            Category::Interactivity => "Interactive Tester",
            Category::ContentQuality => "Content Quality Tester",
            Category::Accessibility => "Accessibility Tester",
            Category::Seo => "SEO Tester",
            Category::Security => "Security Tester",
            Category::Responsive => "Responsive Tester",
            Category::CrossBrowser => "Cross-Browser Tester",
            Category::Performance => "Performance Tester",
            Category::LayoutMatch => "Layout Match Tester",
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Category::Images
            | Category::Typography
            | Category::Interactivity
            | Category::ContentQuality => Phase::Fast,
            Category::Accessibility | Category::Seo | Category::Security => Phase::Medium,
            Category::Responsive
            | Category::CrossBrowser
            | Category::Performance
            | Category::LayoutMatch => Phase::Slow,
        }
    }

    /// Lowest severity that fails this category unless configured otherwise
    pub fn default_blocking_severity(&self) -> Severity {
        match self {
            Category::Accessibility => Severity::Serious,
            Category::Seo => Severity::Critical,
            Category::Security => Severity::High,
            Category::Performance => Severity::Serious,
            Category::ContentQuality => Severity::Moderate,
            Category::Images => Severity::Critical,
            Category::Typography => Severity::Critical,
            Category::Interactivity => Severity::Serious,
            Category::Responsive => Severity::Critical,
            Category::CrossBrowser => Severity::Serious,
            Category::LayoutMatch => Severity::Serious,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        let found = match normalized.as_str() {
            "a11y" => Some(Category::Accessibility),
            "content" => Some(Category::ContentQuality),
            "interactive" => Some(Category::Interactivity),
            "layout" => Some(Category::LayoutMatch),
            other => Category::ALL.iter().copied().find(|c| c.as_str() == other),
        };
        found.ok_or_else(|| Error::UnknownVariant {
            kind: "category",
            value: s.to_string(),
        })
    }
}

macro_rules! issue_types {
    ($( $variant:ident => $name:literal, )+) => {
        /// Fine-grained, machine-readable issue identifier
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum IssueType {
            $( #[serde(rename = $name)] $variant, )+
        }

        impl IssueType {
            pub const ALL: &'static [IssueType] = &[$(IssueType::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( IssueType::$variant => $name, )+
                }
            }
        }
    };
}

issue_types! {
    // raised by the orchestrator and checker boundary
    TestError => "test_error",
    OperationTimeout => "operation_timeout",
    AnalysisUnavailable => "analysis_unavailable",

    // document structure, shared by several checkers
    NoH1 => "no_h1",
    MultipleH1 => "multiple_h1",
    HeadingSkip => "heading_skip",
    MissingAlt => "missing_alt",
    PoorContrast => "poor_contrast",

    // accessibility
    NoMain => "no_main",
    NonSemanticClickable => "non_semantic_clickable",
    EmptyLink => "empty_link",
    LowContrast => "low_contrast",
    InvalidRole => "invalid_role",
    InteractiveNoLabel => "interactive_no_label",
    HiddenFocusable => "hidden_focusable",
    InvalidAriaExpanded => "invalid_aria_expanded",
    ClickOnlyInteractive => "click_only_interactive",
    PositiveTabindex => "positive_tabindex",
    UnlabeledInput => "unlabeled_input",
    NoSubmitButton => "no_submit_button",
    UnlabeledForm => "unlabeled_form",
    NoSkipLink => "no_skip_link",
    BrokenSkipLink => "broken_skip_link",
    NoLangAttribute => "no_lang_attribute",
    NoPageTitle => "no_page_title",
    NoHeadings => "no_headings",
    NoLandmarks => "no_landmarks",

    // seo
    MissingTitle => "missing_title",
    TitleTooShort => "title_too_short",
    TitleTooLong => "title_too_long",
    MissingDescription => "missing_description",
    DescriptionTooShort => "description_too_short",
    DescriptionTooLong => "description_too_long",
    MissingCanonical => "missing_canonical",
    MissingViewport => "missing_viewport",
    NoindexSet => "noindex_set",
    MissingOgTags => "missing_og_tags",
    MissingTwitterCard => "missing_twitter_card",
    MissingFavicon => "missing_favicon",
    HeadingTooDeep => "heading_too_deep",
    EmptyHeadings => "empty_headings",
    LongHeadings => "long_headings",
    EmptyLinks => "empty_links",
    JavascriptLinks => "javascript_links",
    FewInternalLinks => "few_internal_links",
    MissingImageAlt => "missing_image_alt",
    GenericImageAlt => "generic_image_alt",
    NoLazyLoading => "no_lazy_loading",
    NoStructuredData => "no_structured_data",
    InvalidSchema => "invalid_schema",
    NoSitemap => "no_sitemap",
    InvalidSitemap => "invalid_sitemap",
    EmptySitemap => "empty_sitemap",
    NoRobotsTxt => "no_robots_txt",
    DisallowAll => "disallow_all",
    NoSitemapReference => "no_sitemap_reference",

    // security
    NoHttps => "no_https",
    HttpRedirectsToHttps => "http_redirects_to_https",
    MissingSecurityHeader => "missing_security_header",
    CspUnsafeInline => "csp_unsafe_inline",
    CspUnsafeEval => "csp_unsafe_eval",
    HstsLowMaxAge => "hsts_low_max_age",
    HstsNoSubdomains => "hsts_no_subdomains",
    XfoWeakValue => "xfo_weak_value",
    ServerDisclosure => "server_disclosure",
    XPoweredByDisclosure => "x_powered_by_disclosure",
    InsecureCookie => "insecure_cookie",
    XssInParameter => "xss_in_parameter",
    InnerhtmlUsage => "innerhtml_usage",
    MixedContent => "mixed_content",
    FormNoAction => "form_no_action",
    PasswordInGetForm => "password_in_get_form",
    PasswordNoAutocomplete => "password_no_autocomplete",

    // performance
    LcpPoor => "lcp_poor",
    LcpNeedsImprovement => "lcp_needs_improvement",
    LcpNotMeasured => "lcp_not_measured",
    ClsPoor => "cls_poor",
    ClsNeedsImprovement => "cls_needs_improvement",
    ClsNotMeasured => "cls_not_measured",
    FidPoor => "fid_poor",
    FidNeedsImprovement => "fid_needs_improvement",
    FidNotMeasured => "fid_not_measured",
    FcpSlow => "fcp_slow",
    TtfbSlow => "ttfb_slow",
    FirstPaintSlow => "first_paint_slow",
    JsTooLarge => "js_too_large",
    TotalTooLarge => "total_too_large",
    FailedResources => "failed_resources",
    ManySlowResources => "many_slow_resources",
    TooManyResources => "too_many_resources",
    JsHeapHigh => "js_heap_high",
    JsSlow => "js_slow",
    Slow3g => "slow_3g",
    Timeout3g => "3g_timeout",
    Slow4g => "slow_4g",
    Timeout4g => "4g_timeout",

    // content quality
    TooManyGenericPhrases => "too_many_generic_phrases",
    AiIndicatorsFound => "ai_indicators_found",
    TooManyFrameworkDefaults => "too_many_framework_defaults",
    TooManyBuzzwords => "too_many_buzzwords",
    LacksSpecificExamples => "lacks_specific_examples",
    LacksPersonalVoice => "lacks_personal_voice",
    TooMuchPassiveVoice => "too_much_passive_voice",
    ContentTooShort => "content_too_short",
    LongParagraphs => "long_paragraphs",
    LowQualityScore => "low_quality_score",

    // images
    ImageLoadFailed => "image_load_failed",
    InvalidFormat => "invalid_format",
    FileTooLarge => "file_too_large",
    PoorDimensions => "poor_dimensions",

    // typography
    FontTooSmall => "font_too_small",
    PoorLineHeight => "poor_line_height",
    PoorLetterSpacing => "poor_letter_spacing",
    FontNotLoaded => "font_not_loaded",
    H1TooLarge => "h1_too_large",
    SkippedHeadingLevel => "skipped_heading_level",
    NoFallbackFont => "no_fallback_font",

    // interactivity
    ElementNotVisible => "element_not_visible",
    TouchTargetTooSmall => "touch_target_too_small",
    NotFocusable => "not_focusable",
    NoHoverState => "no_hover_state",
    NoFocusStyle => "no_focus_style",

    // responsive
    HorizontalScroll => "horizontal_scroll",
    TextNotReadable => "text_not_readable",
    ButtonsNotTappable => "buttons_not_tappable",
    LayoutBreak => "layout_break",
    OverlappingElements => "overlapping_elements",
    ViewportError => "viewport_error",

    // cross-browser
    BrowserUnavailable => "browser_unavailable",
    CssIncompatibility => "css_incompatibility",
    JsIncompatibility => "js_incompatibility",
    ConsoleErrors => "console_errors",
    LayoutIssues => "layout_issues",
    VisualDifference => "visual_difference",
    BrowserError => "browser_error",

    // layout match
    LayoutMismatch => "layout_mismatch",
    LayoutDifference => "layout_difference",
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discrete finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueType,
    pub severity: Severity,
    pub message: String,
    /// Sub-check that produced the issue, for checkers that run several
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl Issue {
    pub fn new(kind: IssueType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            check: None,
            selector: None,
            count: None,
            value: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count as u64);
        self
    }

    pub fn with_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn in_check(mut self, check: &str) -> Self {
        self.check = Some(check.to_string());
        self
    }
}

/// Open key-value map of domain-specific measurements. Ordered for stable output.
pub type Metrics = BTreeMap<String, serde_json::Value>;

/// Structured outcome of one checker run
///
/// Built once through [`CategoryResult::evaluate`], which derives `passed` from
/// the blocking severity. There are no mutators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    category: Category,
    passed: bool,
    blocking_severity: Severity,
    issues: Vec<Issue>,
    #[serde(default)]
    metrics: Metrics,
}

impl CategoryResult {
    /// Build a result; the category fails iff an issue at or above `blocking` exists
    pub fn evaluate(
        category: Category,
        blocking: Severity,
        issues: Vec<Issue>,
        metrics: Metrics,
    ) -> Self {
        let passed = !issues.iter().any(|i| i.severity.at_least(blocking));
        Self {
            category,
            passed,
            blocking_severity: blocking,
            issues,
            metrics,
        }
    }

    /// Result standing in for a checker that failed to run
    pub fn from_error(category: Category, message: impl Into<String>) -> Self {
        let message = message.into();
        let issue = Issue::new(
            IssueType::TestError,
            Severity::Error,
            format!("{} failed: {}", category.title(), message),
        );
        Self {
            category,
            passed: false,
            blocking_severity: category.default_blocking_severity(),
            issues: vec![issue],
            metrics: Metrics::new(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn blocking_severity(&self) -> Severity {
        self.blocking_severity
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Issues at or above the blocking severity
    pub fn blocking_issues(&self) -> impl Iterator<Item = &Issue> {
        let blocking = self.blocking_severity;
        self.issues.iter().filter(move |i| i.severity.at_least(blocking))
    }
}
