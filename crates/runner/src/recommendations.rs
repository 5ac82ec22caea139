//! Recommendations derived from a suite's issue population
//!
//! Issues are grouped by type across every category. Each type has one entry in
//! an exhaustive table giving its priority, the advice to print and how many
//! occurrences it takes before the advice is worth giving.

use serde::{Deserialize, Serialize};

use sitegate_common::{Category, CategoryResult, IssueType};

const MAX_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub advice: String,
    pub count: usize,
    pub categories: Vec<Category>,
    pub samples: Vec<String>,
}

/// Table entry for one issue type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub priority: Priority,
    pub advice: &'static str,
    /// Occurrences needed before the advice is given
    pub min_count: usize,
}

const fn rule(priority: Priority, min_count: usize, advice: &'static str) -> Rule {
    Rule {
        priority,
        advice,
        min_count,
    }
}

pub fn rule_for(kind: IssueType) -> Rule {
    use IssueType::*;
    use Priority::*;

    match kind {
        TestError => rule(Critical, 1, "Fix the checks that failed to run; their categories were not evaluated"),
        OperationTimeout => rule(Medium, 1, "Investigate slow page operations that timed out during testing"),
        AnalysisUnavailable => rule(Low, 1, "Configure an analysis backend to enable visual and content review"),

        NoH1 => rule(Critical, 1, "Add exactly one <h1> describing the page"),
        MultipleH1 => rule(Medium, 1, "Keep a single <h1> per page and demote the others"),
        HeadingSkip | SkippedHeadingLevel => rule(Medium, 1, "Nest headings in order without skipping levels"),
        MissingAlt | MissingImageAlt => rule(Critical, 1, "Add descriptive alt text to every meaningful image"),
        PoorContrast | LowContrast => {
            rule(Critical, 1, "Raise text contrast to at least 4.5:1 (3:1 for large text)")
        }

        NoMain => rule(High, 1, "Wrap the primary content in a <main> landmark"),
        NonSemanticClickable | ClickOnlyInteractive => {
            rule(Medium, 1, "Use <button> or <a> for clickable elements so keyboards can reach them")
        }
        EmptyLink | EmptyLinks => rule(High, 1, "Give every link visible text or an aria-label"),
        InvalidRole => rule(Medium, 1, "Replace invalid ARIA roles with valid WAI-ARIA roles"),
        InteractiveNoLabel => rule(High, 1, "Provide an accessible name for every interactive element"),
        HiddenFocusable => rule(Medium, 1, "Remove hidden elements from the tab order"),
        InvalidAriaExpanded => rule(Medium, 1, "Set aria-expanded to \"true\" or \"false\" only"),
        PositiveTabindex => rule(Low, 1, "Drop positive tabindex values and follow DOM order"),
        UnlabeledInput => rule(High, 1, "Associate a <label> with every form input"),
        NoSubmitButton => rule(Medium, 1, "Give every form an explicit submit button"),
        UnlabeledForm => rule(Low, 2, "Name forms with aria-label or aria-labelledby"),
        NoSkipLink => rule(Medium, 1, "Add a skip link to the main content"),
        BrokenSkipLink => rule(Medium, 1, "Point skip links at an element that exists"),
        NoLangAttribute => rule(High, 1, "Declare the page language on <html lang>"),
        NoPageTitle | MissingTitle => rule(Critical, 1, "Add a descriptive <title> of 30 to 60 characters"),
        NoHeadings => rule(Medium, 1, "Structure the content with headings"),
        NoLandmarks => rule(Medium, 1, "Mark up header, nav, main and footer landmarks"),

        TitleTooShort | TitleTooLong => rule(Medium, 1, "Keep the title between 30 and 60 characters"),
        MissingDescription => rule(Medium, 1, "Add a meta description of 120 to 160 characters"),
        DescriptionTooShort | DescriptionTooLong => {
            rule(Low, 1, "Keep the meta description between 120 and 160 characters")
        }
        MissingCanonical => rule(Medium, 1, "Declare a canonical URL"),
        MissingViewport => rule(High, 1, "Add a responsive viewport meta tag"),
        NoindexSet => rule(Critical, 1, "Remove noindex from pages meant to be found"),
        MissingOgTags => rule(Low, 1, "Add Open Graph tags for link previews"),
        MissingTwitterCard => rule(Low, 1, "Add a twitter:card meta tag"),
        MissingFavicon => rule(Low, 1, "Add a favicon"),
        HeadingTooDeep => rule(Low, 3, "Flatten headings deeper than h4"),
        EmptyHeadings => rule(Medium, 1, "Remove or fill empty headings"),
        LongHeadings => rule(Low, 2, "Shorten headings to 70 characters or fewer"),
        JavascriptLinks => rule(Low, 1, "Replace javascript: links with real URLs or buttons"),
        FewInternalLinks => rule(Low, 1, "Link to more related pages on the site"),
        GenericImageAlt => rule(Low, 1, "Replace generic alt text such as \"image\" with a description"),
        NoLazyLoading => rule(Low, 1, "Lazy-load images below the fold"),
        NoStructuredData => rule(Low, 1, "Add JSON-LD structured data"),
        InvalidSchema => rule(Medium, 1, "Fix structured data missing @context or @type"),
        NoSitemap | InvalidSitemap | EmptySitemap => rule(Medium, 1, "Publish a valid XML sitemap with page URLs"),
        NoRobotsTxt => rule(Low, 1, "Publish a robots.txt"),
        DisallowAll => rule(Critical, 1, "Stop robots.txt from disallowing the whole site"),
        NoSitemapReference => rule(Low, 1, "Reference the sitemap from robots.txt"),

        NoHttps => rule(Critical, 1, "Serve the site over HTTPS"),
        HttpRedirectsToHttps => rule(Low, 1, "Link to the HTTPS URL directly to avoid the redirect"),
        MissingSecurityHeader => rule(High, 1, "Send the missing security headers (CSP, HSTS and friends)"),
        CspUnsafeInline | CspUnsafeEval => rule(Medium, 1, "Tighten the CSP by removing unsafe-inline and unsafe-eval"),
        HstsLowMaxAge | HstsNoSubdomains => rule(Low, 1, "Use HSTS with max-age of a year and includeSubDomains"),
        XfoWeakValue => rule(Low, 1, "Set X-Frame-Options to DENY or SAMEORIGIN"),
        ServerDisclosure | XPoweredByDisclosure => rule(Low, 1, "Hide server and framework version headers"),
        InsecureCookie => rule(Medium, 1, "Mark cookies Secure, HttpOnly and SameSite"),
        XssInParameter => rule(Critical, 1, "Escape query parameters before echoing them into the page"),
        InnerhtmlUsage => rule(Medium, 1, "Avoid innerHTML with untrusted data"),
        MixedContent => rule(High, 1, "Load every subresource over HTTPS"),
        FormNoAction => rule(Low, 2, "Give forms an explicit action"),
        PasswordInGetForm => rule(Critical, 1, "Submit password forms with POST"),
        PasswordNoAutocomplete => rule(Low, 1, "Set autocomplete on password fields"),

        LcpPoor | LcpNeedsImprovement => rule(High, 1, "Speed up the largest contentful paint below 2.5 s"),
        ClsPoor | ClsNeedsImprovement => rule(High, 1, "Reserve space for late content to keep layout shift under 0.1"),
        FidPoor | FidNeedsImprovement => rule(High, 1, "Break up long main-thread tasks to cut input delay"),
        LcpNotMeasured | ClsNotMeasured | FidNotMeasured => rule(Low, 2, "Check that Core Web Vitals are observable"),
        FcpSlow | FirstPaintSlow => rule(High, 1, "Reduce render-blocking resources to paint sooner"),
        TtfbSlow => rule(Medium, 1, "Improve server response time or add caching"),
        JsTooLarge => rule(Medium, 1, "Split and trim JavaScript bundles"),
        TotalTooLarge => rule(Medium, 1, "Reduce the total page weight"),
        FailedResources => rule(High, 1, "Fix resources that fail to load"),
        ManySlowResources => rule(Medium, 1, "Compress or defer slow-loading resources"),
        TooManyResources => rule(Medium, 1, "Bundle or drop requests to reduce their number"),
        JsHeapHigh => rule(Medium, 1, "Investigate JavaScript memory growth"),
        JsSlow => rule(Medium, 1, "Split long JavaScript tasks and defer non-critical scripts"),
        Slow3g | Timeout3g => rule(High, 1, "Cut page weight and round trips so the page loads on slow mobile networks"),
        Slow4g | Timeout4g => rule(Medium, 1, "Trim critical-path requests to speed up loads on mobile networks"),

        TooManyGenericPhrases | TooManyBuzzwords => rule(Medium, 1, "Replace generic phrases and buzzwords with concrete claims"),
        AiIndicatorsFound => rule(Medium, 1, "Rewrite boilerplate-sounding copy in your own voice"),
        TooManyFrameworkDefaults => rule(Medium, 1, "Customise framework default colours and spacing"),
        LacksSpecificExamples => rule(Medium, 1, "Add numbers, measurements or case studies"),
        LacksPersonalVoice => rule(Low, 1, "Write in the first person and share opinions"),
        TooMuchPassiveVoice => rule(Low, 1, "Prefer active voice"),
        ContentTooShort => rule(Medium, 1, "Expand the content to at least 300 words"),
        LongParagraphs => rule(Low, 1, "Break long paragraphs apart"),
        LowQualityScore => rule(High, 1, "Revise the copy until the quality review scores 7/10 or more"),

        ImageLoadFailed => rule(Critical, 1, "Fix images that fail to load"),
        InvalidFormat => rule(Low, 1, "Serve images as WebP, AVIF, JPEG, PNG or SVG"),
        FileTooLarge => rule(Medium, 1, "Compress images larger than 500 KB"),
        PoorDimensions => rule(Low, 2, "Avoid images smaller than 72 px"),

        FontTooSmall | TextNotReadable => rule(Medium, 1, "Use body text of at least 16 px (14 px on mobile)"),
        PoorLineHeight => rule(Low, 1, "Set body line height between 1.4 and 1.6"),
        PoorLetterSpacing => rule(Low, 1, "Avoid tight negative letter spacing"),
        FontNotLoaded => rule(Medium, 1, "Fix web fonts that fail to load"),
        H1TooLarge => rule(Low, 1, "Keep the h1 at 60 px or smaller"),
        NoFallbackFont => rule(Low, 1, "Add a generic fallback to every font stack"),

        ElementNotVisible => rule(Low, 2, "Remove or reveal invisible interactive elements"),
        TouchTargetTooSmall | ButtonsNotTappable => rule(High, 1, "Make touch targets at least 44×44 px"),
        NotFocusable => rule(High, 1, "Make every interactive element keyboard focusable"),
        NoHoverState | NoFocusStyle => rule(Low, 1, "Give interactive elements visible hover and focus styles"),

        HorizontalScroll => rule(Critical, 1, "Remove horizontal scrolling at small viewports"),
        LayoutBreak => rule(Critical, 1, "Constrain overflowing content and add a viewport meta tag"),
        OverlappingElements => rule(Medium, 1, "Separate overlapping interactive elements"),
        ViewportError => rule(High, 1, "Fix failures when rendering at some viewports"),

        BrowserUnavailable => rule(Low, 1, "Install every browser engine to complete cross-browser testing"),
        CssIncompatibility | JsIncompatibility => rule(Medium, 1, "Provide fallbacks for features missing in some engines"),
        ConsoleErrors => rule(High, 1, "Fix JavaScript console errors"),
        LayoutIssues => rule(Low, 1, "Reduce negative margins and floats that render inconsistently"),
        VisualDifference => rule(Medium, 1, "Align rendering differences between browsers"),
        BrowserError => rule(High, 1, "Fix pages that fail to load in some engines"),

        LayoutMismatch => rule(High, 1, "Bring the layout in line with the reference design"),
        LayoutDifference => rule(Medium, 2, "Apply the suggested CSS fixes for reference differences"),
    }
}

struct Group {
    kind: IssueType,
    count: usize,
    categories: Vec<Category>,
    samples: Vec<String>,
}

/// One recommendation per issue type that reaches its threshold, sorted by priority
///
/// Groups keep first-seen order, and the sort is stable, so equal priorities
/// come out in the order their first issue was reported.
pub fn recommend<'a>(results: impl IntoIterator<Item = &'a CategoryResult>) -> Vec<Recommendation> {
    let mut groups: Vec<Group> = Vec::new();
    for result in results {
        for issue in result.issues() {
            let index = match groups.iter().position(|g| g.kind == issue.kind) {
                Some(index) => index,
                None => {
                    groups.push(Group {
                        kind: issue.kind,
                        count: 0,
                        categories: Vec::new(),
                        samples: Vec::new(),
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[index];
            group.count += 1;
            if !group.categories.contains(&result.category()) {
                group.categories.push(result.category());
            }
            if group.samples.len() < MAX_SAMPLES {
                group.samples.push(issue.message.clone());
            }
        }
    }

    let mut recommendations: Vec<Recommendation> = groups
        .into_iter()
        .filter_map(|g| {
            let rule = rule_for(g.kind);
            (g.count >= rule.min_count).then(|| Recommendation {
                priority: rule.priority,
                issue_type: g.kind,
                advice: rule.advice.to_string(),
                count: g.count,
                categories: g.categories,
                samples: g.samples,
            })
        })
        .collect();
    recommendations.sort_by_key(|r| r.priority);
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitegate_common::{Issue, Metrics, Severity};

    fn result(category: Category, issues: Vec<Issue>) -> CategoryResult {
        CategoryResult::evaluate(category, category.default_blocking_severity(), issues, Metrics::new())
    }

    fn issue(kind: IssueType, msg: &str) -> Issue {
        Issue::new(kind, Severity::Minor, msg)
    }

    #[test]
    fn test_every_type_has_advice() {
        for kind in IssueType::ALL {
            let rule = rule_for(*kind);
            assert!(!rule.advice.is_empty(), "{}", kind);
            assert!(rule.min_count >= 1);
        }
    }

    #[test]
    fn test_grouping_and_priority_order() {
        let results = vec![
            result(
                Category::Seo,
                vec![
                    issue(IssueType::MissingOgTags, "og"),
                    issue(IssueType::MissingAlt, "hero image"),
                    issue(IssueType::MissingFavicon, "favicon"),
                ],
            ),
            result(Category::Accessibility, vec![issue(IssueType::MissingAlt, "logo")]),
        ];
        let recs = recommend(&results);
        let kinds: Vec<IssueType> = recs.iter().map(|r| r.issue_type).collect();
        // low priorities keep first-seen order behind the critical one
        assert_eq!(
            kinds,
            vec![IssueType::MissingAlt, IssueType::MissingOgTags, IssueType::MissingFavicon]
        );
        assert_eq!(recs[0].count, 2);
        assert_eq!(recs[0].categories, vec![Category::Seo, Category::Accessibility]);
        assert_eq!(recs[0].samples, vec!["hero image".to_string(), "logo".to_string()]);
    }

    #[test]
    fn test_threshold_and_samples() {
        let one = vec![result(Category::Typography, vec![issue(IssueType::PoorDimensions, "tiny")])];
        assert!(recommend(&one).is_empty());

        let many: Vec<Issue> = (0..5).map(|i| issue(IssueType::PoorDimensions, &format!("img {}", i))).collect();
        let recs = recommend(&[result(Category::Images, many)]);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].count, 5);
        assert_eq!(recs[0].samples.len(), MAX_SAMPLES);
    }
}
