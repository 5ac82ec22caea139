//! Checkers driven end to end through fixture pages

mod common;

use sitegate_common::{Category, IssueType, Severity};
use sitegate_runner::checkers::{
    AccessibilityChecker, Checker, CrossBrowserChecker, ImagesChecker, InteractivityChecker, PerformanceChecker,
    ResponsiveChecker, SecurityChecker, SeoChecker,
};
use sitegate_runner::config::{
    AccessibilityConfig, CrossBrowserConfig, ImagesConfig, InteractivityConfig, PerformanceConfig, ResponsiveConfig,
    SecurityConfig, SeoConfig,
};
use sitegate_runner::inspector::HoverState;

use common::{context, load_site};

fn kinds_at(result: &sitegate_common::CategoryResult, severity: Severity) -> Vec<IssueType> {
    result
        .issues()
        .iter()
        .filter(|i| i.severity == severity)
        .map(|i| i.kind)
        .collect()
}

#[tokio::test]
async fn test_seo_missing_title_and_h1() {
    let (ctx, _) = context(load_site("bare_page.json"), "https://bare.example/").await;
    let result = SeoChecker::new(SeoConfig::default()).check(&ctx).await.unwrap();

    assert!(!result.passed());
    assert_eq!(result.category(), Category::Seo);
    assert_eq!(
        kinds_at(&result, Severity::Critical),
        vec![IssueType::MissingTitle, IssueType::NoH1]
    );
}

#[tokio::test]
async fn test_security_missing_csp_and_hsts() {
    let (ctx, _) = context(load_site("insecure_headers.json"), "https://shop.example/").await;
    let result = SecurityChecker::new(SecurityConfig::default()).check(&ctx).await.unwrap();

    let missing: Vec<_> = result
        .issues()
        .iter()
        .filter(|i| i.kind == IssueType::MissingSecurityHeader && i.severity == Severity::High)
        .collect();
    assert!(missing.len() >= 2);
    assert!(!result.passed());
    assert!(result.issues().iter().all(|i| i.kind != IssueType::InsecureCookie));
}

#[tokio::test]
async fn test_security_plain_http() {
    let (ctx, _) = context(load_site("plain_http.json"), "http://legacy.example/").await;
    let result = SecurityChecker::new(SecurityConfig::default()).check(&ctx).await.unwrap();

    assert!(!result.passed());
    let no_https = result.issues().iter().find(|i| i.kind == IssueType::NoHttps).unwrap();
    assert_eq!(no_https.severity, Severity::Critical);
    assert!(result.issues().iter().any(|i| i.kind == IssueType::ServerDisclosure));
}

#[tokio::test]
async fn test_missing_alt_fails_accessibility_and_images() {
    let site = load_site("bare_page.json");
    let (ctx, _) = context(site, "https://bare.example/").await;

    let a11y = AccessibilityChecker::new(AccessibilityConfig::default()).check(&ctx).await.unwrap();
    let alt = a11y.issues().iter().find(|i| i.kind == IssueType::MissingAlt).unwrap();
    assert_eq!(alt.severity, Severity::Serious);
    assert!(!a11y.passed());

    let images = ImagesChecker::new(ImagesConfig::default()).check(&ctx).await.unwrap();
    assert!(images.issues().iter().any(|i| i.kind == IssueType::MissingAlt));
    assert!(!images.passed());
}

#[tokio::test]
async fn test_repeat_runs_are_identical() {
    let (ctx, _) = context(load_site("well_formed.json"), "https://studio.example/").await;
    let checker = AccessibilityChecker::new(AccessibilityConfig::default());
    let first = checker.check(&ctx).await.unwrap();
    let second = checker.check(&ctx).await.unwrap();
    assert_eq!(
        serde_json::to_string(first.issues()).unwrap(),
        serde_json::to_string(second.issues()).unwrap()
    );
}

#[tokio::test]
async fn test_well_formed_seo_passes() {
    let (ctx, _) = context(load_site("well_formed.json"), "https://studio.example/").await;
    let result = SeoChecker::new(SeoConfig::default()).check(&ctx).await.unwrap();
    assert!(result.passed(), "{:?}", result.issues());
    assert!(result
        .issues()
        .iter()
        .all(|i| !matches!(i.kind, IssueType::NoSitemap | IssueType::NoRobotsTxt | IssueType::NoStructuredData)));
}

#[tokio::test]
async fn test_responsive_uses_viewport_snapshots() {
    let (ctx, _) = context(load_site("well_formed.json"), "https://studio.example/").await;
    let result = ResponsiveChecker::new(ResponsiveConfig::default()).check(&ctx).await.unwrap();
    // 375 has its own snapshot; 414 falls back to the 1280 px wide desktop layout
    let scrolling: Vec<_> = result
        .issues()
        .iter()
        .filter(|i| i.kind == IssueType::HorizontalScroll)
        .filter_map(|i| i.check.as_deref())
        .collect();
    assert!(!scrolling.contains(&"mobile"));
    assert!(scrolling.contains(&"mobile-large"));
    assert!(!result.passed());
}

#[tokio::test]
async fn test_cross_browser_engines() {
    let (ctx, launcher) = context(load_site("multi_engine.json"), "https://engines.example/").await;
    let result = CrossBrowserChecker::new(CrossBrowserConfig::default()).check(&ctx).await.unwrap();

    let kinds: Vec<IssueType> = result.issues().iter().map(|i| i.kind).collect();
    assert!(kinds.contains(&IssueType::BrowserUnavailable));
    assert!(kinds.contains(&IssueType::CssIncompatibility));
    assert!(kinds.contains(&IssueType::ConsoleErrors));
    let visual = result.issues().iter().find(|i| i.kind == IssueType::VisualDifference).unwrap();
    assert_eq!(visual.check.as_deref(), Some("firefox"));
    assert!(!result.passed());
    assert_eq!(result.metrics()["engines_tested"], 2);
    assert_eq!(launcher.pages_opened(), 2);
}

#[tokio::test]
async fn test_performance_skips_throttling_without_network_emulation() {
    let (ctx, launcher) = context(load_site("well_formed.json"), "https://studio.example/").await;
    let result = PerformanceChecker::new(PerformanceConfig::default()).check(&ctx).await.unwrap();

    assert_eq!(result.metrics()["network_emulation"], "unsupported");
    assert!(result.metrics().get("load_3g_ms").is_none());
    let throttled = [IssueType::Slow3g, IssueType::Timeout3g, IssueType::Slow4g, IssueType::Timeout4g];
    assert!(result.issues().iter().all(|i| !throttled.contains(&i.kind)));
    assert_eq!(launcher.pages_opened(), 2);
    assert_eq!(launcher.pages_open(), 0);
}

#[tokio::test]
async fn test_interactivity_reports_links_without_hover_feedback() {
    let mut site = load_site("well_formed.json");
    let page = &mut site.pages[0];
    page.hover_states = vec![
        HoverState { index: 14, changed: true },
        HoverState { index: 17, changed: false },
    ];
    page.scripts.insert(
        "focus_states".into(),
        serde_json::json!([
            { "index": 14, "focus_visible": true },
            { "index": 17, "focus_visible": true },
            { "index": 18, "focus_visible": true }
        ]),
    );
    let (ctx, _) = context(site, "https://studio.example/").await;
    let result = InteractivityChecker::new(InteractivityConfig::default()).check(&ctx).await.unwrap();

    let stateless: Vec<_> = result.issues().iter().filter(|i| i.kind == IssueType::NoHoverState).collect();
    assert_eq!(stateless.len(), 1, "{:?}", result.issues());
    assert!(result.issues().iter().all(|i| i.kind != IssueType::NoFocusStyle));
    assert!(result.passed());
}
